//! In-process cache of the remote photos.
//!
//! Records are only ever appended by folder loads and removed by
//! [`ImageIndex::delete_image`]. Folders stay cached after the active folder
//! changes, so switching back costs no listing calls.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::DiskConfig;
use crate::disk::{self, DiskApi, RawEntry};
use crate::error::{BotError, DiskError};
use crate::model::{FolderRecord, FolderScope, ImageRecord};

#[derive(Clone)]
pub struct ImageIndex {
    disk: Arc<dyn DiskApi>,
    config: Arc<DiskConfig>,
    state: Arc<RwLock<IndexState>>,
}

#[derive(Default)]
struct IndexState {
    records: Vec<ImageRecord>,
    /// Folders whose load has begun; guards against a second full load.
    started: HashSet<String>,
}

#[derive(Debug)]
pub enum FolderLoad {
    Cached,
    Loaded {
        first_page: usize,
        /// Background load of the remaining pages, yielding how many records it added.
        remaining: Option<JoinHandle<usize>>,
    },
}

/// Result of a date lookup that may fall back to any photo.
#[derive(Debug, Clone, PartialEq)]
pub enum DatedPick {
    OnDate(ImageRecord),
    Fallback(ImageRecord),
}

impl ImageIndex {
    pub fn new(disk: Arc<dyn DiskApi>, config: Arc<DiskConfig>) -> Self {
        Self {
            disk,
            config,
            state: Arc::new(RwLock::new(IndexState::default())),
        }
    }

    /// Loads the first page now and the rest in the background. A no-op when
    /// the folder is already cached or loading.
    pub async fn ensure_folder_loaded(&self, folder: &str) -> Result<FolderLoad, DiskError> {
        {
            let mut state = self.state.write().await;
            let cached = state.started.contains(folder)
                || state.records.iter().any(|r| r.parent_folder_name == folder);
            if cached {
                return Ok(FolderLoad::Cached);
            }
            state.started.insert(folder.to_string());
        }

        let path = self.config.folder_path(folder);
        let first_page_size = self.config.first_page_size;

        let page = match self.disk.list_folder(&path, 0, first_page_size).await {
            Ok(page) => page,
            Err(err) => {
                warn!(folder, error = %err, "first page of folder failed to load");
                self.state.write().await.started.remove(folder);
                return Err(err);
            }
        };

        let fetched = page.len();
        let images = to_images(page);
        let first_page = images.len();
        self.state.write().await.records.extend(images);

        info!(folder, first_page, "folder first page loaded");

        let remaining = (fetched == first_page_size).then(|| {
            tokio::spawn(load_remaining(
                self.disk.clone(),
                self.state.clone(),
                folder.to_string(),
                path,
                fetched,
                self.config.page_size,
            ))
        });

        Ok(FolderLoad::Loaded {
            first_page,
            remaining,
        })
    }

    pub async fn random_image(&self, scope: &FolderScope) -> Result<ImageRecord, BotError> {
        let state = self.state.read().await;
        let candidates: Vec<&ImageRecord> = in_scope(&state.records, scope).collect();

        candidates
            .choose(&mut rand::thread_rng())
            .map(|r| (*r).clone())
            .ok_or_else(|| BotError::EmptyFolder(scope.to_string()))
    }

    /// `None` when nothing was taken that day; no fallback.
    pub async fn random_image_on_date(
        &self,
        scope: &FolderScope,
        date: NaiveDate,
    ) -> Option<ImageRecord> {
        let state = self.state.read().await;
        let candidates: Vec<&ImageRecord> = in_scope(&state.records, scope)
            .filter(|r| r.captured_on(date))
            .collect();

        candidates
            .choose(&mut rand::thread_rng())
            .map(|r| (*r).clone())
    }

    pub async fn random_image_on_date_or_any(
        &self,
        scope: &FolderScope,
        date: NaiveDate,
    ) -> Result<DatedPick, BotError> {
        match self.random_image_on_date(scope, date).await {
            Some(record) => Ok(DatedPick::OnDate(record)),
            None => self.random_image(scope).await.map(DatedPick::Fallback),
        }
    }

    /// First record, in load order, whose name contains `query`.
    pub async fn find_by_name(&self, scope: &FolderScope, query: &str) -> Option<ImageRecord> {
        let state = self.state.read().await;
        let found = in_scope(&state.records, scope)
            .find(|r| r.matches_name(query))
            .cloned();
        found
    }

    /// Exact name first, then substring. Callback payloads carry full names.
    pub async fn get_image(&self, scope: &FolderScope, name: &str) -> Option<ImageRecord> {
        let state = self.state.read().await;
        let found = in_scope(&state.records, scope)
            .find(|r| r.is_named(name))
            .or_else(|| in_scope(&state.records, scope).find(|r| r.matches_name(name)))
            .cloned();
        found
    }

    pub async fn images_on_date(&self, scope: &FolderScope, date: NaiveDate) -> Vec<ImageRecord> {
        let state = self.state.read().await;
        let matches = in_scope(&state.records, scope)
            .filter(|r| r.captured_on(date))
            .cloned()
            .collect();
        matches
    }

    pub async fn count(&self, scope: &FolderScope) -> usize {
        let state = self.state.read().await;
        let count = in_scope(&state.records, scope).count();
        count
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Deletes the file remotely, then drops it from the cache. Only the exact
    /// normalized name matches. Downloads already in flight are left alone.
    pub async fn delete_image(
        &self,
        scope: &FolderScope,
        name: &str,
    ) -> Result<ImageRecord, BotError> {
        let record = {
            let state = self.state.read().await;
            let found = in_scope(&state.records, scope)
                .find(|r| r.is_named(name))
                .cloned();
            found
        }
        .ok_or_else(|| BotError::NoMatch(name.to_string()))?;

        self.disk.delete(&record.path).await.map_err(|err| {
            warn!(path = record.path.as_str(), error = %err, "remote delete failed");
            err
        })?;

        let mut state = self.state.write().await;
        if let Some(pos) = state.records.iter().position(|r| r.path == record.path) {
            state.records.remove(pos);
        }
        info!(path = record.path.as_str(), "image deleted");

        Ok(record)
    }

    /// Subfolders of the photo root, fetched fresh every time.
    pub async fn list_folders(&self) -> Result<Vec<FolderRecord>, DiskError> {
        let root = self.config.photo_root.as_str();
        let page_size = self.config.page_size;

        let mut folders = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .disk
                .list_folder(root, offset, page_size)
                .await
                .map_err(|err| {
                    warn!(root, offset, error = %err, "folder listing failed");
                    err
                })?;

            let fetched = page.len();
            folders.extend(page.into_iter().filter_map(RawEntry::into_folder));

            if fetched < page_size {
                break;
            }
            offset += fetched;
        }

        Ok(folders)
    }
}

fn in_scope<'a>(
    records: &'a [ImageRecord],
    scope: &'a FolderScope,
) -> impl Iterator<Item = &'a ImageRecord> + 'a {
    records
        .iter()
        .filter(move |r| scope.contains(&r.parent_folder_name))
}

fn to_images(page: Vec<RawEntry>) -> Vec<ImageRecord> {
    let loaded_at = disk::now();
    page.into_iter()
        .filter_map(|entry| entry.into_image(loaded_at))
        .collect()
}

async fn load_remaining(
    disk: Arc<dyn DiskApi>,
    state: Arc<RwLock<IndexState>>,
    folder: String,
    path: String,
    mut offset: usize,
    page_size: usize,
) -> usize {
    let mut added = 0;

    loop {
        let page = match disk.list_folder(&path, offset, page_size).await {
            Ok(page) => page,
            Err(err) => {
                warn!(
                    folder = folder.as_str(),
                    offset,
                    error = %err,
                    "background page failed, stopping"
                );
                break;
            }
        };

        let fetched = page.len();
        let images = to_images(page);
        added += images.len();
        state.write().await.records.extend(images);

        if fetched < page_size {
            break;
        }
        offset += fetched;
    }

    info!(folder = folder.as_str(), added, "folder background load finished");
    added
}
