//! Per-chat favourites, mirrored into a public folder on the disk.
//!
//! Each chat owns `<likes_root>/<chat_id>`. The folder is provisioned on first
//! use: looked up, created if missing, then published. A folder that was
//! created but could not be published is remembered as
//! [`Provisioning::Unpublished`] and the publish is retried on the next access.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::DiskConfig;
use crate::disk::{self, DiskApi};
use crate::error::{BotError, DiskError};
use crate::loader::ContentLoader;
use crate::model::{image::normalize_name, ImageRecord, LikeEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeOutcome {
    Added,
    AlreadyLiked,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Provisioning {
    #[default]
    Unknown,
    Unpublished,
    Published {
        public_url: String,
    },
}

#[derive(Debug, Default)]
struct ChatLikes {
    entries: Vec<LikeEntry>,
    /// Whether the remote folder has been listed this session.
    listed: bool,
    folder: Provisioning,
}

impl ChatLikes {
    fn position(&self, name: &str) -> Option<usize> {
        let name = normalize_name(name);
        self.entries
            .iter()
            .position(|e| normalize_name(&e.image_name) == name)
    }
}

pub struct LikesStore {
    disk: Arc<dyn DiskApi>,
    loader: ContentLoader,
    config: Arc<DiskConfig>,
    chats: Mutex<HashMap<i64, ChatLikes>>,
}

impl LikesStore {
    pub fn new(disk: Arc<dyn DiskApi>, loader: ContentLoader, config: Arc<DiskConfig>) -> Self {
        Self {
            disk,
            loader,
            config,
            chats: Mutex::new(HashMap::new()),
        }
    }

    pub async fn add_like(
        &self,
        chat_id: i64,
        record: &ImageRecord,
    ) -> Result<LikeOutcome, BotError> {
        let folder = self.config.likes_folder(chat_id);
        self.provision(chat_id).await?;
        self.list_likes(chat_id).await?;

        if self.chat(chat_id).await.position(&record.name).is_some() {
            debug!(chat_id, name = record.name.as_str(), "image already liked");
            return Ok(LikeOutcome::AlreadyLiked);
        }

        let entry = LikeEntry::from_record(chat_id, &folder, record);
        self.disk
            .copy(&record.path, &entry.remote_path)
            .await
            .map_err(|err| {
                warn!(
                    chat_id,
                    from = record.path.as_str(),
                    error = %err,
                    "copy into likes folder failed"
                );
                err
            })?;

        let mut chats = self.chats.lock().await;
        let likes = chats.entry(chat_id).or_default();
        if likes.position(&record.name).is_some() {
            return Ok(LikeOutcome::AlreadyLiked);
        }
        likes.entries.push(entry);
        info!(chat_id, name = record.name.as_str(), "image liked");

        Ok(LikeOutcome::Added)
    }

    /// Cached likes; the first call of a session lists the remote folder.
    pub async fn list_likes(&self, chat_id: i64) -> Result<Vec<LikeEntry>, BotError> {
        {
            let chats = self.chats.lock().await;
            if let Some(likes) = chats.get(&chat_id) {
                if likes.listed || !likes.entries.is_empty() {
                    return Ok(likes.entries.clone());
                }
            }
        }

        let remote = self.fetch_remote_likes(chat_id).await?;

        let mut chats = self.chats.lock().await;
        let likes = chats.entry(chat_id).or_default();
        for entry in remote {
            if likes.position(&entry.image_name).is_none() {
                likes.entries.push(entry);
            }
        }
        likes.listed = true;

        Ok(likes.entries.clone())
    }

    /// Thumbnails of every like, downloading the ones not cached yet.
    pub async fn like_thumbnails(
        &self,
        chat_id: i64,
    ) -> Result<Vec<(String, Vec<u8>)>, BotError> {
        let likes = self.list_likes(chat_id).await?;

        let missing: Vec<(String, String)> = likes
            .iter()
            .filter(|e| e.thumbnail.is_none())
            .filter_map(|e| Some((e.image_name.clone(), e.thumbnail_url()?.to_string())))
            .collect();

        let fetched = join_all(
            missing
                .iter()
                .map(|(name, url)| self.loader.load_thumbnail_url(name, url)),
        )
        .await;

        let mut chats = self.chats.lock().await;
        let state = chats.entry(chat_id).or_default();
        for ((name, _), bytes) in missing.into_iter().zip(fetched) {
            let (Some(pos), Ok(bytes)) = (state.position(&name), bytes) else {
                continue;
            };
            state.entries[pos].thumbnail = Some(bytes);
        }

        let thumbnails = state
            .entries
            .iter()
            .filter_map(|e| Some((e.image_name.clone(), e.thumbnail.clone()?)))
            .collect();
        Ok(thumbnails)
    }

    pub async fn public_folder_url(&self, chat_id: i64) -> Result<String, BotError> {
        self.provision(chat_id).await
    }

    /// Every liked original in one zip, entries named `001.jpg`, `002.jpg`, ...
    /// Originals that fail to download are left out.
    pub async fn export_originals_archive(&self, chat_id: i64) -> Result<Vec<u8>, BotError> {
        let likes = self.list_likes(chat_id).await?;
        if likes.is_empty() {
            return Err(BotError::NoMatch("likes".into()));
        }

        let downloads = join_all(likes.iter().filter_map(|e| {
            let url = e.file_url.as_deref()?;
            Some(self.loader.load_original_url(&e.image_name, url))
        }))
        .await;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut written = 0;
        for bytes in downloads.into_iter().flatten() {
            written += 1;
            zip.start_file(format!("{written:03}.jpg"), options)?;
            zip.write_all(&bytes)
                .map_err(|e| BotError::Archive(e.to_string()))?;
        }

        if written == 0 {
            return Err(BotError::Archive(
                "no liked original could be downloaded".into(),
            ));
        }

        let archive = zip.finish()?.into_inner();
        info!(chat_id, files = written, bytes = archive.len(), "likes archive built");
        Ok(archive)
    }

    /// Deletes the copy in the likes folder and forgets the like.
    pub async fn remove_like(&self, chat_id: i64, name: &str) -> Result<LikeEntry, BotError> {
        self.list_likes(chat_id).await?;

        let entry = {
            let chats = self.chats.lock().await;
            chats
                .get(&chat_id)
                .and_then(|likes| likes.position(name).map(|pos| likes.entries[pos].clone()))
                .ok_or_else(|| BotError::NoMatch(name.to_string()))?
        };

        match self.disk.delete(&entry.remote_path).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!(
                    chat_id,
                    path = entry.remote_path.as_str(),
                    "liked copy already gone"
                );
            }
            Err(err) => return Err(err.into()),
        }

        let mut chats = self.chats.lock().await;
        if let Some(likes) = chats.get_mut(&chat_id) {
            if let Some(pos) = likes.position(name) {
                likes.entries.remove(pos);
            }
        }
        info!(chat_id, name, "like removed");

        Ok(entry)
    }

    pub async fn provisioning(&self, chat_id: i64) -> Provisioning {
        self.chat(chat_id).await.folder
    }

    async fn chat(&self, chat_id: i64) -> ChatLikesView {
        let chats = self.chats.lock().await;
        chats
            .get(&chat_id)
            .map(|likes| ChatLikesView {
                names: likes.entries.iter().map(|e| e.image_name.clone()).collect(),
                folder: likes.folder.clone(),
            })
            .unwrap_or_default()
    }

    async fn set_folder(&self, chat_id: i64, folder: Provisioning) {
        self.chats.lock().await.entry(chat_id).or_default().folder = folder;
    }

    /// Unknown -> (create) -> Unpublished -> (publish) -> Published.
    async fn provision(&self, chat_id: i64) -> Result<String, BotError> {
        let path = self.config.likes_folder(chat_id);

        match self.chat(chat_id).await.folder {
            Provisioning::Published { public_url } => return Ok(public_url),
            Provisioning::Unpublished => {
                debug!(chat_id, path = path.as_str(), "retrying publish of likes folder");
            }
            Provisioning::Unknown => match self.disk.resource(&path).await? {
                Some(meta) => {
                    if let Some(public_url) = meta.public_url {
                        let published = Provisioning::Published {
                            public_url: public_url.clone(),
                        };
                        self.set_folder(chat_id, published).await;
                        return Ok(public_url);
                    }
                    self.set_folder(chat_id, Provisioning::Unpublished).await;
                }
                None => {
                    let outcome = self.disk.create_folder(&path).await?;
                    info!(chat_id, path = path.as_str(), ?outcome, "likes folder created");
                    self.set_folder(chat_id, Provisioning::Unpublished).await;
                }
            },
        }

        if let Err(err) = self.disk.publish(&path).await {
            error!(
                chat_id,
                path = path.as_str(),
                error = %err,
                "likes folder created but not published"
            );
            return Err(BotError::FolderProvisioningIncomplete(path));
        }

        let public_url = self
            .disk
            .resource(&path)
            .await?
            .and_then(|meta| meta.public_url)
            .ok_or_else(|| {
                error!(
                    chat_id,
                    path = path.as_str(),
                    "published likes folder has no public link"
                );
                BotError::FolderProvisioningIncomplete(path.clone())
            })?;

        let published = Provisioning::Published {
            public_url: public_url.clone(),
        };
        self.set_folder(chat_id, published).await;
        info!(chat_id, path = path.as_str(), "likes folder published");

        Ok(public_url)
    }

    async fn fetch_remote_likes(&self, chat_id: i64) -> Result<Vec<LikeEntry>, DiskError> {
        let path = self.config.likes_folder(chat_id);
        let page_size = self.config.page_size;
        let loaded_at = disk::now();

        let mut entries = Vec::new();
        let mut offset = 0;
        loop {
            let page = match self.disk.list_folder(&path, offset, page_size).await {
                Ok(page) => page,
                Err(err) if err.is_not_found() => break,
                Err(err) => {
                    warn!(
                        chat_id,
                        path = path.as_str(),
                        error = %err,
                        "listing likes folder failed"
                    );
                    return Err(err);
                }
            };

            let fetched = page.len();
            entries.extend(
                page.into_iter()
                    .filter_map(|raw| raw.into_image(loaded_at))
                    .map(|record| LikeEntry {
                        chat_id,
                        image_name: record.name,
                        remote_path: record.path,
                        file_url: Some(record.file_url),
                        preview_url: record.preview_url,
                        thumbnail: None,
                    }),
            );

            if fetched < page_size {
                break;
            }
            offset += fetched;
        }

        debug!(chat_id, likes = entries.len(), "likes folder listed");
        Ok(entries)
    }
}

#[derive(Debug, Default)]
struct ChatLikesView {
    names: Vec<String>,
    folder: Provisioning,
}

impl ChatLikesView {
    fn position(&self, name: &str) -> Option<usize> {
        let name = normalize_name(name);
        self.names.iter().position(|n| normalize_name(n) == name)
    }
}
