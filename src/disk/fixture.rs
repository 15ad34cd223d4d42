//! In-memory disk backed by fixture entries, with call logs for assertions.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CreateOutcome, DiskApi, RawEntry, RawExif, ResourceMeta};
use crate::error::DiskError;

#[derive(Default)]
pub struct FixtureDisk {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    folders: HashMap<String, Vec<RawEntry>>,
    public_urls: HashMap<String, String>,
    blobs: HashMap<String, Vec<u8>>,
    failing_lists: HashSet<String>,
    failing_urls: HashSet<String>,
    publish_failures: usize,
    calls: Calls,
}

#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub lists: Vec<(String, usize, usize)>,
    pub resources: Vec<String>,
    pub creates: Vec<String>,
    pub publishes: Vec<String>,
    pub copies: Vec<(String, String)>,
    pub deletes: Vec<String>,
    pub downloads: Vec<String>,
}

pub fn jpeg(folder_path: &str, name: &str, exif_date: Option<&str>) -> RawEntry {
    RawEntry {
        name: name.into(),
        kind: "file".into(),
        path: format!("{folder_path}/{name}"),
        file: Some(file_url(name)),
        preview: Some(preview_url(name)),
        mime_type: Some("image/jpeg".into()),
        size: Some(2048),
        exif: exif_date.map(|d| RawExif {
            date_time: Some(d.into()),
        }),
    }
}

pub fn dir(parent: &str, name: &str) -> RawEntry {
    RawEntry {
        name: name.into(),
        kind: "dir".into(),
        path: format!("{parent}/{name}"),
        ..RawEntry::default()
    }
}

pub fn file_url(name: &str) -> String {
    format!("https://downloader.disk.test/file/{name}")
}

pub fn preview_url(name: &str) -> String {
    format!("https://downloader.disk.test/preview/{name}")
}

impl FixtureDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(self, path: &str, entries: Vec<RawEntry>) -> Self {
        self.state
            .lock()
            .unwrap()
            .folders
            .insert(path.to_string(), entries);
        self
    }

    /// Registers download bodies for every file and preview link in the folders.
    pub fn with_blobs_for_all(self) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let urls: Vec<(String, Vec<u8>)> = state
                .folders
                .values()
                .flatten()
                .flat_map(|e| {
                    let mut out = Vec::new();
                    if let Some(file) = &e.file {
                        out.push((file.clone(), format!("original:{}", e.name).into_bytes()));
                    }
                    if let Some(preview) = &e.preview {
                        out.push((preview.clone(), format!("thumb:{}", e.name).into_bytes()));
                    }
                    out
                })
                .collect();
            state.blobs.extend(urls);
        }
        self
    }

    pub fn fail_list(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_lists
            .insert(path.to_string());
    }

    pub fn heal_list(&self, path: &str) {
        self.state.lock().unwrap().failing_lists.remove(path);
    }

    pub fn fail_download(&self, url: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_urls
            .insert(url.to_string());
    }

    pub fn fail_next_publishes(&self, n: usize) {
        self.state.lock().unwrap().publish_failures = n;
    }

    pub fn calls(&self) -> Calls {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn entries(&self, folder_path: &str) -> Vec<RawEntry> {
        self.state
            .lock()
            .unwrap()
            .folders
            .get(folder_path)
            .cloned()
            .unwrap_or_default()
    }
}

fn not_found(path: &str) -> DiskError {
    DiskError::Status {
        status: 404,
        body: format!("{path} not found"),
    }
}

#[async_trait]
impl DiskApi for FixtureDisk {
    async fn list_folder(
        &self,
        path: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RawEntry>, DiskError> {
        let mut state = self.state.lock().unwrap();
        state.calls.lists.push((path.to_string(), offset, limit));

        if state.failing_lists.contains(path) {
            return Err(DiskError::FetchFailed("connection reset".into()));
        }

        let entries = state.folders.get(path).ok_or_else(|| not_found(path))?;
        Ok(entries.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn resource(&self, path: &str) -> Result<Option<ResourceMeta>, DiskError> {
        let mut state = self.state.lock().unwrap();
        state.calls.resources.push(path.to_string());

        if !state.folders.contains_key(path) {
            return Ok(None);
        }

        Ok(Some(ResourceMeta {
            path: path.to_string(),
            kind: "dir".into(),
            public_url: state.public_urls.get(path).cloned(),
        }))
    }

    async fn create_folder(&self, path: &str) -> Result<CreateOutcome, DiskError> {
        let mut state = self.state.lock().unwrap();
        state.calls.creates.push(path.to_string());

        if state.folders.contains_key(path) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        state.folders.insert(path.to_string(), Vec::new());
        Ok(CreateOutcome::Created)
    }

    async fn publish(&self, path: &str) -> Result<(), DiskError> {
        let mut state = self.state.lock().unwrap();
        state.calls.publishes.push(path.to_string());

        if state.publish_failures > 0 {
            state.publish_failures -= 1;
            return Err(DiskError::Status {
                status: 503,
                body: "try later".into(),
            });
        }
        if !state.folders.contains_key(path) {
            return Err(not_found(path));
        }

        let url = format!("https://disk.test/d/{}", path.replace('/', "-"));
        state.public_urls.insert(path.to_string(), url);
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), DiskError> {
        let mut state = self.state.lock().unwrap();
        state.calls.copies.push((from.to_string(), to.to_string()));

        let source = state
            .folders
            .values()
            .flatten()
            .find(|e| e.path == from)
            .cloned()
            .ok_or_else(|| not_found(from))?;

        let (target_dir, _) = to.rsplit_once('/').ok_or_else(|| not_found(to))?;
        let target = state
            .folders
            .get_mut(target_dir)
            .ok_or_else(|| not_found(target_dir))?;

        if !target.iter().any(|e| e.path == to) {
            target.push(RawEntry {
                path: to.to_string(),
                ..source
            });
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), DiskError> {
        let mut state = self.state.lock().unwrap();
        state.calls.deletes.push(path.to_string());

        for entries in state.folders.values_mut() {
            if let Some(pos) = entries.iter().position(|e| e.path == path) {
                entries.remove(pos);
                return Ok(());
            }
        }
        Err(not_found(path))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, DiskError> {
        let mut state = self.state.lock().unwrap();
        state.calls.downloads.push(url.to_string());

        if state.failing_urls.contains(url) {
            return Err(DiskError::FetchFailed("timed out".into()));
        }
        state.blobs.get(url).cloned().ok_or_else(|| not_found(url))
    }
}
