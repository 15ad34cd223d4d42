//! Storage backend access.
//!
//! Everything above this module talks to the disk through [`DiskApi`], so the
//! index, loader and likes store can run against fixture data in tests.

pub mod envelope;
pub mod yandex;

#[cfg(test)]
pub mod fixture;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DiskError;
use crate::model::{
    image::{is_jpeg, parent_folder_of},
    FolderRecord, ImageRecord,
};

pub use envelope::Envelope;
pub use yandex::YandexDisk;

#[async_trait]
pub trait DiskApi: Send + Sync {
    /// One page of a folder listing.
    async fn list_folder(
        &self,
        path: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RawEntry>, DiskError>;

    /// Resource metadata, `None` when the path does not exist.
    async fn resource(&self, path: &str) -> Result<Option<ResourceMeta>, DiskError>;

    async fn create_folder(&self, path: &str) -> Result<CreateOutcome, DiskError>;

    async fn publish(&self, path: &str) -> Result<(), DiskError>;

    /// Copying onto an existing target counts as success.
    async fn copy(&self, from: &str, to: &str) -> Result<(), DiskError>;

    async fn delete(&self, path: &str) -> Result<(), DiskError>;

    async fn download(&self, url: &str) -> Result<Vec<u8>, DiskError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceMeta {
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub public_url: Option<String>,
}

/// Listing entry as the backend sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub exif: Option<RawExif>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExif {
    #[serde(default)]
    pub date_time: Option<String>,
}

impl RawEntry {
    /// JPEG files only; capture time falls back to `loaded_at`.
    pub fn into_image(self, loaded_at: NaiveDateTime) -> Option<ImageRecord> {
        let mime_type = self.mime_type.unwrap_or_default();
        if self.kind == "dir" || !is_jpeg(&self.name, &mime_type) {
            return None;
        }

        let Some(file_url) = self.file else {
            debug!(name = self.name.as_str(), "listing entry has no download link");
            return None;
        };

        let captured_at = self
            .exif
            .and_then(|exif| exif.date_time)
            .as_deref()
            .and_then(parse_captured_at)
            .unwrap_or(loaded_at);

        let parent_folder_name = parent_folder_of(&self.path).unwrap_or_default();

        Some(ImageRecord {
            name: self.name,
            path: self.path,
            file_url,
            preview_url: self.preview,
            mime_type,
            size_bytes: self.size,
            captured_at,
            parent_folder_name,
        })
    }

    pub fn into_folder(self) -> Option<FolderRecord> {
        (self.kind == "dir").then(|| FolderRecord {
            name: self.name,
            kind: self.kind,
        })
    }
}

pub fn parse_captured_at(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y:%m:%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
