use serde::Serialize;

use super::ImageRecord;

/// A chat's favourite, mirrored as a copy inside the chat's public folder.
#[derive(Debug, Clone, Serialize)]
pub struct LikeEntry {
    pub chat_id: i64,
    pub image_name: String,
    /// Path of the copy inside the likes folder.
    pub remote_path: String,
    pub file_url: Option<String>,
    pub preview_url: Option<String>,
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
}

impl LikeEntry {
    pub fn from_record(chat_id: i64, folder: &str, record: &ImageRecord) -> Self {
        Self {
            chat_id,
            image_name: record.name.clone(),
            remote_path: format!("{folder}/{}", record.name),
            file_url: Some(record.file_url.clone()),
            preview_url: record.preview_url.clone(),
            thumbnail: None,
        }
    }

    pub fn thumbnail_url(&self) -> Option<&str> {
        self.preview_url.as_deref().or(self.file_url.as_deref())
    }
}
