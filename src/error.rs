use thiserror::Error;

/// Failures talking to the storage backend.
#[derive(Debug, Error)]
pub enum DiskError {
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("fetch failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("decode failed: {0}")]
    DecodeFailed(String),
}

impl DiskError {
    pub fn status(&self) -> Option<u16> {
        match self {
            DiskError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

impl From<reqwest::Error> for DiskError {
    fn from(err: reqwest::Error) -> Self {
        DiskError::FetchFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DiskError {
    fn from(err: serde_json::Error) -> Self {
        DiskError::DecodeFailed(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Disk(#[from] DiskError),

    #[error("no images in {0}")]
    EmptyFolder(String),

    #[error("nothing matches {0}")]
    NoMatch(String),

    #[error("likes folder {0} was created but is not published yet")]
    FolderProvisioningIncomplete(String),

    #[error("archive failed: {0}")]
    Archive(String),
}

impl BotError {
    /// Legitimate empty results, as opposed to failures.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, BotError::EmptyFolder(_) | BotError::NoMatch(_))
    }
}

impl From<zip::result::ZipError> for BotError {
    fn from(err: zip::result::ZipError) -> Self {
        BotError::Archive(err.to_string())
    }
}
