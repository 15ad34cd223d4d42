use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

const DEFAULT_DISK_API_URL: &str = "https://cloud-api.yandex.net/v1/disk";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Process configuration, read from the environment (and `.env` via `dotenvy`).
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram: TelegramConfig,
    pub disk: DiskConfig,
    /// Only this Telegram username is served.
    pub allowed_username: String,
    pub bind_addr: String,
    /// Prefix for "open in browser" links in photo captions.
    pub open_in_browser_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub api_url: String,
    pub webhook_secret: Option<String>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DiskConfig {
    pub token: String,
    pub api_url: String,
    /// Folder whose subfolders hold the photos.
    pub photo_root: String,
    pub default_folder: String,
    /// Parent of the per-chat likes folders.
    pub likes_root: String,
    pub first_page_size: usize,
    pub page_size: usize,
    pub timeout: Duration,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let telegram = TelegramConfig {
            token: required("TELEGRAM_BOT_TOKEN")?,
            api_url: var_or("TELEGRAM_API_URL", DEFAULT_TELEGRAM_API_URL.to_string())?,
            webhook_secret: optional("TELEGRAM_WEBHOOK_SECRET"),
            webhook_url: optional("TELEGRAM_WEBHOOK_URL"),
        };

        let disk = DiskConfig {
            token: required("DISK_OAUTH_TOKEN")?,
            api_url: var_or("DISK_API_URL", DEFAULT_DISK_API_URL.to_string())?,
            photo_root: var_or("DISK_PHOTO_ROOT", "disk:/Photos".to_string())?,
            default_folder: var_or("DISK_DEFAULT_FOLDER", "Camera".to_string())?,
            likes_root: var_or("DISK_LIKES_ROOT", "disk:/Likes".to_string())?,
            first_page_size: var_or("DISK_FIRST_PAGE_SIZE", 100)?,
            page_size: var_or("DISK_PAGE_SIZE", 1000)?,
            timeout: Duration::from_secs(var_or("HTTP_TIMEOUT_SECS", 30)?),
        };

        if disk.first_page_size == 0 || disk.page_size == 0 {
            return Err(anyhow!("DISK_FIRST_PAGE_SIZE and DISK_PAGE_SIZE must be positive"));
        }

        Ok(Self {
            telegram,
            disk,
            allowed_username: required("ALLOWED_USERNAME")?
                .trim_start_matches('@')
                .to_string(),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:3000".to_string())?,
            open_in_browser_url: optional("OPEN_IN_BROWSER_URL"),
        })
    }
}

impl DiskConfig {
    pub fn folder_path(&self, folder: &str) -> String {
        format!("{}/{}", self.photo_root.trim_end_matches('/'), folder)
    }

    pub fn likes_folder(&self, chat_id: i64) -> String {
        format!("{}/{}", self.likes_root.trim_end_matches('/'), chat_id)
    }
}

fn required(key: &str) -> Result<String> {
    dotenvy::var(key).with_context(|| format!("{key} must be set"))
}

fn optional(key: &str) -> Option<String> {
    dotenvy::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has an invalid value {raw:?}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
impl DiskConfig {
    pub fn for_tests() -> Self {
        Self {
            token: "token".into(),
            api_url: "http://disk.test".into(),
            photo_root: "disk:/Photos".into(),
            default_folder: "Vacation".into(),
            likes_root: "disk:/Likes".into(),
            first_page_size: 2,
            page_size: 2,
            timeout: Duration::from_secs(5),
        }
    }
}
