use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One remote JPEG known to the index. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub name: String,
    /// Full remote path, e.g. `disk:/Photos/Vacation/IMG_1.jpg`.
    pub path: String,
    pub file_url: String,
    pub preview_url: Option<String>,
    pub mime_type: String,
    pub size_bytes: Option<u64>,
    pub captured_at: NaiveDateTime,
    pub parent_folder_name: String,
}

impl ImageRecord {
    /// Case-insensitive substring match; `_` and space are interchangeable.
    pub fn matches_name(&self, query: &str) -> bool {
        let query = normalize_name(query);
        !query.is_empty() && normalize_name(&self.name).contains(&query)
    }

    pub fn is_named(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }

    pub fn captured_on(&self, date: NaiveDate) -> bool {
        self.captured_at.date() == date
    }

    pub fn thumbnail_url(&self) -> &str {
        self.preview_url.as_deref().unwrap_or(&self.file_url)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('_', " ")
}

pub fn is_jpeg(name: &str, mime_type: &str) -> bool {
    let name = name.to_ascii_lowercase();
    (name.ends_with(".jpg") || name.ends_with(".jpeg"))
        && mime_type.to_ascii_lowercase().contains("jpeg")
}

/// Last path segment before the file name: `disk:/a/b/c.jpg` -> `b`.
pub fn parent_folder_of(path: &str) -> Option<String> {
    let (dir, _) = path.rsplit_once('/')?;
    let segment = dir.rsplit('/').next()?;
    let segment = segment.rsplit(':').next().unwrap_or(segment);

    if segment.is_empty() {
        None
    } else {
        Some(segment.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ImageRecord {
        ImageRecord {
            name: name.into(),
            path: format!("disk:/Photos/Vacation/{name}"),
            file_url: "https://example.test/file".into(),
            preview_url: None,
            mime_type: "image/jpeg".into(),
            size_bytes: Some(10),
            captured_at: NaiveDate::from_ymd_opt(2020, 1, 2)
                .and_then(|d| d.and_hms_opt(10, 0, 0))
                .unwrap(),
            parent_folder_name: "Vacation".into(),
        }
    }

    #[test]
    fn name_match_ignores_case_and_underscores() {
        let img = record("IMG_ABC123.jpg");
        assert!(img.matches_name("abc"));
        assert!(img.matches_name("ABC"));
        assert!(img.matches_name("img_abc"));
        assert!(img.matches_name("img abc"));
        assert!(!img.matches_name("xyz"));
        assert!(!img.matches_name("  "));
    }

    #[test]
    fn jpeg_filter_needs_extension_and_mime() {
        assert!(is_jpeg("a.JPG", "image/jpeg"));
        assert!(is_jpeg("a.jpeg", "image/jpeg"));
        assert!(!is_jpeg("a.png", "image/jpeg"));
        assert!(!is_jpeg("a.jpg", "image/png"));
    }

    #[test]
    fn parent_folder_is_segment_before_file() {
        assert_eq!(
            parent_folder_of("disk:/Photos/Vacation/IMG_1.jpg").as_deref(),
            Some("Vacation")
        );
        assert_eq!(parent_folder_of("disk:/IMG_1.jpg"), None);
        assert_eq!(parent_folder_of("disk:/Top/IMG_1.jpg").as_deref(), Some("Top"));
        assert_eq!(parent_folder_of("IMG_1.jpg"), None);
    }

    #[test]
    fn thumbnail_falls_back_to_original() {
        let mut img = record("a.jpg");
        assert_eq!(img.thumbnail_url(), "https://example.test/file");
        img.preview_url = Some("https://example.test/preview".into());
        assert_eq!(img.thumbnail_url(), "https://example.test/preview");
    }
}
