use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::disk::DiskApi;
use crate::error::DiskError;
use crate::model::ImageRecord;

pub type Download = Result<Vec<u8>, DiskError>;

/// Fetches photo bytes. Batches fan out and wait for every item; one failed
/// item never fails the others.
#[derive(Clone)]
pub struct ContentLoader {
    disk: Arc<dyn DiskApi>,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Thumbnail,
    Original,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Thumbnail => "thumbnail",
            Kind::Original => "original",
        }
    }
}

impl ContentLoader {
    pub fn new(disk: Arc<dyn DiskApi>) -> Self {
        Self { disk }
    }

    pub async fn load_thumbnail(&self, record: &ImageRecord) -> Download {
        self.fetch(Kind::Thumbnail, &record.name, record.thumbnail_url())
            .await
    }

    pub async fn load_original(&self, record: &ImageRecord) -> Download {
        self.fetch(Kind::Original, &record.name, &record.file_url)
            .await
    }

    /// Results come back in input order.
    pub async fn load_thumbnails(&self, records: &[ImageRecord]) -> Vec<Download> {
        join_all(records.iter().map(|r| self.load_thumbnail(r))).await
    }

    pub async fn load_originals(&self, records: &[ImageRecord]) -> Vec<Download> {
        join_all(records.iter().map(|r| self.load_original(r))).await
    }

    /// Thumbnail by raw link, for likes that only know their URLs.
    pub async fn load_thumbnail_url(&self, name: &str, url: &str) -> Download {
        self.fetch(Kind::Thumbnail, name, url).await
    }

    pub async fn load_original_url(&self, name: &str, url: &str) -> Download {
        self.fetch(Kind::Original, name, url).await
    }

    async fn fetch(&self, kind: Kind, name: &str, url: &str) -> Download {
        let started = Instant::now();
        let result = self.disk.download(url).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(bytes) => info!(
                kind = kind.as_str(),
                name,
                bytes = bytes.len(),
                elapsed_ms,
                "download finished"
            ),
            Err(err) => warn!(
                kind = kind.as_str(),
                name,
                elapsed_ms,
                error = %err,
                "download failed"
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::fixture::{file_url, jpeg, preview_url, FixtureDisk};
    use crate::disk::now;

    const VACATION: &str = "disk:/Photos/Vacation";

    fn setup() -> (Arc<FixtureDisk>, Vec<ImageRecord>) {
        let entries = vec![
            jpeg(VACATION, "a.jpg", None),
            jpeg(VACATION, "b.jpg", None),
            jpeg(VACATION, "c.jpg", None),
        ];
        let disk = Arc::new(
            FixtureDisk::new()
                .with_folder(VACATION, entries.clone())
                .with_blobs_for_all(),
        );
        let records = entries
            .into_iter()
            .filter_map(|e| e.into_image(now()))
            .collect();
        (disk, records)
    }

    #[tokio::test]
    async fn single_fetches_use_the_right_link() {
        let (disk, records) = setup();
        let loader = ContentLoader::new(disk.clone());

        assert_eq!(loader.load_thumbnail(&records[0]).await.unwrap(), b"thumb:a.jpg");
        assert_eq!(loader.load_original(&records[0]).await.unwrap(), b"original:a.jpg");
        assert_eq!(
            disk.calls().downloads,
            vec![preview_url("a.jpg"), file_url("a.jpg")]
        );
    }

    #[tokio::test]
    async fn batch_keeps_order_and_survives_failures() {
        let (disk, records) = setup();
        disk.fail_download(&file_url("b.jpg"));
        let loader = ContentLoader::new(disk.clone());

        let originals = loader.load_originals(&records).await;
        assert_eq!(originals.len(), 3);
        assert_eq!(originals[0].as_ref().unwrap(), b"original:a.jpg");
        assert!(originals[1].is_err());
        assert_eq!(originals[2].as_ref().unwrap(), b"original:c.jpg");

        let thumbs = loader.load_thumbnails(&records).await;
        assert!(thumbs.iter().all(|t| t.is_ok()));
        assert_eq!(disk.calls().downloads.len(), 6);
    }
}
