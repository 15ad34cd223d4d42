use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use super::{CreateOutcome, DiskApi, Envelope, RawEntry, ResourceMeta};
use crate::config::DiskConfig;
use crate::error::DiskError;

const LISTING_FIELDS: &str = "_embedded.items.name,_embedded.items.type,_embedded.items.path,\
_embedded.items.file,_embedded.items.preview,_embedded.items.mime_type,\
_embedded.items.size,_embedded.items.exif";

/// REST client for the Yandex Disk API.
#[derive(Clone)]
pub struct YandexDisk {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl YandexDisk {
    pub fn new(config: &DiskConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build disk http client")?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.api_url)
    }

    async fn send(&self, op: &'static str, request: RequestBuilder) -> Result<Response, DiskError> {
        let started = Instant::now();
        let response = request
            .header(AUTHORIZATION, format!("OAuth {}", self.token))
            .send()
            .await
            .map_err(|err| {
                warn!(op, error = %err, "disk request failed");
                DiskError::from(err)
            })?;

        let status = response.status();
        debug!(
            op,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "disk request"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(DiskError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DiskApi for YandexDisk {
    async fn list_folder(
        &self,
        path: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RawEntry>, DiskError> {
        let request = self.client.get(self.url("/resources")).query(&[
            ("path", path.to_string()),
            ("offset", offset.to_string()),
            ("limit", limit.to_string()),
            ("fields", LISTING_FIELDS.to_string()),
        ]);

        let body = self.send("list", request).await?.text().await?;
        Envelope::LISTING.decode(&body)
    }

    async fn resource(&self, path: &str) -> Result<Option<ResourceMeta>, DiskError> {
        let request = self
            .client
            .get(self.url("/resources"))
            .query(&[("path", path), ("fields", "path,type,public_url")]);

        match self.send("resource", request).await {
            Ok(response) => {
                let body = response.text().await?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_folder(&self, path: &str) -> Result<CreateOutcome, DiskError> {
        let request = self
            .client
            .put(self.url("/resources"))
            .query(&[("path", path)]);

        match self.send("create_folder", request).await {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(err) if err.is_conflict() => Ok(CreateOutcome::AlreadyExists),
            Err(err) => Err(err),
        }
    }

    async fn publish(&self, path: &str) -> Result<(), DiskError> {
        let request = self
            .client
            .put(self.url("/resources/publish"))
            .query(&[("path", path)]);

        self.send("publish", request).await.map(|_| ())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), DiskError> {
        let request = self
            .client
            .post(self.url("/resources/copy"))
            .query(&[("from", from), ("path", to)]);

        match self.send("copy", request).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_conflict() => {
                debug!(from, to, "copy target already exists");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), DiskError> {
        let request = self
            .client
            .delete(self.url("/resources"))
            .query(&[("path", path)]);

        self.send("delete", request).await.map(|_| ())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, DiskError> {
        let response = self.send("download", self.client.get(url)).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        Ok(response.bytes().await?.to_vec())
    }
}
