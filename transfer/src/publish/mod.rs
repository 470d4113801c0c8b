//! Durable publishing of a transferred file.
//!
//! [`Publisher`] derives the object key, creates a storage client through a
//! [`StoreConnector`], writes the bytes as one object and returns a signed
//! read-only URL. Client construction through write completion runs under
//! one deadline; the client is dropped when `publish` returns.

pub mod gcs;

use crate::model::{PublishedArtifact, TransferJob};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Datelike, NaiveDate, Utc};
use metrics::{counter, histogram};
use reconcile_core::config::{KeyStrategy, StorageConfig};
use reconcile_core::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object {0} already exists")]
    AlreadyExists(String),

    #[error("client setup failed: {0}")]
    Client(String),

    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    /// Fail instead of replacing an existing object.
    CreateOnly,
}

/// A storage client bound to one bucket.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Creates the object in a single request; it is visible only once complete.
    async fn write(
        &self,
        key: &str,
        content: Bytes,
        content_type: &str,
        mode: WriteMode,
    ) -> std::result::Result<(), StoreError>;

    /// Read-only URL for `key`, valid for `expires_in`.
    async fn signed_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> std::result::Result<String, StoreError>;
}

#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self) -> std::result::Result<Box<dyn DurableStore>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct ObjectKeys {
    prefix: String,
    strategy: KeyStrategy,
}

impl ObjectKeys {
    pub fn new(prefix: impl Into<String>, strategy: KeyStrategy) -> Self {
        Self {
            prefix: prefix.into().trim_matches('/').to_string(),
            strategy,
        }
    }

    pub fn key_for(&self, file_name: &str, date: NaiveDate) -> String {
        let mut segments: Vec<String> = Vec::with_capacity(6);
        if !self.prefix.is_empty() {
            segments.push(self.prefix.clone());
        }

        match self.strategy {
            KeyStrategy::Flat => {}
            KeyStrategy::Monthly => {
                segments.push(format!("{:04}", date.year()));
                segments.push(format!("{:02}", date.month()));
            }
            KeyStrategy::Random => {
                segments.push(format!("{:04}", date.year()));
                segments.push(format!("{:02}", date.month()));
                segments.push(format!("{:02}", date.day()));
                segments.push(Uuid::new_v4().simple().to_string());
            }
        }

        segments.push(file_name.to_string());
        segments.join("/")
    }

    pub fn write_mode(&self) -> WriteMode {
        match self.strategy {
            KeyStrategy::Random => WriteMode::CreateOnly,
            KeyStrategy::Flat | KeyStrategy::Monthly => WriteMode::Overwrite,
        }
    }
}

pub fn content_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" => "text/csv",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        _ => "application/octet-stream",
    }
}

pub struct Publisher {
    connector: Arc<dyn StoreConnector>,
    keys: ObjectKeys,
    expiry: Duration,
    timeout: Duration,
}

impl Publisher {
    pub fn new(connector: Arc<dyn StoreConnector>, config: &StorageConfig) -> Self {
        Self {
            connector,
            keys: ObjectKeys::new(&config.key_prefix, config.key_strategy),
            expiry: Duration::from_secs(config.signed_url_expiry_secs),
            timeout: Duration::from_secs(config.publish_timeout_secs),
        }
    }

    #[instrument(skip(self, job), fields(file = %job.file_name, size_bytes = job.content.len()))]
    pub async fn publish(&self, job: &TransferJob, date: NaiveDate) -> Result<PublishedArtifact> {
        let key = self.keys.key_for(&job.file_name, date);
        let content_type = content_type(&job.file_name);
        let mode = self.keys.write_mode();
        let start = Instant::now();

        let store = tokio::time::timeout(self.timeout, async {
            let store = self.connector.connect().await?;
            store
                .write(&key, job.content.clone(), content_type, mode)
                .await?;
            Ok::<_, StoreError>(store)
        })
        .await
        .map_err(|_| Error::PublishTimeout {
            key: key.clone(),
            timeout_secs: self.timeout.as_secs(),
        })?
        .map_err(|e| Error::Publish {
            key: key.clone(),
            details: e.to_string(),
        })?;

        histogram!("reconcile_publish_duration_ms").record(start.elapsed().as_millis() as f64);
        counter!("reconcile_bytes_published_total").increment(job.content.len() as u64);

        let issued_at = Utc::now();
        let signed_url = store
            .signed_url(&key, self.expiry)
            .await
            .map_err(|e| Error::Publish {
                key: key.clone(),
                details: format!("error generating signed URL: {}", e),
            })?;

        info!(
            key = %key,
            content_type,
            duration_ms = start.elapsed().as_millis() as u64,
            "Published file"
        );

        Ok(PublishedArtifact {
            object_key: key,
            signed_url,
            expires_at: issued_at + chrono::Duration::seconds(self.expiry.as_secs() as i64),
        })
    }
}
