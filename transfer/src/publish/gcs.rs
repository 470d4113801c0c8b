use super::{DurableStore, StoreConnector, StoreError, WriteMode};
use crate::credentials::ServiceAccountKey;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{Attribute, Attributes, ObjectStore, PutMode, PutOptions, PutPayload};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Builds Google Cloud Storage clients from a decoded service account key.
pub struct GcsConnector {
    bucket: String,
    key: ServiceAccountKey,
}

impl GcsConnector {
    pub fn new(bucket: impl Into<String>, key: ServiceAccountKey) -> Self {
        Self {
            bucket: bucket.into(),
            key,
        }
    }
}

#[async_trait]
impl StoreConnector for GcsConnector {
    async fn connect(&self) -> Result<Box<dyn DurableStore>, StoreError> {
        let store = GoogleCloudStorageBuilder::new()
            .with_bucket_name(&self.bucket)
            .with_service_account_key(self.key.json())
            .build()
            .map_err(|e| StoreError::Client(format!("error creating GCS client: {}", e)))?;

        debug!(
            bucket = %self.bucket,
            client_email = self.key.client_email(),
            "Created GCS client"
        );

        Ok(Box::new(GcsStore {
            store,
            bucket: self.bucket.clone(),
        }))
    }
}

pub struct GcsStore {
    store: GoogleCloudStorage,
    bucket: String,
}

#[async_trait]
impl DurableStore for GcsStore {
    async fn write(
        &self,
        key: &str,
        content: Bytes,
        content_type: &str,
        mode: WriteMode,
    ) -> Result<(), StoreError> {
        let location = Path::from(key);
        let size = content.len();
        let start = Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let opts = PutOptions {
            mode: match mode {
                WriteMode::Overwrite => PutMode::Overwrite,
                WriteMode::CreateOnly => PutMode::Create,
            },
            attributes,
            ..PutOptions::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(content), opts)
            .await
            .map_err(|e| {
                error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "GCS upload failed"
                );
                match e {
                    ObjectStoreError::AlreadyExists { .. } | ObjectStoreError::Precondition { .. } => {
                        StoreError::AlreadyExists(key.to_string())
                    }
                    other => StoreError::Backend(format!("error uploading file to GCS: {}", other)),
                }
            })?;

        debug!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "GCS upload successful"
        );

        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String, StoreError> {
        let location = Path::from(key);
        let url = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(url.to_string())
    }
}
