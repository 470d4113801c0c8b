use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reconcile_core::{Error, Result};
use serde::Deserialize;
use std::fmt;

/// Decoded service account JSON, ready to hand to the storage client.
#[derive(Clone)]
pub struct ServiceAccountKey {
    json: String,
    client_email: String,
}

impl ServiceAccountKey {
    pub fn json(&self) -> &str {
        &self.json
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

pub trait CredentialsLoader: Send + Sync {
    fn load(&self) -> Result<ServiceAccountKey>;
}

#[derive(Deserialize)]
struct KeyFields {
    client_email: String,
    private_key: String,
}

/// Service account key carried as standard base64 in `GCP_SERVICE_ACCOUNT`.
pub struct Base64ServiceAccount {
    encoded: String,
}

impl Base64ServiceAccount {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self {
            encoded: encoded.into(),
        }
    }
}

impl CredentialsLoader for Base64ServiceAccount {
    fn load(&self) -> Result<ServiceAccountKey> {
        let decoded = STANDARD
            .decode(self.encoded.trim())
            .map_err(|e| Error::Credentials(format!("error decoding service account key: {}", e)))?;

        let json = String::from_utf8(decoded)
            .map_err(|e| Error::Credentials(format!("service account key is not UTF-8: {}", e)))?;

        let fields: KeyFields = serde_json::from_str(&json)
            .map_err(|e| Error::Credentials(format!("service account key is not valid JSON: {}", e)))?;

        if fields.private_key.trim().is_empty() {
            return Err(Error::Credentials(
                "service account key has an empty private_key".into(),
            ));
        }

        Ok(ServiceAccountKey {
            json,
            client_email: fields.client_email,
        })
    }
}
