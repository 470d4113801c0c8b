use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Named environment variables and the settings key each one feeds.
const NAMED_ENV: &[(&str, &str)] = &[
    ("HOST", "remote.host"),
    ("USERNAME", "remote.username"),
    ("PASSWORD", "remote.password"),
    ("DIRECTORY", "remote.directory"),
    ("FILENAME", "naming.prefix"),
    ("MERCHANT_ID", "naming.merchant_id"),
    ("GCP_SERVICE_ACCOUNT", "storage.service_account"),
    ("GCP_STORAGE_BUCKET", "storage.bucket"),
];

pub const DEFAULT_FTP_PORT: u16 = 21;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub remote: RemoteConfig,
    pub naming: NamingConfig,
    pub storage: StorageConfig,
    pub cleanup: CleanupConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// `host` or `host:port`
    pub host: String,
    pub username: String,
    pub password: String,
    pub directory: String,
    pub dial_timeout_secs: u64,
    pub extended_passive: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamingConfig {
    pub mode: NamingMode,
    pub prefix: String,
    pub merchant_id: Option<String>,
    pub suffix: String,
    pub date_basis: DateBasis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingMode {
    /// Fetch `<prefix>_<merchant_id>_<date><suffix>` directly.
    Templated,
    /// List the directory and take the first name matching today's pattern.
    Discovery,
}

/// Clock used to decide which calendar day "today" is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateBasis {
    Utc,
    Local,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub bucket: String,
    /// Base64-encoded service account JSON
    pub service_account: String,
    pub key_prefix: String,
    pub key_strategy: KeyStrategy,
    pub signed_url_expiry_secs: u64,
    pub publish_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// `<prefix>/<file>`
    Flat,
    /// `<prefix>/<YYYY>/<MM>/<file>`
    Monthly,
    /// `<prefix>/<YYYY>/<MM>/<DD>/<hex>/<file>`, written create-only
    Random,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupConfig {
    pub delete_source: bool,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub on_failure: FailurePolicy,
}

/// What a run does when the source file could not be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    Abort,
    Warn,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Self::load_unchecked(None)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Layers defaults, `config.toml`, `RECONCILE__*` variables and the named
    /// variables. `env` replaces the process environment when given.
    pub fn load_unchecked(env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&Config::default())?);

        if Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        // RECONCILE__SECTION__KEY
        builder = builder.add_source(
            Environment::with_prefix("RECONCILE")
                .separator("__")
                .source(env.clone()),
        );

        for (var, key) in NAMED_ENV {
            let value = match &env {
                Some(map) => map.get(*var).cloned(),
                None => std::env::var(var).ok(),
            };
            builder = builder.set_override_option(*key, value.filter(|v| !v.is_empty()))?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("HOST", &self.remote.host),
            ("USERNAME", &self.remote.username),
            ("PASSWORD", &self.remote.password),
            ("GCP_SERVICE_ACCOUNT", &self.storage.service_account),
            ("GCP_STORAGE_BUCKET", &self.storage.bucket),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("{} is required", name)));
            }
        }

        self.naming.validate()?;

        if self.cleanup.max_attempts == 0 {
            return Err(ConfigError::Message(
                "cleanup.max_attempts must be greater than 0".into(),
            ));
        }

        if self.storage.publish_timeout_secs == 0 || self.storage.signed_url_expiry_secs == 0 {
            return Err(ConfigError::Message(
                "storage timeouts must be greater than 0".into(),
            ));
        }

        if self.remote.dial_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "remote.dial_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

impl NamingConfig {
    /// Checks only what a filename check needs, no credentials involved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.is_empty() || self.prefix.contains('_') {
            return Err(ConfigError::Message(
                "FILENAME must be non-empty and must not contain '_'".into(),
            ));
        }

        if !self.suffix.starts_with('.') || self.suffix.contains('_') {
            return Err(ConfigError::Message(format!(
                "naming.suffix must start with '.', got {}",
                self.suffix
            )));
        }

        if self.mode == NamingMode::Templated
            && self.merchant_id.as_deref().map_or(true, |id| id.trim().is_empty())
        {
            return Err(ConfigError::Message(
                "MERCHANT_ID is required in templated mode".into(),
            ));
        }

        Ok(())
    }
}

impl RemoteConfig {
    /// `host:port`, defaulting to the standard FTP port.
    pub fn address(&self) -> String {
        let host = self.host.trim();
        match host.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => host.to_string(),
            _ => format!("{}:{}", host, DEFAULT_FTP_PORT),
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("directory", &self.directory)
            .field("dial_timeout_secs", &self.dial_timeout_secs)
            .field("extended_passive", &self.extended_passive)
            .finish()
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket", &self.bucket)
            .field("service_account", &"<redacted>")
            .field("key_prefix", &self.key_prefix)
            .field("key_strategy", &self.key_strategy)
            .field("signed_url_expiry_secs", &self.signed_url_expiry_secs)
            .field("publish_timeout_secs", &self.publish_timeout_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: RemoteConfig {
                host: String::new(),
                username: String::new(),
                password: String::new(),
                directory: ".".to_string(),
                dial_timeout_secs: 5,
                extended_passive: false,
            },
            naming: NamingConfig {
                mode: NamingMode::Templated,
                prefix: "FundTransferMerchantReconcile".to_string(),
                merchant_id: None,
                suffix: ".csv".to_string(),
                date_basis: DateBasis::Utc,
            },
            storage: StorageConfig {
                bucket: String::new(),
                service_account: String::new(),
                key_prefix: "reconcile".to_string(),
                key_strategy: KeyStrategy::Flat,
                signed_url_expiry_secs: 15 * 60,
                publish_timeout_secs: 60,
            },
            cleanup: CleanupConfig {
                delete_source: true,
                max_attempts: 3,
                retry_delay_ms: 2000,
                on_failure: FailurePolicy::Abort,
            },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
                log_format: LogFormat::Pretty,
                metrics_enabled: false,
                metrics_port: 9090,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn complete_env() -> HashMap<String, String> {
        env(&[
            ("HOST", "ftp.example.com"),
            ("USERNAME", "recon"),
            ("PASSWORD", "secret"),
            ("DIRECTORY", "/outbound"),
            ("MERCHANT_ID", "20250130"),
            ("GCP_SERVICE_ACCOUNT", "eyJ9"),
            ("GCP_STORAGE_BUCKET", "recon-bucket"),
        ])
    }

    #[test]
    fn named_variables_land_in_sections() {
        let config = Config::load_unchecked(Some(complete_env())).unwrap();
        config.validate().unwrap();

        assert_eq!(config.remote.host, "ftp.example.com");
        assert_eq!(config.remote.directory, "/outbound");
        assert_eq!(config.naming.merchant_id.as_deref(), Some("20250130"));
        assert_eq!(config.naming.prefix, "FundTransferMerchantReconcile");
        assert_eq!(config.storage.bucket, "recon-bucket");
        assert_eq!(config.storage.signed_url_expiry_secs, 900);
        assert_eq!(config.cleanup.max_attempts, 3);
    }

    #[test]
    fn prefixed_variables_override_defaults() {
        let mut vars = complete_env();
        vars.insert("RECONCILE__CLEANUP__MAX_ATTEMPTS".into(), "5".into());
        vars.insert("RECONCILE__NAMING__MODE".into(), "discovery".into());
        vars.insert("RECONCILE__STORAGE__KEY_STRATEGY".into(), "random".into());

        let config = Config::load_unchecked(Some(vars)).unwrap();
        assert_eq!(config.cleanup.max_attempts, 5);
        assert_eq!(config.naming.mode, NamingMode::Discovery);
        assert_eq!(config.storage.key_strategy, KeyStrategy::Random);
    }

    #[test]
    fn prefixed_values_keep_leading_zeros() {
        let mut vars = complete_env();
        vars.insert("RECONCILE__NAMING__MERCHANT_ID".into(), "007".into());
        vars.remove("MERCHANT_ID");
        vars.insert("RECONCILE__REMOTE__PASSWORD".into(), "0042".into());
        vars.remove("PASSWORD");
        vars.insert("RECONCILE__REMOTE__DIAL_TIMEOUT_SECS".into(), "10".into());
        vars.insert("RECONCILE__CLEANUP__DELETE_SOURCE".into(), "false".into());

        let config = Config::load_unchecked(Some(vars)).unwrap();
        assert_eq!(config.naming.merchant_id.as_deref(), Some("007"));
        assert_eq!(config.remote.password, "0042");
        assert_eq!(config.remote.dial_timeout_secs, 10);
        assert!(!config.cleanup.delete_source);
    }

    #[test]
    fn plain_passive_mode_by_default() {
        let config = Config::load_unchecked(Some(complete_env())).unwrap();
        assert!(!config.remote.extended_passive);
    }

    #[test]
    fn missing_required_value_is_named() {
        let mut vars = complete_env();
        vars.remove("GCP_STORAGE_BUCKET");

        let config = Config::load_unchecked(Some(vars)).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("GCP_STORAGE_BUCKET is required"));
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let mut vars = complete_env();
        vars.insert("PASSWORD".into(), String::new());

        let config = Config::load_unchecked(Some(vars)).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("PASSWORD is required"));
    }

    #[test]
    fn templated_mode_needs_merchant_id() {
        let mut vars = complete_env();
        vars.remove("MERCHANT_ID");

        let config = Config::load_unchecked(Some(vars.clone())).unwrap();
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("MERCHANT_ID"));

        vars.insert("RECONCILE__NAMING__MODE".into(), "discovery".into());
        let config = Config::load_unchecked(Some(vars)).unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn address_defaults_port() {
        let mut remote = Config::default().remote;
        remote.host = "ftp.example.com".into();
        assert_eq!(remote.address(), "ftp.example.com:21");

        remote.host = "ftp.example.com:2121".into();
        assert_eq!(remote.address(), "ftp.example.com:2121");
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = Config::load_unchecked(Some(complete_env())).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("eyJ9"));
        assert!(rendered.contains("<redacted>"));
    }
}
