use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("connection to {host} failed: {details}")]
    Connection { host: String, details: String },

    #[error("listing {path} failed: {details}")]
    Listing { path: String, details: String },

    #[error("no valid files found in {path}")]
    NoFilesFound { path: String },

    #[error("failed to retrieve {path}: {details}")]
    Retrieve { path: String, details: String },

    #[error("failed to read {path}: {details}")]
    Read { path: String, details: String },

    #[error("failed to delete {path} after {attempts} attempts: {details}")]
    DeletionFailed {
        path: String,
        attempts: u32,
        details: String,
    },

    #[error("failed to publish {key}: {details}")]
    Publish { key: String, details: String },

    #[error("publishing {key} timed out after {timeout_secs} seconds")]
    PublishTimeout { key: String, timeout_secs: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// A stale source file is left behind but nothing was lost.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Error::DeletionFailed { .. })
    }

    pub fn is_fatal(&self) -> bool {
        !self.is_degraded()
    }

    /// Raised before any network I/O happened.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::Settings(_) | Error::Credentials(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletion_failure_is_the_only_degraded_error() {
        let deletion = Error::DeletionFailed {
            path: "/in/a.csv".into(),
            attempts: 3,
            details: "550".into(),
        };
        assert!(deletion.is_degraded());
        assert!(!deletion.is_fatal());

        let listing = Error::Listing {
            path: "/in".into(),
            details: "425".into(),
        };
        assert!(listing.is_fatal());
        assert!(!listing.is_preflight());
    }

    #[test]
    fn messages_name_the_path() {
        let err = Error::NoFilesFound { path: "/in".into() };
        assert_eq!(err.to_string(), "no valid files found in /in");

        let err = Error::PublishTimeout {
            key: "reconcile/a.csv".into(),
            timeout_secs: 60,
        };
        assert_eq!(
            err.to_string(),
            "publishing reconcile/a.csv timed out after 60 seconds"
        );
    }
}
