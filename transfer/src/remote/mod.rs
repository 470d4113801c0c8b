pub mod ftp;

use crate::model::RemoteEntry;
use async_trait::async_trait;
use reconcile_core::config::RemoteConfig;
use reconcile_core::Result;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    /// The server answered with an error reply.
    #[error("server replied: {0}")]
    Reply(String),

    /// The data stream broke while the file was being read.
    #[error("data stream failed: {0}")]
    Stream(#[from] std::io::Error),

    #[error("connection is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// A logged-in session on the remote file server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteConnection: Send {
    /// Plain files in `path`, in server order.
    async fn list(&mut self, path: &str) -> std::result::Result<Vec<RemoteEntry>, RemoteError>;

    /// Opens a read stream for `path`, drains it and releases it before returning.
    async fn retrieve(&mut self, path: &str) -> std::result::Result<Vec<u8>, RemoteError>;

    async fn delete(&mut self, path: &str) -> std::result::Result<(), RemoteError>;

    async fn quit(&mut self) -> std::result::Result<(), RemoteError>;
}

/// Dials and logs in, producing a session scoped to one run.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &RemoteConfig) -> Result<Box<dyn RemoteConnection>>;
}

/// Joins a directory and a file name the way the server expects.
pub fn join_path(directory: &str, name: &str) -> String {
    let directory = directory.trim();
    if directory.is_empty() || directory == "." {
        return name.to_string();
    }
    format!("{}/{}", directory.trim_end_matches('/'), name)
}
