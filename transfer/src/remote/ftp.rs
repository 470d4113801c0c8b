use super::{Connector, RemoteConnection, RemoteError};
use crate::model::RemoteEntry;
use async_trait::async_trait;
use reconcile_core::config::RemoteConfig;
use reconcile_core::{Error, Result};
use std::io::Read;
use std::net::ToSocketAddrs;
use std::time::Duration;
use suppaftp::list::File;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Mode};
use tracing::{debug, info, instrument, warn};

/// Opens blocking `suppaftp` sessions off the async runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpConnector;

#[async_trait]
impl Connector for FtpConnector {
    #[instrument(skip(self, config), fields(host = %config.host))]
    async fn connect(&self, config: &RemoteConfig) -> Result<Box<dyn RemoteConnection>> {
        let address = config.address();
        let username = config.username.clone();
        let password = config.password.clone();
        let timeout = Duration::from_secs(config.dial_timeout_secs);
        let mode = if config.extended_passive {
            Mode::ExtendedPassive
        } else {
            Mode::Passive
        };

        let stream = tokio::task::spawn_blocking({
            let address = address.clone();
            move || dial(&address, timeout, mode, &username, &password)
        })
        .await
        .map_err(|e| Error::Internal(format!("FTP connect task panicked: {}", e)))?
        .map_err(|details| Error::Connection {
            host: address.clone(),
            details,
        })?;

        info!(host = %address, "Connected to FTP server");
        Ok(Box::new(FtpConnection {
            stream: Some(stream),
            address,
        }))
    }
}

fn dial(
    address: &str,
    timeout: Duration,
    mode: Mode,
    username: &str,
    password: &str,
) -> std::result::Result<FtpStream, String> {
    let addr = address
        .to_socket_addrs()
        .map_err(|e| format!("cannot resolve {}: {}", address, e))?
        .next()
        .ok_or_else(|| format!("{} resolved to no addresses", address))?;

    debug!(%addr, timeout_secs = timeout.as_secs(), "Dialing FTP server");
    let mut stream =
        FtpStream::connect_timeout(addr, timeout).map_err(|e| format!("dial failed: {}", e))?;

    stream.set_mode(mode);

    debug!(username, "Logging in");
    stream
        .login(username, password)
        .map_err(|e| format!("login failed: {}", e))?;

    stream
        .transfer_type(FileType::Binary)
        .map_err(|e| format!("failed to set binary mode: {}", e))?;

    Ok(stream)
}

/// A logged-in session. The stream moves into a blocking task for each
/// command and back out when the command finishes.
pub struct FtpConnection {
    stream: Option<FtpStream>,
    address: String,
}

impl FtpConnection {
    async fn run<T, F>(&mut self, op: F) -> std::result::Result<T, RemoteError>
    where
        F: FnOnce(&mut FtpStream) -> std::result::Result<T, RemoteError> + Send + 'static,
        T: Send + 'static,
    {
        let mut stream = self.stream.take().ok_or(RemoteError::Closed)?;
        let (stream, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = op(&mut stream);
            (stream, outcome)
        })
        .await
        .map_err(|e| RemoteError::Other(format!("FTP task panicked: {}", e)))?;

        self.stream = Some(stream);
        outcome
    }
}

fn reply(err: FtpError) -> RemoteError {
    match err {
        FtpError::UnexpectedResponse(_) => RemoteError::Reply(err.to_string()),
        other => RemoteError::Other(other.to_string()),
    }
}

#[async_trait]
impl RemoteConnection for FtpConnection {
    async fn list(&mut self, path: &str) -> std::result::Result<Vec<RemoteEntry>, RemoteError> {
        let owned = path.to_string();
        let lines = self
            .run(move |stream| stream.list(Some(&owned)).map_err(reply))
            .await?;

        let entries = parse_listing(&lines);
        debug!(
            path,
            lines = lines.len(),
            files = entries.len(),
            "Listed remote directory"
        );
        Ok(entries)
    }

    async fn retrieve(&mut self, path: &str) -> std::result::Result<Vec<u8>, RemoteError> {
        let owned = path.to_string();
        self.run(move |stream| {
            let data = stream.retr_as_stream(&owned).map_err(reply)?;
            drain_then_finalize(data, |data| stream.finalize_retr_stream(data))
        })
        .await
    }

    async fn delete(&mut self, path: &str) -> std::result::Result<(), RemoteError> {
        let owned = path.to_string();
        self.run(move |stream| stream.rm(&owned).map_err(reply)).await
    }

    async fn quit(&mut self) -> std::result::Result<(), RemoteError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        let outcome = tokio::task::spawn_blocking(move || stream.quit())
            .await
            .map_err(|e| RemoteError::Other(format!("FTP quit task panicked: {}", e)))?;

        match outcome {
            Ok(()) => {
                debug!(host = %self.address, "FTP session closed");
                Ok(())
            }
            Err(e) => {
                warn!(host = %self.address, error = %e, "Failed to quit FTP session gracefully");
                Err(reply(e))
            }
        }
    }
}

/// Reads the data channel to the end, then always hands it back so the
/// transfer's final reply is consumed from the control channel.
fn drain_then_finalize<R: Read>(
    mut data: R,
    finalize: impl FnOnce(R) -> std::result::Result<(), FtpError>,
) -> std::result::Result<Vec<u8>, RemoteError> {
    let mut content = Vec::new();
    let read = data.read_to_end(&mut content);
    let finalized = finalize(data);

    match (read, finalized) {
        (Err(e), _) => Err(RemoteError::Stream(e)),
        (Ok(_), Err(e)) => Err(reply(e)),
        (Ok(_), Ok(())) => Ok(content),
    }
}

/// Keeps plain files from a LIST reply; directories, links and lines the
/// parser does not understand are dropped.
fn parse_listing(lines: &[String]) -> Vec<RemoteEntry> {
    lines
        .iter()
        .filter_map(|line| match line.parse::<File>() {
            Ok(file) if file.is_file() => Some(RemoteEntry {
                name: file.name().to_string(),
                size: Some(file.size() as u64),
            }),
            Ok(_) => None,
            Err(e) => {
                debug!(line = %line, error = ?e, "Skipping unparseable LIST line");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn listing_keeps_files_in_order() {
        let entries = parse_listing(&lines(&[
            "-rw-r--r--   1 ftp ftp  1234 Jan 30 12:00 FundTransferMerchantReconcile_M1_20250130.csv",
            "drwxr-xr-x   2 ftp ftp  4096 Jan 15 12:00 archive",
            "-rw-r--r--   1 ftp ftp    10 Jan 30 12:01 notes.txt",
        ]));

        assert_eq!(
            entries,
            vec![
                RemoteEntry {
                    name: "FundTransferMerchantReconcile_M1_20250130.csv".into(),
                    size: Some(1234),
                },
                RemoteEntry {
                    name: "notes.txt".into(),
                    size: Some(10),
                },
            ]
        );
    }

    #[test]
    fn listing_skips_garbage() {
        assert!(parse_listing(&lines(&["", "not a listing line"])).is_empty());
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn broken_data_channel_is_still_finalized() {
        let mut finalized = false;
        let outcome = drain_then_finalize(Broken, |_| {
            finalized = true;
            Err(FtpError::ConnectionError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "426 transfer aborted",
            )))
        });

        assert!(finalized);
        assert!(matches!(outcome, Err(RemoteError::Stream(ref e)) if e.kind() == std::io::ErrorKind::ConnectionReset));
    }

    #[test]
    fn completed_transfer_returns_content_after_final_reply() {
        let mut finalized = false;
        let outcome = drain_then_finalize(&b"id,amount\n1,10\n"[..], |_| {
            finalized = true;
            Ok(())
        });

        assert!(finalized);
        assert_eq!(outcome.unwrap(), b"id,amount\n1,10\n".to_vec());
    }

    #[test]
    fn failed_final_reply_fails_the_retrieve() {
        let outcome = drain_then_finalize(&b"partial"[..], |_| {
            Err(FtpError::ConnectionError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "control channel closed",
            )))
        });
        assert!(matches!(outcome, Err(RemoteError::Other(_))));
    }

    #[tokio::test]
    async fn closed_connection_reports_closed() {
        let mut connection = FtpConnection {
            stream: None,
            address: "localhost:21".into(),
        };
        assert!(matches!(
            connection.list("/").await,
            Err(RemoteError::Closed)
        ));
        assert!(connection.quit().await.is_ok());
    }
}
