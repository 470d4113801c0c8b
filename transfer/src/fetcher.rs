use crate::remote::{RemoteConnection, RemoteError};
use bytes::Bytes;
use reconcile_core::{Error, Result};
use std::time::Instant;
use tracing::{info, instrument};

/// The complete contents of `remote_path`, or an error. Never partial.
#[instrument(skip(connection))]
pub async fn fetch(connection: &mut dyn RemoteConnection, remote_path: &str) -> Result<Bytes> {
    let start = Instant::now();

    let data = connection
        .retrieve(remote_path)
        .await
        .map_err(|e| match e {
            RemoteError::Stream(io) => Error::Read {
                path: remote_path.to_string(),
                details: io.to_string(),
            },
            other => Error::Retrieve {
                path: remote_path.to_string(),
                details: other.to_string(),
            },
        })?;

    info!(
        path = remote_path,
        size_bytes = data.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Downloaded remote file"
    );

    Ok(Bytes::from(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemoteConnection;
    use std::io;

    #[tokio::test]
    async fn returns_full_content() {
        let mut connection = MockRemoteConnection::new();
        connection
            .expect_retrieve()
            .withf(|path| path == "/outbound/a.csv")
            .times(1)
            .returning(|_| Ok(b"id,amount\n1,10.00\n".to_vec()));

        let content = fetch(&mut connection, "/outbound/a.csv").await.unwrap();
        assert_eq!(&content[..], b"id,amount\n1,10.00\n");
    }

    #[tokio::test]
    async fn open_failure_is_retrieve_error() {
        let mut connection = MockRemoteConnection::new();
        connection
            .expect_retrieve()
            .returning(|_| Err(RemoteError::Reply("550 File not found".into())));

        let err = fetch(&mut connection, "/outbound/a.csv").await.unwrap_err();
        assert!(matches!(err, Error::Retrieve { ref path, .. } if path == "/outbound/a.csv"));
    }

    #[tokio::test]
    async fn broken_stream_is_read_error() {
        let mut connection = MockRemoteConnection::new();
        connection.expect_retrieve().returning(|_| {
            Err(RemoteError::Stream(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "reset by peer",
            )))
        });

        let err = fetch(&mut connection, "/outbound/a.csv").await.unwrap_err();
        match err {
            Error::Read { path, details } => {
                assert_eq!(path, "/outbound/a.csv");
                assert!(details.contains("reset by peer"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
