use crate::model::ValidationResult;
use crate::naming::FileNamePattern;
use crate::remote::RemoteConnection;
use chrono::NaiveDate;
use metrics::counter;
use reconcile_core::{Error, Result};
use tracing::{debug, info, instrument, warn};

/// Names in `remote_path` that match today's pattern, in listing order.
#[instrument(skip(connection, pattern))]
pub async fn list_valid(
    connection: &mut dyn RemoteConnection,
    remote_path: &str,
    pattern: &FileNamePattern,
    today: NaiveDate,
) -> Result<Vec<String>> {
    let entries = connection
        .list(remote_path)
        .await
        .map_err(|e| Error::Listing {
            path: remote_path.to_string(),
            details: e.to_string(),
        })?;

    let total = entries.len();
    let mut valid = Vec::with_capacity(total);

    for entry in entries {
        match pattern.validate(&entry.name, today) {
            ValidationResult::Accepted => {
                debug!(file = %entry.name, size_bytes = ?entry.size, "Accepted file");
                valid.push(entry.name);
            }
            ValidationResult::Rejected(reason) => {
                warn!(
                    file = %entry.name,
                    reason = %reason,
                    "Skipping invalid file"
                );
                counter!("reconcile_files_rejected_total", "reason" => reason.code()).increment(1);
            }
        }
    }

    if valid.is_empty() {
        return Err(Error::NoFilesFound {
            path: remote_path.to_string(),
        });
    }

    info!(
        path = remote_path,
        total,
        valid = valid.len(),
        files = ?valid,
        "Found valid files"
    );

    Ok(valid)
}
