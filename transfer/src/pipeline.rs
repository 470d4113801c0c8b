use crate::fetcher::fetch;
use crate::lister::list_valid;
use crate::model::{CleanupOutcome, RunReport, TransferJob};
use crate::naming::FileNamePattern;
use crate::publish::Publisher;
use crate::remote::{join_path, RemoteConnection};
use crate::remover::remove_with_retry;
use chrono::NaiveDate;
use reconcile_core::backoff::RetryPolicy;
use reconcile_core::config::{CleanupConfig, FailurePolicy, NamingMode};
use reconcile_core::{Config, Error, Result};
use tracing::{info, instrument, warn};

pub struct Pipeline {
    mode: NamingMode,
    pattern: FileNamePattern,
    merchant_id: Option<String>,
    directory: String,
    cleanup: CleanupConfig,
    retry: RetryPolicy,
    publisher: Publisher,
}

impl Pipeline {
    pub fn new(config: &Config, publisher: Publisher) -> Self {
        Self {
            mode: config.naming.mode,
            pattern: FileNamePattern::from_config(&config.naming),
            merchant_id: config.naming.merchant_id.clone(),
            directory: config.remote.directory.clone(),
            cleanup: config.cleanup.clone(),
            retry: RetryPolicy::from_config(&config.cleanup),
            publisher,
        }
    }

    /// select → fetch → remove source → publish. Stops at the first fatal error.
    #[instrument(skip(self, connection), fields(mode = ?self.mode))]
    pub async fn run(
        &self,
        connection: &mut dyn RemoteConnection,
        today: NaiveDate,
    ) -> Result<RunReport> {
        let file_name = self.select(connection, today).await?;
        let remote_path = join_path(&self.directory, &file_name);

        let content = fetch(connection, &remote_path).await?;
        let job = TransferJob {
            remote_path,
            file_name,
            content,
        };

        let cleanup = self.remove_source(connection, &job.remote_path).await?;

        let artifact = self.publisher.publish(&job, today).await?;

        Ok(RunReport {
            remote_path: job.remote_path,
            artifact,
            cleanup,
        })
    }

    async fn select(
        &self,
        connection: &mut dyn RemoteConnection,
        today: NaiveDate,
    ) -> Result<String> {
        match self.mode {
            NamingMode::Templated => {
                let merchant_id = self.merchant_id.as_deref().ok_or_else(|| {
                    Error::Config("MERCHANT_ID is required in templated mode".into())
                })?;
                let name = self.pattern.template(merchant_id, today);
                info!(file = %name, "Using templated file name");
                Ok(name)
            }
            NamingMode::Discovery => {
                let valid = list_valid(connection, &self.directory, &self.pattern, today).await?;
                if valid.len() > 1 {
                    info!(
                        left_for_later = ?&valid[1..],
                        "Several valid files found, transferring the first"
                    );
                }
                valid.into_iter().next().ok_or_else(|| Error::NoFilesFound {
                    path: self.directory.clone(),
                })
            }
        }
    }

    async fn remove_source(
        &self,
        connection: &mut dyn RemoteConnection,
        remote_path: &str,
    ) -> Result<CleanupOutcome> {
        if !self.cleanup.delete_source {
            return Ok(CleanupOutcome::Skipped);
        }

        match remove_with_retry(connection, remote_path, &self.retry).await {
            Ok(attempts) => Ok(CleanupOutcome::Removed { attempts }),
            Err(e) if self.cleanup.on_failure == FailurePolicy::Warn => {
                warn!(
                    path = remote_path,
                    error = %e,
                    "Source file was not removed and may be processed again"
                );
                Ok(CleanupOutcome::Failed {
                    error: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}
