use crate::credentials::{Base64ServiceAccount, CredentialsLoader};
use crate::model::RunReport;
use crate::pipeline::Pipeline;
use crate::publish::gcs::GcsConnector;
use crate::publish::Publisher;
use crate::remote::ftp::FtpConnector;
use crate::remote::Connector;
use chrono::NaiveDate;
use reconcile_core::{Config, Result};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct App {
    config: Config,
    connector: Arc<dyn Connector>,
    pipeline: Pipeline,
}

impl App {
    /// Decodes credentials and wires the FTP and GCS collaborators. No network I/O.
    #[instrument(skip(config))]
    pub fn new(config: Config) -> Result<Self> {
        info!("Initializing application");

        let key = Base64ServiceAccount::new(config.storage.service_account.as_str()).load()?;
        info!(client_email = key.client_email(), bucket = %config.storage.bucket, "Loaded service account");

        let store = GcsConnector::new(config.storage.bucket.clone(), key);
        let publisher = Publisher::new(Arc::new(store), &config.storage);

        Ok(Self::with_parts(config, Arc::new(FtpConnector), publisher))
    }

    pub fn with_parts(config: Config, connector: Arc<dyn Connector>, publisher: Publisher) -> Self {
        let pipeline = Pipeline::new(&config, publisher);
        Self {
            config,
            connector,
            pipeline,
        }
    }

    /// One transfer. The remote session is closed on every exit path.
    pub async fn run(&self, today: NaiveDate) -> Result<RunReport> {
        let mut connection = self.connector.connect(&self.config.remote).await?;

        let outcome = self.pipeline.run(connection.as_mut(), today).await;

        if let Err(e) = connection.quit().await {
            warn!(error = %e, "Failed to close remote session");
        }

        outcome
    }
}
