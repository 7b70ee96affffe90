//! Server assembly: startup wiring and the serve loop.

use crate::api::{self, AppState};
use crate::artifact::ArtifactStore;
use crate::config::TriageConfig;
use crate::error::{Result, TriageError};
use crate::service::PredictionService;
use crate::shutdown::ShutdownCoordinator;
use crate::storage::{PredictionStore, RecordSink};
use axum::Router;
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// A fully initialised server, ready to accept traffic.
pub struct Server {
    service: Arc<PredictionService>,
    store: Arc<PredictionStore>,
}

impl Server {
    /// Loads the artifact and prepares storage. Either failure aborts startup.
    pub fn initialize(config: &TriageConfig) -> Result<Self> {
        let bundle = ArtifactStore::new(&config.artifact.path)
            .load()
            .inspect_err(|e| error!(error = %e, "Cannot load model artifact"))?;

        let store = PredictionStore::open(&config.storage.path)
            .and_then(|store| store.ensure_schema().map(|()| store))
            .inspect_err(|e| error!(error = %e, "Cannot prepare prediction store"))?;
        let store = Arc::new(store);

        let service = PredictionService::new(
            Arc::new(bundle),
            store.clone(),
            config.artifact.unknown_category,
            config.artifact.decode_target,
        );
        info!(service = ?service, "Prediction service ready");

        Ok(Self {
            service: Arc::new(service),
            store,
        })
    }

    pub fn service(&self) -> &Arc<PredictionService> {
        &self.service
    }

    pub fn store(&self) -> &Arc<PredictionStore> {
        &self.store
    }

    pub fn router(&self) -> Router {
        api::router(AppState::new(Arc::clone(&self.service)))
    }

    /// Serves until the coordinator fires, then drains in-flight requests for at
    /// most the coordinator's timeout.
    pub async fn serve(self, listener: TcpListener, coordinator: ShutdownCoordinator) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(addr = %addr, "Triage server listening");

        {
            let signal = coordinator.clone();
            let server = axum::serve(listener, self.router())
                .with_graceful_shutdown(async move { signal.wait_for_shutdown().await })
                .into_future();
            tokio::pin!(server);

            let drain_deadline = async {
                coordinator.wait_for_shutdown().await;
                tokio::time::sleep(coordinator.timeout()).await;
            };

            tokio::select! {
                res = &mut server => res.map_err(|e| TriageError::Network(e.to_string()))?,
                _ = drain_deadline => {
                    warn!(timeout = ?coordinator.timeout(), "Shutdown timed out, abandoning in-flight requests");
                }
            }
        }

        drop(self.service);
        match Arc::try_unwrap(self.store) {
            Ok(store) => {
                drop(store);
                info!("Prediction store closed");
            }
            Err(_) => warn!("Prediction store still referenced at shutdown"),
        }

        Ok(())
    }
}
