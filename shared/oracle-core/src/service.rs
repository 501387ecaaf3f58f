//! Service lifecycle shared by long-running Oracle processes

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::error::{OracleError, Result};

/// Health status for liveness probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub service_id: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Readiness status for readiness probes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub dependencies: Vec<DependencyStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub name: String,
    pub available: bool,
    pub latency_ms: Option<u64>,
}

/// Standard trait every Oracle process implements
#[async_trait]
pub trait OracleService: Send + Sync + 'static {
    fn service_id(&self) -> &'static str;

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Liveness: the process is serving
    async fn health(&self) -> HealthStatus;

    /// Readiness: upstream dependencies are reachable
    async fn ready(&self) -> ReadinessStatus;

    /// Ask long-running tasks to stop; `start` is expected to return soon after
    async fn shutdown(&self) -> Result<()>;

    /// Run pollers and servers until shutdown. Returning early ends the process.
    async fn start(&self) -> Result<()>;
}

/// Time `shutdown` gets before the service task is aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Process bootstrap: runs one service until it exits or a signal arrives
pub struct MicroserviceRuntime {
    config: ServiceConfig,
    start_time: Instant,
}

impl MicroserviceRuntime {
    pub fn new() -> Result<Self> {
        Ok(Self {
            config: ServiceConfig::from_env()?,
            start_time: Instant::now(),
        })
    }

    pub async fn run<S: OracleService>(service: Arc<S>) -> Result<()> {
        Self::new()?.supervise(service, shutdown_signal()).await
    }

    /// Drive `service` until its `start` returns or `stop` resolves, then
    /// shut it down. A failed `start` is returned to the caller.
    pub async fn supervise<S, F>(&self, service: Arc<S>, stop: F) -> Result<()>
    where
        S: OracleService,
        F: std::future::Future<Output = ()>,
    {
        info!(
            service_id = service.service_id(),
            service_name = %self.config.service_name,
            version = service.version(),
            "Starting service"
        );

        let mut task = tokio::spawn({
            let service = service.clone();
            async move { service.start().await }
        });

        let outcome = tokio::select! {
            joined = &mut task => match joined {
                Ok(Ok(())) => {
                    info!("Service exited");
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!(error = %e, code = e.error_code(), "Service failed");
                    Err(e)
                }
                Err(e) => Err(OracleError::Internal(format!("Service task panicked: {}", e))),
            },
            _ = stop => {
                info!("Shutdown signal received, stopping");
                Ok(())
            }
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, service.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Error during shutdown"),
            Err(_) => warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Shutdown timed out"),
        }
        task.abort();

        info!(
            uptime_seconds = self.start_time.elapsed().as_secs(),
            "Service stopped"
        );
        outcome
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to listen for SIGTERM")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
