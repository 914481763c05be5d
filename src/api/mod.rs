pub mod handlers;
pub mod models;
pub mod router;

use crate::board::SpreadBoard;
use crate::poller::wait_for_shutdown;
use axum_prometheus::PrometheusMetricLayer;
use axum_prometheus::metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::sync::watch;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub board: SpreadBoard,
    pub prometheus: PrometheusHandle,
}

pub struct ApiServer {
    state: AppState,
    layer: PrometheusMetricLayer<'static>,
}

impl ApiServer {
    /// Installs the global Prometheus recorder; call once per process.
    pub fn new(board: SpreadBoard) -> Self {
        let (layer, prometheus) = PrometheusMetricLayer::pair();
        Self {
            state: AppState { board, prometheus },
            layer,
        }
    }

    /// Binds the server to the configured port and serves until `shutdown` flips.
    pub async fn run(self, port: u16, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let app = router::build(self.state).layer(self.layer);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("starting server and serving metrics on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                wait_for_shutdown(&mut shutdown).await;
            })
            .await?;

        Ok(())
    }
}
