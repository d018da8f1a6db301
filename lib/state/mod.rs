use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Process-wide handles shared by the metrics server and the running command.
pub struct AppState {
    pub shutdown_token: CancellationToken,
    pub registry: RwLock<Registry>,
}

impl AppState {
    pub fn new(shutdown_token: CancellationToken) -> Self {
        Self {
            shutdown_token,
            registry: RwLock::new(<Registry>::default()),
        }
    }
}
