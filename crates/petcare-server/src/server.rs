use std::sync::Arc;

use petcare_store::{install_global, Repository};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::analysis::{StubAnalyzer, VideoAnalyzer};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;
use crate::state::AppState;
use crate::upload::{IMAGES_DIR, VIDEOS_DIR};

/// PetCare HTTP server.
pub struct PetcareServer {
    config: ServerConfig,
    analyzer: Arc<dyn VideoAnalyzer>,
}

impl PetcareServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            analyzer: Arc::new(StubAnalyzer),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn VideoAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the store and prepare upload directories.
    pub async fn state(&self) -> ServerResult<AppState> {
        for folder in [VIDEOS_DIR, IMAGES_DIR] {
            tokio::fs::create_dir_all(self.config.uploads_dir.join(folder)).await?;
        }
        let repo = Repository::open(self.config.store.clone()).await?;
        Ok(AppState::new(repo, self.config.clone()).with_analyzer(Arc::clone(&self.analyzer)))
    }

    /// Build the router (useful for testing).
    pub async fn router(&self) -> ServerResult<axum::Router> {
        Ok(build_router(self.state().await?))
    }

    /// Start serving requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let state = self.state().await?;
        if install_global(Arc::clone(&state.repo)).is_err() {
            warn!("global repository already installed; handlers use the configured store");
        }
        let app = build_router(state);
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            data = %self.config.store.root.display(),
            "PetCare server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
