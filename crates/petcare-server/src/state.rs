use std::sync::Arc;

use petcare_store::Repository;

use crate::analysis::{StubAnalyzer, VideoAnalyzer};
use crate::config::ServerConfig;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub analyzer: Arc<dyn VideoAnalyzer>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: ServerConfig) -> Self {
        Self {
            repo,
            analyzer: Arc::new(StubAnalyzer),
            config: Arc::new(config),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn VideoAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }
}
