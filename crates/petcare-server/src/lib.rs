//! HTTP API for the PetCare service.
//!
//! Serves pets, uploaded videos and the shop catalog from a
//! [`petcare_store::Repository`], and runs video analysis in the background.

pub mod analysis;
pub mod config;
pub mod error;
pub mod handler;
pub mod pets;
pub mod router;
pub mod server;
pub mod shop;
pub mod state;
pub mod upload;
pub mod videos;

pub use analysis::{
    run_analysis, spawn_analysis, AnalysisError, AnalysisJob, AnalysisReport, AnalysisStatus,
    Insight, StubAnalyzer, VideoAnalyzer,
};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use router::build_router;
pub use server::PetcareServer;
pub use state::AppState;

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use petcare_store::{Repository, StoreConfig};
    use serde_json::Value;
    use tower::util::ServiceExt;

    use crate::{build_router, AppState, ServerConfig};

    pub async fn test_app(dir: &Path) -> (Router, Arc<Repository>) {
        test_app_with(dir, |_| {}).await
    }

    pub async fn test_app_with(
        dir: &Path,
        tweak: impl FnOnce(&mut ServerConfig),
    ) -> (Router, Arc<Repository>) {
        let mut config = ServerConfig {
            uploads_dir: dir.join("uploads"),
            store: StoreConfig::with_root(dir.join("data")),
            ..ServerConfig::default()
        };
        tweak(&mut config);
        let repo = Repository::open(config.store.clone()).await.unwrap();
        let app = build_router(AppState::new(Arc::clone(&repo), config));
        (app, repo)
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    const BOUNDARY: &str = "petcare-form-boundary";

    /// A `multipart/form-data` POST carrying `body` in a part named `field`.
    pub fn multipart_request(
        uri: &str,
        field: &str,
        file_name: &str,
        content_type: &str,
        body: &[u8],
    ) -> Request<Body> {
        let mut form = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        form.extend_from_slice(body);
        form.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(form))
            .unwrap()
    }

    /// Upload form with the payload in the `file` part.
    pub fn file_upload(uri: &str, file_name: &str, content_type: &str, body: &[u8]) -> Request<Body> {
        multipart_request(uri, "file", file_name, content_type, body)
    }

    /// Raw bytes of a response body.
    pub async fn fetch_bytes(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(empty_request("GET", uri)).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }
}
