use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use petcare_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The named entity (e.g. "Pet") does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    /// Malformed or oversized upload form.
    #[error("upload error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Multipart(e) => (e.status(), e.body_text()),
            Self::Store(
                e @ (StoreError::InvalidDocument(_)
                | StoreError::InvalidUpdate(_)
                | StoreError::InvalidCollectionName { .. }),
            ) => (StatusCode::BAD_REQUEST, e.to_string()),
            _ => {
                // Storage failures can carry filesystem details; log them and
                // answer with a generic message.
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let cases = [
            (ServerError::NotFound("Pet"), StatusCode::NOT_FOUND),
            (ServerError::BadRequest("no".into()), StatusCode::BAD_REQUEST),
            (
                ServerError::Store(StoreError::InvalidUpdate("bad".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServerError::Io(std::io::Error::other("/secret/path")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn not_found_message() {
        assert_eq!(ServerError::NotFound("Video").to_string(), "Video not found");
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_details() {
        let err = ServerError::Store(StoreError::Io(std::io::Error::other(
            "permission denied: /srv/data/pets.json",
        )));
        let response = err.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("/srv"));
        assert!(text.contains("internal server error"));
    }
}
