use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;
use crate::{handler, pets, shop, videos};

/// Build the axum router with all PetCare endpoints.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.body_limit());
    let cors = cors_layer(&state.config.cors_origins);
    let uploads = ServeDir::new(&state.config.uploads_dir);

    Router::new()
        .route("/", get(handler::root_handler))
        .route("/health", get(handler::health_handler))
        .route("/api/pets", get(pets::list_pets).post(pets::create_pet))
        .route(
            "/api/pets/:id",
            get(pets::get_pet).put(pets::update_pet).delete(pets::delete_pet),
        )
        .route(
            "/api/pets/:id/image",
            post(pets::upload_pet_image).layer(upload_limit.clone()),
        )
        .route(
            "/api/videos/upload/:pet_id",
            post(videos::upload_video).layer(upload_limit),
        )
        .route("/api/videos/:id", get(videos::get_video))
        .route("/api/videos/pet/:pet_id/videos", get(videos::list_pet_videos))
        .route("/api/shop/products", get(shop::list_products))
        .route("/api/shop/products/:id", get(shop::get_product))
        .route("/api/shop/categories", get(shop::list_categories))
        .nest_service("/uploads", uploads)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use crate::testing::{send, test_app};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;
        let request = Request::builder()
            .uri("/health")
            .header("origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn cors_ignores_other_origins() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;
        let request = Request::builder()
            .uri("/health")
            .header("origin", "http://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _) = test_app(dir.path()).await;
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
