//! `/api/shop` routes: read-only product catalog.

use axum::extract::{Path, Query as UrlQuery, State};
use axum::response::Json;
use petcare_store::{values_equal, Document, Query};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ServerError, ServerResult};
use crate::handler::{present, present_all};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub species: Option<String>,
}

/// `suitable_for` is either a single species or a list of them.
fn suits(product: &Document, species: &str) -> bool {
    let wanted = Value::String(species.to_string());
    match product.get("suitable_for") {
        Some(Value::Array(items)) => items.iter().any(|v| values_equal(v, &wanted)),
        Some(v) => values_equal(v, &wanted),
        None => false,
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    UrlQuery(filter): UrlQuery<ProductFilter>,
) -> ServerResult<Json<Value>> {
    let mut query = Query::new();
    if let Some(category) = filter.category.filter(|c| !c.is_empty()) {
        query.insert("category".into(), Value::String(category));
    }
    let mut products = state
        .repo
        .products()
        .find((!query.is_empty()).then_some(&query))
        .await?;
    if let Some(species) = filter.species.filter(|s| !s.is_empty()) {
        products.retain(|p| suits(p, &species));
    }
    Ok(present_all(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Value>> {
    let product = state
        .repo
        .products()
        .get(&id)
        .await?
        .ok_or(ServerError::NotFound("Product"))?;
    Ok(Json(present(product)))
}

pub async fn list_categories(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let categories = state.repo.products().distinct("category").await?;
    Ok(Json(json!({ "categories": categories })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{empty_request, send, test_app};
    use axum::http::StatusCode;

    async fn seed(repo: &std::sync::Arc<petcare_store::Repository>) {
        let items = [
            json!({"_id": "p1", "name": "Kibble", "category": "food", "suitable_for": ["dog"]}),
            json!({"_id": "p2", "name": "Tuna", "category": "food", "suitable_for": ["cat"]}),
            json!({"_id": "p3", "name": "Ball", "category": "toys", "suitable_for": "dog"}),
            json!({"_id": "p4", "name": "Brush", "category": "grooming"}),
        ];
        for item in items {
            repo.products()
                .insert_one(Document::from_value(item).unwrap())
                .await
                .unwrap();
        }
    }

    fn ids(body: &Value) -> Vec<&str> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn filters() {
        let dir = tempfile::tempdir().unwrap();
        let (app, repo) = test_app(dir.path()).await;
        seed(&repo).await;

        let (status, body) = send(&app, empty_request("GET", "/api/shop/products")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), ["p1", "p2", "p3", "p4"]);

        let (_, body) = send(&app, empty_request("GET", "/api/shop/products?category=food")).await;
        assert_eq!(ids(&body), ["p1", "p2"]);

        let (_, body) = send(&app, empty_request("GET", "/api/shop/products?species=dog")).await;
        assert_eq!(ids(&body), ["p1", "p3"]);

        let (_, body) = send(
            &app,
            empty_request("GET", "/api/shop/products?category=food&species=cat"),
        )
        .await;
        assert_eq!(ids(&body), ["p2"]);
    }

    #[tokio::test]
    async fn single_product() {
        let dir = tempfile::tempdir().unwrap();
        let (app, repo) = test_app(dir.path()).await;
        seed(&repo).await;

        let (status, body) = send(&app, empty_request("GET", "/api/shop/products/p3")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ball");

        let (status, body) = send(&app, empty_request("GET", "/api/shop/products/zzz")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Product not found");
    }

    #[tokio::test]
    async fn categories_are_distinct_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let (app, repo) = test_app(dir.path()).await;
        seed(&repo).await;
        let (_, body) = send(&app, empty_request("GET", "/api/shop/categories")).await;
        assert_eq!(body, json!({"categories": ["food", "grooming", "toys"]}));
    }
}
