use axum::response::Json;
use petcare_store::{Document, ID_ALIAS, ID_FIELD};
use serde_json::{json, Value};

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Welcome handler.
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the PetCare API",
        "name": "petcare-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Response shape of a stored document: `_id` is exposed as `id`.
pub(crate) fn present(document: Document) -> Value {
    let mut map = document.into_map();
    if let Some(id) = map.remove(ID_FIELD) {
        map.insert(ID_ALIAS.to_string(), id);
    }
    Value::Object(map)
}

pub(crate) fn present_all(documents: Vec<Document>) -> Json<Value> {
    Json(Value::Array(documents.into_iter().map(present).collect()))
}
