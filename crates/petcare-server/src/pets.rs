//! `/api/pets` routes.

use axum::extract::{Multipart, Path, State};
use axum::response::Json;
use petcare_store::{by_id, Document, Update};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::error::{ServerError, ServerResult};
use crate::handler::{present, present_all};
use crate::state::AppState;
use crate::upload::{discard_upload, read_file_field, save_upload, IMAGES_DIR};

const PET: &str = "Pet";

#[derive(Debug, Deserialize, Serialize)]
pub struct NewPet {
    pub name: String,
    pub species: String,
    pub breed: String,
    pub age: Option<i64>,
    pub weight: Option<f64>,
    pub gender: String,
    pub dob: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PetChanges {
    pub name: Option<String>,
    pub breed: Option<String>,
    pub age: Option<i64>,
    pub weight: Option<f64>,
    pub description: Option<String>,
}

impl PetChanges {
    /// The `$set` fields: every change that is present.
    fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(v) = value {
                fields.insert(key.to_string(), v);
            }
        };
        put("name", self.name.map(Value::from));
        put("breed", self.breed.map(Value::from));
        put("age", self.age.map(Value::from));
        put("weight", self.weight.map(Value::from));
        put("description", self.description.map(Value::from));
        fields
    }
}

pub async fn create_pet(
    State(state): State<AppState>,
    Json(pet): Json<NewPet>,
) -> ServerResult<Json<Value>> {
    let mut document = Document::from_value(
        serde_json::to_value(&pet).map_err(|e| ServerError::Internal(e.to_string()))?,
    )?;
    document.insert("videos_analyzed", json!(0));
    document.insert("appointments", json!(0));
    document.insert("health_score", json!(90));

    let result = state.repo.pets().insert_one(document).await?;
    info!(pet_id = %result.inserted_id, "pet created");
    Ok(Json(json!({
        "id": result.inserted_id,
        "message": "Pet created successfully",
    })))
}

pub async fn list_pets(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    Ok(present_all(state.repo.pets().find(None).await?))
}

pub async fn get_pet(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Value>> {
    let pet = state.repo.pets().get(&id).await?.ok_or(ServerError::NotFound(PET))?;
    Ok(Json(present(pet)))
}

pub async fn update_pet(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<PetChanges>,
) -> ServerResult<Json<Value>> {
    let fields = changes.into_fields();
    if fields.is_empty() {
        return Err(ServerError::BadRequest("No fields to update".into()));
    }
    let result = state.repo.pets().update_one(&by_id(&id), &Update::Set(fields)).await?;
    if result.matched_count == 0 {
        return Err(ServerError::NotFound(PET));
    }
    Ok(Json(json!({ "message": "Pet updated successfully" })))
}

pub async fn delete_pet(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Value>> {
    let result = state.repo.pets().delete_one(&by_id(&id)).await?;
    if result.deleted_count == 0 {
        return Err(ServerError::NotFound(PET));
    }
    info!(pet_id = %id, "pet deleted");
    Ok(Json(json!({ "message": "Pet deleted successfully" })))
}

pub async fn upload_pet_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ServerResult<Json<Value>> {
    let file = read_file_field(&mut multipart).await?;
    if !file.has_type_in(&state.config.allowed_image_types) {
        return Err(ServerError::BadRequest("Invalid file type".into()));
    }

    let pets = state.repo.pets();
    if pets.get(&id).await?.is_none() {
        return Err(ServerError::NotFound(PET));
    }

    let path = save_upload(&state.config.uploads_dir, IMAGES_DIR, &file).await?;
    let image = path.to_string_lossy().into_owned();
    let mut fields = Map::new();
    fields.insert("image".into(), Value::String(image.clone()));
    let result = match pets.update_one(&by_id(&id), &Update::Set(fields)).await {
        Ok(result) => result,
        Err(e) => {
            discard_upload(&path).await;
            return Err(e.into());
        }
    };
    if result.matched_count == 0 {
        // Deleted while the upload was being written.
        discard_upload(&path).await;
        return Err(ServerError::NotFound(PET));
    }
    Ok(Json(json!({
        "message": "Image uploaded successfully",
        "image_path": image,
    })))
}
