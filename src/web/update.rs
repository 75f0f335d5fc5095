use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{error::ApiError, AppState};
use crate::auth::bearer_user_id;
use crate::models::listing::{retain_updatable, value_as_text, RowId};
use crate::models::table::ListingTable;
use crate::supabase::fetch_row;

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    #[serde(default)]
    id: Option<RowId>,
    #[serde(default)]
    payload: Option<Value>,
}

/// `POST /api/listings/update` with `{ "id": ..., "payload": {...} }`.
///
/// Only the listing's `user_id` may update it, and only allow-listed
/// columns of the payload are written.
pub async fn update_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let backend = state.backend()?;

    let request: Option<UpdateRequest> = serde_json::from_slice(&body).ok();
    let (id, payload) = match request {
        Some(UpdateRequest {
            id: Some(id),
            payload: Some(Value::Object(payload)),
        }) => match id.into_key() {
            Some(id) => (id, payload),
            None => return Err(ApiError::bad_request("Felaktig request.")),
        },
        _ => return Err(ApiError::bad_request("Felaktig request.")),
    };

    let user_id =
        bearer_user_id(&headers, state.config.jwt_secret()).ok_or(ApiError::Unauthorized)?;

    let row = match fetch_row(backend.admin.as_ref(), ListingTable::Listings, &id, "id,user_id").await
    {
        Ok(Some(row)) => row,
        Ok(None) => return Err(ApiError::NotFound),
        Err(err) => {
            warn!("could not read listing {id}: {err}");
            return Err(ApiError::NotFound);
        }
    };

    let owner = row.get("user_id").and_then(value_as_text);
    if owner.as_deref() != Some(user_id.as_str()) {
        return Err(ApiError::Forbidden);
    }

    let patch = retain_updatable(payload);
    let columns: Vec<&str> = patch.keys().map(String::as_str).collect();
    info!("updating listing {id} columns {columns:?}");

    backend
        .admin
        .update(ListingTable::Listings, &id, patch)
        .await
        .map_err(ApiError::backend("Kunde inte uppdatera"))?;

    Ok(Json(json!({ "ok": true })))
}
