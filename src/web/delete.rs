use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{error::ApiError, AppState};
use crate::auth::{identity_from_cookie, Identity};
use crate::models::listing::{value_as_text, RowId};
use crate::models::table::ListingTable;
use crate::storage::{collect_image_urls, remove_images};
use crate::supabase::{fetch_row, Row};

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    #[serde(default)]
    id: Option<RowId>,
    #[serde(default)]
    table: Option<String>,
}

/// True when the caller's id or email appears in one of the table's
/// ownership columns.
pub fn is_owner(table: ListingTable, row: &Row, identity: &Identity) -> bool {
    let matches_any = |columns: &[&str], wanted: &Option<String>| match wanted {
        Some(wanted) => columns
            .iter()
            .filter_map(|column| row.get(*column).and_then(value_as_text))
            .any(|value| &value == wanted),
        None => false,
    };

    matches_any(table.owner_id_columns(), &identity.user_id)
        || matches_any(table.owner_email_columns(), &identity.email)
}

/// `POST /api/ads/delete` with `{ "id": ..., "table": ... }`.
///
/// The row and its stored images are removed with service-role access
/// after the cookie identity has been checked against the row's owner
/// columns. Images go first; if that fails the row stays.
pub async fn delete_listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let backend = state.backend()?;

    let request: DeleteRequest = serde_json::from_slice(&body).unwrap_or(DeleteRequest {
        id: None,
        table: None,
    });
    let id = request.id.and_then(RowId::into_key);
    let table = request
        .table
        .as_deref()
        .and_then(|table| table.parse::<ListingTable>().ok());
    let (Some(id), Some(table)) = (id, table) else {
        return Err(ApiError::bad_request("Felaktig request (id/table)."));
    };

    let identity =
        identity_from_cookie(&headers, state.config.jwt_secret()).ok_or(ApiError::Unauthorized)?;

    let row = match fetch_row(backend.admin.as_ref(), table, &id, "*").await {
        Ok(Some(row)) => row,
        Ok(None) => return Err(ApiError::NotFound),
        Err(err) => {
            warn!("could not read {table} row {id}: {err}");
            return Err(ApiError::NotFound);
        }
    };

    if !is_owner(table, &row, &identity) {
        return Err(ApiError::Forbidden);
    }

    let image_urls = collect_image_urls(&row);
    if !image_urls.is_empty() {
        remove_images(backend.storage.as_ref(), &image_urls)
            .await
            .map_err(ApiError::backend("Kunde inte ta bort bilder"))?;
    }

    backend
        .admin
        .delete(table, &id)
        .await
        .map_err(ApiError::backend("Kunde inte ta bort annons"))?;

    info!(
        "deleted {table} row {id} with {} image(s)",
        image_urls.len()
    );
    Ok(Json(json!({ "ok": true })))
}
