use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use futures::future::join_all;
use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{error::ApiError, AppState};
use crate::auth::bearer_user_id;
use crate::feed::{fetch_page, FeedPage, MAX_PAGE};
use crate::filters::FilterState;
use crate::forms::ListingForm;
use crate::models::listing::{Kind, Listing};
use crate::models::table::ListingTable;
use crate::normalize::normalize_kind;
use crate::storage::remove_images;
use crate::supabase::{fetch_owned_listings, fetch_row};

/// Largest accepted multipart body for listing creation.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

const DEFAULT_EXTENSION: &str = "jpg";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Serialize)]
pub struct ListingsResponse {
    pub items: Vec<Listing>,
}

/// `GET /api/listings?kind=...&page=N`
pub async fn feed(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<FeedPage>, ApiError> {
    let backend = state.backend()?;

    let filters = FilterState::from_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    let page = page_param(&params)?;

    fetch_page(backend.public.as_ref(), &filters, page)
        .await
        .map(Json)
        .map_err(ApiError::backend("Kunde inte hämta annonser"))
}

/// The `page` parameter: absent or blank is page 0, anything that is not a
/// number up to [`MAX_PAGE`] is rejected.
fn page_param(params: &[(String, String)]) -> Result<usize, ApiError> {
    let raw = match params.iter().find(|(key, _)| key == "page") {
        Some((_, value)) => value.trim(),
        None => return Ok(0),
    };
    if raw.is_empty() {
        return Ok(0);
    }
    match raw.parse::<usize>() {
        Ok(page) if page <= MAX_PAGE => Ok(page),
        _ => Err(ApiError::bad_request("Felaktig sida.")),
    }
}

/// `GET /api/listings/:id`
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Listing>, ApiError> {
    let backend = state.backend()?;

    let row = fetch_row(backend.public.as_ref(), ListingTable::Listings, &id, "*")
        .await
        .map_err(ApiError::backend("Kunde inte hämta annons"))?
        .ok_or(ApiError::NotFound)?;

    let listing = serde_json::from_value::<Listing>(Value::Object(row))
        .map_err(|err| ApiError::backend("Kunde inte läsa annons")(err.into()))?;
    Ok(Json(listing))
}

/// `GET /api/my-listings`, newest first.
pub async fn my_listings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListingsResponse>, ApiError> {
    let backend = state.backend()?;
    let user_id =
        bearer_user_id(&headers, state.config.jwt_secret()).ok_or(ApiError::Unauthorized)?;

    let items = fetch_owned_listings(backend.admin.as_ref(), &user_id)
        .await
        .map_err(ApiError::backend("Kunde inte hämta dina annonser"))?;
    Ok(Json(ListingsResponse { items }))
}

struct Upload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

impl Upload {
    fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.trim().to_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }
}

pub(super) async fn text_field(field: Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|err| ApiError::bad_request(format!("Felaktigt formulär: {err}")))
}

/// `POST /api/listings` as multipart: `kind`, `form` (JSON) and one
/// `images` part per picture.
///
/// Images are stored under `<user id>/<uuid>-<index>.<ext>` before the
/// row is inserted. If any upload or the insert fails, the images that
/// were stored are removed again.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let backend = state.backend()?;
    let user_id =
        bearer_user_id(&headers, state.config.jwt_secret()).ok_or(ApiError::Unauthorized)?;

    let mut kind = Kind::Sale;
    let mut form: Option<ListingForm> = None;
    let mut uploads: Vec<Upload> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("Felaktigt formulär: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "kind" => kind = normalize_kind(Some(&text_field(field).await?)),
            "form" => {
                let raw = text_field(field).await?;
                form = Some(serde_json::from_str(&raw).map_err(|err| {
                    ApiError::bad_request(format!("Felaktigt formulär: {err}"))
                })?);
            }
            "images" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::bad_request(format!("Felaktig bild: {err}")))?;
                uploads.push(Upload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => warn!("ignoring unknown multipart field '{other}'"),
        }
    }

    let form = form.ok_or_else(|| ApiError::bad_request("Formulär saknas."))?;
    let errors = form.validate(kind, uploads.len());
    if !errors.is_empty() {
        return Err(ApiError::Invalid(errors));
    }

    let bucket = state.config.image_bucket();
    let results = join_all(uploads.into_iter().enumerate().map(|(index, upload)| {
        let path = format!(
            "{}/{}-{}.{}",
            user_id,
            Uuid::new_v4(),
            index,
            upload.extension()
        );
        let content_type = upload
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let storage = backend.storage.clone();
        async move {
            storage
                .upload(bucket, &path, &content_type, upload.bytes, false)
                .await
        }
    }))
    .await;

    let mut image_urls = Vec::with_capacity(results.len());
    let mut upload_error = None;
    for result in results {
        match result {
            Ok(url) => image_urls.push(url),
            Err(err) => upload_error = upload_error.or(Some(err)),
        }
    }
    if let Some(err) = upload_error {
        discard_images(&state, &image_urls).await;
        return Err(ApiError::backend("Kunde inte ladda upp bilder")(err));
    }

    let payload = form.into_new_listing(kind, &user_id, image_urls.clone());
    let payload = serde_json::to_value(&payload)
        .map_err(|err| ApiError::backend("Kunde inte spara annons")(err.into()))?;

    let row = match backend.admin.insert(ListingTable::Listings, payload).await {
        Ok(row) => row,
        Err(err) => {
            discard_images(&state, &image_urls).await;
            return Err(ApiError::backend("Kunde inte spara annons")(err));
        }
    };

    let id = row.get("id").cloned().unwrap_or(Value::Null);
    info!(
        "user {user_id} published {} listing {id} with {} image(s)",
        kind,
        image_urls.len()
    );
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn discard_images(state: &AppState, urls: &[String]) {
    let Some(backend) = state.backend.as_ref() else {
        return;
    };
    if urls.is_empty() {
        return;
    }
    if let Err(err) = remove_images(backend.storage.as_ref(), urls).await {
        warn!("could not remove {} orphaned image(s): {err}", urls.len());
    }
}
