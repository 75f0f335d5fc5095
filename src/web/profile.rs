use axum::{extract::Multipart, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use log::{info, warn};
use serde_json::Value;

use super::listings::text_field;
use super::{error::ApiError, AppState, Backend};
use crate::auth::bearer_user_id;
use crate::forms::FieldErrors;
use crate::models::table::ListingTable;
use crate::profile::{
    avatar_extension, avatar_object, to_e164_se, Profile, ProfileView, AVATAR_BUCKETS,
    INVALID_PHONE, MAX_AVATAR_BYTES,
};
use crate::supabase::{fetch_row, ObjectStorage, Row, StoreError};

/// Largest accepted multipart body for a profile save.
pub const MAX_PROFILE_BYTES: usize = 2 * MAX_AVATAR_BYTES;

struct Avatar {
    content_type: String,
    extension: &'static str,
    bytes: Vec<u8>,
}

async fn load_profile(backend: &Backend, user_id: &str) -> Result<Profile, ApiError> {
    let row = fetch_row(backend.admin.as_ref(), ListingTable::Profiles, user_id, "*")
        .await
        .map_err(ApiError::backend("Kunde inte hämta profil"))?;

    match row {
        Some(row) => serde_json::from_value(Value::Object(row))
            .map_err(|err| ApiError::backend("Kunde inte läsa profil")(err.into())),
        None => Ok(Profile::empty(user_id)),
    }
}

/// `GET /api/profile`. A user who never saved a profile gets an empty one.
pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProfileView>, ApiError> {
    let backend = state.backend()?;
    let user_id =
        bearer_user_id(&headers, state.config.jwt_secret()).ok_or(ApiError::Unauthorized)?;

    Ok(Json(load_profile(backend, &user_id).await?.into()))
}

/// `POST /api/profile` as multipart with optional `full_name`, `phone` and
/// `avatar` parts. Parts that are left out keep their stored value; a blank
/// `phone` clears the number.
pub async fn save_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ProfileView>, ApiError> {
    let backend = state.backend()?;
    let user_id =
        bearer_user_id(&headers, state.config.jwt_secret()).ok_or(ApiError::Unauthorized)?;

    let mut full_name: Option<String> = None;
    let mut phone: Option<String> = None;
    let mut avatar_part: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("Felaktigt formulär: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "full_name" | "fullName" => full_name = Some(text_field(field).await?),
            "phone" => phone = Some(text_field(field).await?),
            "avatar" => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::bad_request(format!("Felaktig bild: {err}")))?;
                if !bytes.is_empty() {
                    avatar_part = Some((content_type, bytes.to_vec()));
                }
            }
            other => warn!("ignoring unknown profile field '{other}'"),
        }
    }

    let mut errors = FieldErrors::new();

    let phone = match phone.as_deref().map(str::trim) {
        None => None,
        Some("") => Some(None),
        Some(raw) => match to_e164_se(raw) {
            Some(e164) => Some(Some(e164)),
            None => {
                errors.insert("phone".into(), INVALID_PHONE.into());
                None
            }
        },
    };

    let avatar = match avatar_part {
        None => None,
        Some((content_type, bytes)) => {
            let content_type = content_type.unwrap_or_default();
            match avatar_extension(&content_type) {
                None => {
                    errors.insert("avatar".into(), "Endast JPG/PNG/WEBP tillåts.".into());
                    None
                }
                Some(_) if bytes.len() > MAX_AVATAR_BYTES => {
                    errors.insert("avatar".into(), "Bilden är för stor. Max 8 MB.".into());
                    None
                }
                Some(extension) => Some(Avatar {
                    content_type,
                    extension,
                    bytes,
                }),
            }
        }
    };

    if !errors.is_empty() {
        return Err(ApiError::Invalid(errors));
    }

    let mut profile = load_profile(backend, &user_id).await?;
    if let Some(name) = full_name {
        profile.full_name = Some(name.trim().to_string());
    }
    if let Some(phone) = phone {
        profile.phone = phone;
    }

    let uploaded = match avatar {
        Some(avatar) => Some(
            upload_avatar(backend.storage.as_ref(), &user_id, avatar)
                .await
                .map_err(ApiError::backend("Uppladdning misslyckades"))?,
        ),
        None => None,
    };
    if let Some(url) = &uploaded {
        profile.avatar_url = Some(url.clone());
    }
    profile.updated_at = Some(Utc::now().to_rfc3339());

    let row = match serde_json::to_value(&profile) {
        Ok(Value::Object(row)) => row,
        Ok(_) => Row::new(),
        Err(err) => return Err(ApiError::backend("Kunde inte spara")(err.into())),
    };

    let saved = match backend.admin.upsert(ListingTable::Profiles, row).await {
        Ok(saved) => saved,
        Err(err) => {
            if let Some(url) = &uploaded {
                discard_avatar(backend.storage.as_ref(), url).await;
            }
            return Err(ApiError::backend("Kunde inte spara")(err));
        }
    };

    info!(
        "saved profile {user_id}{}",
        if uploaded.is_some() { " with new avatar" } else { "" }
    );
    let saved: Profile = serde_json::from_value(Value::Object(saved))
        .map_err(|err| ApiError::backend("Kunde inte läsa profil")(err.into()))?;
    Ok(Json(saved.into()))
}

/// `DELETE /api/profile/avatar`. The stored object is removed on a best
/// effort basis; the profile always ends up without an avatar.
pub async fn remove_avatar(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProfileView>, ApiError> {
    let backend = state.backend()?;
    let user_id =
        bearer_user_id(&headers, state.config.jwt_secret()).ok_or(ApiError::Unauthorized)?;

    let mut profile = load_profile(backend, &user_id).await?;
    let Some(url) = profile.avatar_url.take() else {
        return Ok(Json(profile.into()));
    };

    discard_avatar(backend.storage.as_ref(), &url).await;

    let updated_at = Utc::now().to_rfc3339();
    let mut patch = Row::new();
    patch.insert("avatar_url".into(), Value::Null);
    patch.insert("updated_at".into(), Value::String(updated_at.clone()));
    backend
        .admin
        .update(ListingTable::Profiles, &user_id, patch)
        .await
        .map_err(ApiError::backend("Kunde inte spara"))?;

    info!("removed avatar of profile {user_id}");
    profile.updated_at = Some(updated_at);
    Ok(Json(profile.into()))
}

/// Stores the avatar at `<user id>/<millis>.<ext>` in the first avatar
/// bucket that accepts it.
async fn upload_avatar(
    storage: &dyn ObjectStorage,
    user_id: &str,
    avatar: Avatar,
) -> Result<String, StoreError> {
    let path = format!(
        "{}/{}.{}",
        user_id,
        Utc::now().timestamp_millis(),
        avatar.extension
    );

    let mut last_error = None;
    for bucket in AVATAR_BUCKETS {
        match storage
            .upload(bucket, &path, &avatar.content_type, avatar.bytes.clone(), true)
            .await
        {
            Ok(url) => return Ok(url),
            Err(err) => {
                warn!("avatar upload to bucket {bucket} failed: {err}");
                last_error = Some(err);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| StoreError::backend(500, "no avatar bucket")))
}

async fn discard_avatar(storage: &dyn ObjectStorage, url: &str) {
    let Some((bucket, path)) = avatar_object(url) else {
        return;
    };
    if let Err(err) = storage.remove(&bucket, &[path]).await {
        warn!("could not remove avatar {url}: {err}");
    }
}
