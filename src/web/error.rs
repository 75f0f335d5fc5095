use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::{error, warn};
use serde_json::json;
use thiserror::Error;

use crate::forms::FieldErrors;
use crate::supabase::StoreError;

/// Failures of the HTTP handlers. Bodies are plain text, except for form
/// validation which answers with the field errors as JSON.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Saknar SUPABASE_URL/SUPABASE_SERVICE_ROLE_KEY i miljön.")]
    NotConfigured,

    #[error("{0}")]
    BadRequest(String),

    #[error("Inte inloggad.")]
    Unauthorized,

    #[error("Du äger inte denna annons.")]
    Forbidden,

    #[error("Annons hittades inte.")]
    NotFound,

    #[error("Formuläret innehåller fel.")]
    Invalid(FieldErrors),

    #[error("{context}: {source}")]
    Backend {
        context: &'static str,
        source: StoreError,
    },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> ApiError {
        ApiError::BadRequest(message.into())
    }

    pub fn backend(context: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Backend { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotConfigured | ApiError::Backend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) | ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        } else {
            warn!("request rejected ({}): {self}", status.as_u16());
        }

        match self {
            ApiError::Invalid(errors) => (status, Json(json!({ "errors": errors }))).into_response(),
            other => (status, other.to_string()).into_response(),
        }
    }
}
