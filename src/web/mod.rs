pub mod delete;
pub mod error;
pub mod listings;
pub mod profile;
pub mod update;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use log::info;
use tokio::net::TcpListener;

use crate::{
    config::Config,
    supabase::{memory::MemoryStore, ListingStore, ObjectStorage, SupabaseClient},
};
use error::ApiError;

/// Handles to the hosted backend. `public` reads with the anon key,
/// `admin` and `storage` act with the service role key.
#[derive(Clone)]
pub struct Backend {
    pub public: Arc<dyn ListingStore>,
    pub admin: Arc<dyn ListingStore>,
    pub storage: Arc<dyn ObjectStorage>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Option<Backend>,
}

impl AppState {
    /// Connects to the backend named in `config`. Without backend
    /// credentials the state has no backend and every endpoint answers 500.
    pub fn from_config(config: Arc<Config>) -> Result<AppState> {
        let backend = match config.admin_credentials() {
            Some((url, service_key)) => {
                let admin = Arc::new(SupabaseClient::new(url, service_key)?);
                let public: Arc<dyn ListingStore> = match config.anon_key.as_deref() {
                    Some(anon_key) if !anon_key.trim().is_empty() => {
                        Arc::new(SupabaseClient::new(url, anon_key)?)
                    }
                    _ => admin.clone(),
                };
                Some(Backend {
                    public,
                    admin: admin.clone(),
                    storage: admin,
                })
            }
            None => None,
        };

        Ok(AppState { config, backend })
    }

    /// State backed by a single in-memory store.
    pub fn with_memory_store(config: Config, store: Arc<MemoryStore>) -> AppState {
        AppState {
            config: Arc::new(config),
            backend: Some(Backend {
                public: store.clone(),
                admin: store.clone(),
                storage: store,
            }),
        }
    }

    pub fn backend(&self) -> Result<&Backend, ApiError> {
        self.backend.as_ref().ok_or(ApiError::NotConfigured)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/listings",
            get(listings::feed)
                .post(listings::create)
                .layer(DefaultBodyLimit::max(listings::MAX_UPLOAD_BYTES)),
        )
        .route("/api/listings/update", post(update::update_listing))
        .route("/api/listings/:id", get(listings::detail))
        .route("/api/my-listings", get(listings::my_listings))
        .route("/api/ads/delete", post(delete::delete_listing))
        .route(
            "/api/profile",
            get(profile::get_profile)
                .post(profile::save_profile)
                .layer(DefaultBodyLimit::max(profile::MAX_PROFILE_BYTES)),
        )
        .route("/api/profile/avatar", delete(profile::remove_avatar))
        .layer(middleware::from_fn_with_state(state.clone(), cors_layer))
        .with_state(state)
}

pub async fn start_http_server(
    state: AppState,
    mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
) -> Result<()> {
    let bind_addr = state.config.bind_address();

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind http listener on {bind_addr}"))?;
    info!("listening on {bind_addr}");
    let app = router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .context("HTTP server crashed")
}

/// Cross-origin access for the configured origins only. The origin is
/// echoed back with credentials allowed, so the session cookie travels
/// with cross-origin calls from those sites.
async fn cors_layer(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .filter(|origin| {
            origin
                .to_str()
                .map_or(false, |origin| state.config.allows_origin(origin))
        })
        .cloned();

    let mut response = if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        response
    } else {
        next.run(req).await
    };

    let headers = response.headers_mut();
    headers.append(header::VARY, HeaderValue::from_static("origin"));
    if let Some(origin) = origin {
        apply_cors_headers(headers, origin);
    }
    response
}

fn apply_cors_headers(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type, authorization"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
}
