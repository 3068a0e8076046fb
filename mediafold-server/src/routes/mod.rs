use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{
    handlers::{conversion, health, library, thumbnails},
    infra::app_state::AppState,
};

pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/folders", get(library::list_folders))
        .route("/api/photos", get(library::list_root_photos))
        .route("/api/photos/{*folder}", get(library::list_photos))
        .route(
            "/api/set-current-folder/{*folder}",
            post(library::set_current_folder),
        )
        .route("/api/photo/{*path}", get(library::serve_photo))
        .route("/api/thumbnail/{*path}", get(thumbnails::get_thumbnail))
        .route(
            "/api/thumbnail-status/{*path}",
            get(thumbnails::thumbnail_status),
        )
        .route("/api/thumbnail-cache/status", get(thumbnails::cache_status))
        .route("/api/thumbnail-cache/clear", post(thumbnails::clear_cache))
        .route("/api/convert/{*path}", get(conversion::convert))
        .route(
            "/api/conversion-status/{*path}",
            get(conversion::conversion_status),
        )
        .route("/api/conversion-cache/status", get(conversion::cache_status))
        .route("/api/conversion-cache/clear", post(conversion::clear_cache))
}

/// CORS is permissive in dev mode and an allow-list otherwise.
pub fn cors_layer(state: &AppState) -> CorsLayer {
    let config = state.config();
    if config.dev_mode {
        return CorsLayer::permissive();
    }

    let allow_origin = if config.cors.is_wildcard_included() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(%origin, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    let layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::RANGE]);

    // Credentials cannot be combined with a wildcard origin.
    if config.cors.allow_credentials && !config.cors.is_wildcard_included() {
        layer.allow_credentials(true)
    } else {
        layer
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .merge(create_api_router())
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
