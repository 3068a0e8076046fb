//! # mediafold server
//!
//! HTTP surface for browsing a folder tree of photos and videos. Video
//! thumbnails are produced by a background pipeline and served from an
//! in-memory cache; legacy containers (AVI, WMV, FLV, MKV) are converted to
//! MP4 either by streaming ffmpeg output straight to the client or through
//! a background conversion queue, depending on configuration.

pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::{
    app_state::{AppState, ConversionService},
    errors::{AppError, AppResult},
    startup::build_state,
};
pub use routes::create_app;
