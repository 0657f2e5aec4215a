//! imgup-server: the HTTP face of imgup.
//!
//! Wires the upload pipeline, listing service and vision adapter into an axum
//! router. [`build`] assembles the production stack from an [`AppConfig`];
//! tests construct [`AppState`] directly with in-memory collaborators.

pub mod app;
pub mod config;
pub mod pages;
pub mod routes;
mod error;

pub use app::{build, AppState, ImgupApp};
pub use config::{AppConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorKind};
