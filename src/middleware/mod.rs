//! Axum router for the magic link gate.
//!
//! Serves the landing page, the link request and callback, the protected
//! resource view and logout. The session credential and the one-shot error
//! message live in private (encrypted) cookies.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use linkgate::StaticCatalog;
//! use linkgate::middleware::{GateConfig, HtmlViews, gate_routes};
//!
//! // 1. Configure from environment
//! let config = GateConfig::from_env()?;
//!
//! // 2. Mount the gate with your resource catalog and views
//! let app = axum::Router::new()
//!     .merge(gate_routes(config, StaticCatalog, HtmlViews::default()));
//! ```

mod config;
mod cookies;
mod error;
mod routes;
mod session;
mod state;
mod traits;
mod types;
mod views;

pub use config::GateConfig;
pub use error::ConfigError;
pub use routes::{CALLBACK_PATH, LANDING_PATH, LOGIN_PATH, LOGOUT_PATH, RESOURCE_PATH, gate_routes};
pub use traits::Views;
pub use views::HtmlViews;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
