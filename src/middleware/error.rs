use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

use super::traits::Views;
use crate::gate::GateError;

/// Missing or invalid configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    /// An HTTP client could not be built.
    #[error("Client setup failed: {0}")]
    Client(#[from] crate::Error),
}

/// Status for a gate failure rendered as a page.
pub(super) fn status_for(err: &GateError) -> StatusCode {
    match err {
        GateError::MissingInput(_) => StatusCode::BAD_REQUEST,
        GateError::LinkRequest(_) => StatusCode::BAD_GATEWAY,
        GateError::MissingLinkToken | GateError::LinkExchange(_) | GateError::Unauthenticated => {
            StatusCode::UNAUTHORIZED
        }
        GateError::SessionInvalid(_) | GateError::Denied { .. } => StatusCode::FORBIDDEN,
        GateError::PolicyUnavailable {
            credential_cleared: true,
            ..
        } => StatusCode::FORBIDDEN,
        GateError::PolicyUnavailable { .. } | GateError::Catalog(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Turn a gate failure into a response.
///
/// A client without a credential is sent to the landing page. Everything
/// else renders the landing view with the user-facing message only.
pub(super) fn error_response<V: Views>(views: &V, landing_path: &str, err: &GateError) -> Response {
    if matches!(err, GateError::Unauthenticated) {
        return Redirect::temporary(landing_path).into_response();
    }
    (status_for(err), Html(views.landing(Some(err.user_message())))).into_response()
}
