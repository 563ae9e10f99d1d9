use serde::Deserialize;

/// `POST /login_or_create_user` form body.
///
/// Missing fields deserialize as empty and are rejected by the gate.
#[derive(Debug, Default, Deserialize)]
pub(super) struct LoginForm {
    #[serde(default)]
    pub(super) email: String,
    #[serde(default)]
    pub(super) role: String,
}

/// Query parameters of the link callback.
#[derive(Debug, Default, Deserialize)]
pub(super) struct CallbackParams {
    pub(super) token: Option<String>,
}
