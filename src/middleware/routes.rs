use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Form, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum_extra::extract::PrivateCookieJar;

use super::config::GateConfig;
use super::error::{error_response, status_for};
use super::state::GateState;
use super::traits::Views;
use super::types::{CallbackParams, LoginForm};
use crate::authz::PolicyEngine;
use crate::catalog::ResourceCatalog;
use crate::gate::{GateError, Landing, RequestGate};
use crate::identity::IdentityGateway;

pub const LANDING_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login_or_create_user";
pub const CALLBACK_PATH: &str = "/callback";
pub const RESOURCE_PATH: &str = "/user";
pub const LOGOUT_PATH: &str = "/logout";

/// Create the gate router.
///
/// `catalog` supplies the resources checked on the protected view and
/// `views` renders every page.
pub fn gate_routes<I, P, C, V>(config: GateConfig<I, P>, catalog: C, views: V) -> Router
where
    I: IdentityGateway,
    P: PolicyEngine,
    C: ResourceCatalog,
    V: Views,
{
    let gate = RequestGate::new(config.identity, config.policy, catalog)
        .with_profile(config.settings.profile.clone())
        .with_failure_mode(config.settings.failure_mode);

    let state = GateState {
        gate,
        views: Arc::new(views),
        settings: config.settings,
    };

    Router::new()
        .route(LANDING_PATH, get(index::<I, P, C, V>))
        .route(LOGIN_PATH, post(login_or_create_user::<I, P, C, V>))
        .route(CALLBACK_PATH, get(callback::<I, P, C, V>))
        .route(RESOURCE_PATH, get(user::<I, P, C, V>))
        .route(
            LOGOUT_PATH,
            get(logout::<I, P, C, V>).post(logout::<I, P, C, V>),
        )
        .with_state(state)
}

// ── Landing ────────────────────────────────────────────────────────

async fn index<I, P, C, V>(
    State(state): State<GateState<I, P, C, V>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Response)
where
    I: IdentityGateway,
    P: PolicyEngine,
    C: ResourceCatalog,
    V: Views,
{
    let mut session = state.session(jar);
    let response = match state.gate.landing(&mut session) {
        Landing::Resume => Redirect::to(RESOURCE_PATH).into_response(),
        Landing::Anonymous { error } => {
            Html(state.views.landing(error.as_deref())).into_response()
        }
    };
    (session.into_jar(), response)
}

// ── Link request ───────────────────────────────────────────────────

async fn login_or_create_user<I, P, C, V>(
    State(state): State<GateState<I, P, C, V>>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response
where
    I: IdentityGateway,
    P: PolicyEngine,
    C: ResourceCatalog,
    V: Views,
{
    let result = match form {
        Ok(Form(form)) => state.gate.request_link(&form.email, &form.role).await,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Malformed login form");
            Err(GateError::MissingInput("form"))
        }
    };
    match result {
        Ok(sent) => Html(state.views.link_sent(&sent)).into_response(),
        Err(e) => {
            let page = state.views.landing(Some(e.user_message()));
            (status_for(&e), Html(page)).into_response()
        }
    }
}

// ── Link callback ──────────────────────────────────────────────────

async fn callback<I, P, C, V>(
    State(state): State<GateState<I, P, C, V>>,
    jar: PrivateCookieJar,
    query: Result<Query<CallbackParams>, QueryRejection>,
) -> (PrivateCookieJar, Redirect)
where
    I: IdentityGateway,
    P: PolicyEngine,
    C: ResourceCatalog,
    V: Views,
{
    let token = match query {
        Ok(Query(params)) => params.token,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Malformed link callback query");
            None
        }
    };

    let mut session = state.session(jar);
    let target = match state.gate.complete_link(&mut session, token.as_deref()).await {
        Ok(_) => RESOURCE_PATH,
        // The error is in the one-shot slot for the landing page.
        Err(_) => LANDING_PATH,
    };
    (session.into_jar(), Redirect::to(target))
}

// ── Protected view ─────────────────────────────────────────────────

async fn user<I, P, C, V>(
    State(state): State<GateState<I, P, C, V>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Response)
where
    I: IdentityGateway,
    P: PolicyEngine,
    C: ResourceCatalog,
    V: Views,
{
    let mut session = state.session(jar);
    let response = match state.gate.view(&mut session).await {
        Ok(granted) => Html(state.views.resource(&granted)).into_response(),
        Err(e) => error_response(state.views.as_ref(), LANDING_PATH, &e),
    };
    (session.into_jar(), response)
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<I, P, C, V>(
    State(state): State<GateState<I, P, C, V>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect)
where
    I: IdentityGateway,
    P: PolicyEngine,
    C: ResourceCatalog,
    V: Views,
{
    let mut session = state.session(jar);
    state.gate.logout(&mut session);
    (session.into_jar(), Redirect::to(LANDING_PATH))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
    use axum::http::{Request, StatusCode};
    use axum_extra::extract::cookie::Key;
    use tower::ServiceExt;

    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::gate::{PolicyFailureMode, messages};
    use crate::middleware::HtmlViews;
    use crate::testing::{MockGateway, MockPolicy};
    use crate::user::User;

    const SESSION_COOKIE: &str = "__linkgate_session";

    fn app(gateway: MockGateway, policy: MockPolicy, mode: PolicyFailureMode) -> Router {
        app_with_key(gateway, policy, mode, Key::generate())
    }

    fn app_with_key(
        gateway: MockGateway,
        policy: MockPolicy,
        mode: PolicyFailureMode,
        key: Key,
    ) -> Router {
        let config = GateConfig::new(gateway, policy)
            .with_cookie_key(key)
            .with_secure_cookies(false)
            .with_failure_mode(mode);
        gate_routes(config, StaticCatalog, HtmlViews::default())
    }

    fn linked_gateway() -> MockGateway {
        MockGateway::new().with_link("link-ok", User::new("user-1").with_role("user"))
    }

    async fn send(app: &Router, method: &str, uri: &str, cookies: &str, body: &str) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if !cookies.is_empty() {
            request = request.header(COOKIE, cookies);
        }
        if method == "POST" {
            request = request.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        }
        app.clone()
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }

    /// `name=value` pairs the client keeps after this response.
    fn kept_cookies(response: &Response) -> String {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .filter(|pair| pair.split_once('=').is_some_and(|(_, value)| !value.is_empty()))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn removes(response: &Response, name: &str) -> bool {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.starts_with(&format!("{name}=;")) && v.contains("Max-Age=0"))
    }

    fn location(response: &Response) -> &str {
        response.headers()[LOCATION].to_str().unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Follow a valid link and return the session cookie.
    async fn login(app: &Router) -> String {
        let response = send(app, "GET", "/callback?token=link-ok", "", "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), RESOURCE_PATH);
        let cookies = kept_cookies(&response);
        assert!(cookies.starts_with(SESSION_COOKIE));
        cookies
    }

    #[tokio::test]
    async fn landing_renders_login_form() {
        let app = app(MockGateway::new(), MockPolicy::allow_all(), PolicyFailureMode::default());
        let response = send(&app, "GET", "/", "", "").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("action=\"/login_or_create_user\""));
        assert!(!body.contains("class=\"error\""));
    }

    #[tokio::test]
    async fn link_request_acknowledges_even_if_role_push_fails() {
        let gateway = MockGateway::new().failing_role_push();
        let app = app(gateway, MockPolicy::allow_all(), PolicyFailureMode::default());

        let form = "email=alice%40example.com&role=admin";
        let response = send(&app, "POST", LOGIN_PATH, "", form).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Check your email"));
    }

    #[tokio::test]
    async fn link_request_failure_renders_landing_with_message() {
        let gateway = MockGateway::new().failing_link_request();
        let app = app(gateway, MockPolicy::allow_all(), PolicyFailureMode::default());

        let form = "email=alice%40example.com&role=admin";
        let response = send(&app, "POST", LOGIN_PATH, "", form).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(body_text(response).await.contains(messages::LINK_REQUEST_FAILED));
    }

    #[tokio::test]
    async fn missing_form_field_is_rejected() {
        let app = app(MockGateway::new(), MockPolicy::allow_all(), PolicyFailureMode::default());
        let response = send(&app, "POST", LOGIN_PATH, "", "email=alice%40example.com").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn callback_without_token_shows_error_once() {
        let app = app(MockGateway::new(), MockPolicy::allow_all(), PolicyFailureMode::default());

        let response = send(&app, "GET", "/callback", "", "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), LANDING_PATH);
        let cookies = kept_cookies(&response);
        assert!(!cookies.contains(SESSION_COOKIE));

        let response = send(&app, "GET", "/", &cookies, "").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(removes(&response, "__linkgate_error"));
        assert!(body_text(response).await.contains(messages::LINK_EXCHANGE_FAILED));

        // The browser dropped the error cookie.
        let response = send(&app, "GET", "/", "", "").await;
        assert!(!body_text(response).await.contains(messages::LINK_EXCHANGE_FAILED));
    }

    #[tokio::test]
    async fn malformed_form_renders_landing() {
        let app = app(MockGateway::new(), MockPolicy::allow_all(), PolicyFailureMode::default());
        let request = Request::builder()
            .method("POST")
            .uri(LOGIN_PATH)
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from("email=alice@example.com&role=admin"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_text(response).await;
        assert!(body.contains(messages::MISSING_INPUT));
        assert!(body.contains("action=\"/login_or_create_user\""));
    }

    #[tokio::test]
    async fn malformed_callback_query_goes_through_error_slot() {
        let gateway = linked_gateway();
        let app = app(gateway, MockPolicy::allow_all(), PolicyFailureMode::default());

        let response = send(&app, "GET", "/callback?token=a&token=b", "", "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), LANDING_PATH);
        let cookies = kept_cookies(&response);
        assert!(!cookies.contains(SESSION_COOKIE));

        let response = send(&app, "GET", "/", &cookies, "").await;
        assert!(body_text(response).await.contains(messages::LINK_EXCHANGE_FAILED));
    }

    #[tokio::test]
    async fn invalid_link_token_drops_session_and_shows_error_once() {
        let app = app(linked_gateway(), MockPolicy::allow_all(), PolicyFailureMode::default());
        let session = login(&app).await;

        let response = send(&app, "GET", "/callback?token=bogus", &session, "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), LANDING_PATH);
        assert!(removes(&response, SESSION_COOKIE));
        let cookies = kept_cookies(&response);
        assert!(!cookies.contains(SESSION_COOKIE));

        let response = send(&app, "GET", "/", &cookies, "").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(removes(&response, "__linkgate_error"));
        assert!(body_text(response).await.contains(messages::LINK_EXCHANGE_FAILED));

        let response = send(&app, "GET", "/", "", "").await;
        assert!(!body_text(response).await.contains(messages::LINK_EXCHANGE_FAILED));
    }

    #[tokio::test]
    async fn rejected_credential_renders_landing_and_drops_session() {
        let key = Key::generate();
        let issuing = app_with_key(
            linked_gateway(),
            MockPolicy::allow_all(),
            PolicyFailureMode::default(),
            key.clone(),
        );
        let session = login(&issuing).await;

        // Same cookie key, but an identity service that no longer knows the session.
        let app = app_with_key(
            MockGateway::new(),
            MockPolicy::allow_all(),
            PolicyFailureMode::default(),
            key,
        );
        let response = send(&app, "GET", RESOURCE_PATH, &session, "").await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(removes(&response, SESSION_COOKIE));
        let body = body_text(response).await;
        assert!(body.contains(messages::SESSION_INVALID));
        assert!(body.contains("action=\"/login_or_create_user\""));
    }

    #[tokio::test]
    async fn landing_resumes_with_session() {
        let app = app(linked_gateway(), MockPolicy::allow_all(), PolicyFailureMode::default());
        let cookies = login(&app).await;

        let response = send(&app, "GET", "/", &cookies, "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), RESOURCE_PATH);
    }

    #[tokio::test]
    async fn user_without_session_redirects_to_landing() {
        let app = app(MockGateway::new(), MockPolicy::allow_all(), PolicyFailureMode::default());
        let response = send(&app, "GET", RESOURCE_PATH, "", "").await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location(&response), LANDING_PATH);
    }

    #[tokio::test]
    async fn granted_user_sees_resources() {
        let app = app(linked_gateway(), MockPolicy::allow_all(), PolicyFailureMode::default());
        let cookies = login(&app).await;

        let response = send(&app, "GET", RESOURCE_PATH, &cookies, "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Welcome user-1"));
        assert!(body.contains("<td>abc123</td>"));
        assert!(body.contains("<td>def456</td>"));
    }

    #[tokio::test]
    async fn denial_clears_session() {
        let app = app(linked_gateway(), MockPolicy::owner_only(), PolicyFailureMode::default());
        let cookies = login(&app).await;

        let response = send(&app, "GET", RESOURCE_PATH, &cookies, "").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(removes(&response, SESSION_COOKIE));
        assert!(body_text(response).await.contains(messages::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn forged_cookie_is_unauthenticated() {
        let app = app(linked_gateway(), MockPolicy::allow_all(), PolicyFailureMode::default());
        let forged = format!("{SESSION_COOKIE}=sess-user-1-1");

        let response = send(&app, "GET", RESOURCE_PATH, &forged, "").await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }

    #[tokio::test]
    async fn unreachable_engine_forces_reauth_by_default() {
        let app = app(linked_gateway(), MockPolicy::unreachable(), PolicyFailureMode::ForceReauth);
        let cookies = login(&app).await;

        let response = send(&app, "GET", RESOURCE_PATH, &cookies, "").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(removes(&response, SESSION_COOKIE));
    }

    #[tokio::test]
    async fn unreachable_engine_keeps_session_when_degrading() {
        let app = app(linked_gateway(), MockPolicy::unreachable(), PolicyFailureMode::Degrade);
        let cookies = login(&app).await;

        let response = send(&app, "GET", RESOURCE_PATH, &cookies, "").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!removes(&response, SESSION_COOKIE));
        assert!(body_text(response).await.contains(messages::AUTHORIZATION_UNAVAILABLE));
    }

    #[tokio::test]
    async fn logout_then_view_is_unauthenticated() {
        let app = app(linked_gateway(), MockPolicy::allow_all(), PolicyFailureMode::default());
        let cookies = login(&app).await;

        let response = send(&app, "GET", LOGOUT_PATH, &cookies, "").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), LANDING_PATH);
        assert!(removes(&response, SESSION_COOKIE));

        let response = send(&app, "GET", RESOURCE_PATH, "", "").await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }
}
