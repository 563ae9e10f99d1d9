use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::identity::{AuthenticatedSession, IdentityGateway, LinkRequested};
use crate::types::{SessionToken, UserId};
use crate::user::{TrustedMetadata, User};

/// Default per-request timeout for identity and policy calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity service configuration.
///
/// Required fields are constructor parameters.
///
/// ```rust,ignore
/// use linkgate::GatewayConfig;
///
/// let config = GatewayConfig::new(
///     "project-test-1",
///     "secret-test-1",
///     "http://localhost:3000/callback".parse()?,
/// );
/// // Optional overrides via chaining:
/// let config = config.with_session_duration_minutes(30);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct GatewayConfig {
    pub(crate) project_id: String,
    pub(crate) secret: String,
    pub(crate) api_url: Url,
    pub(crate) magic_link_url: Url,
    pub(crate) session_duration_minutes: u32,
    pub(crate) timeout: Duration,
}

impl GatewayConfig {
    /// Create a gateway configuration.
    ///
    /// `magic_link_url` is used as both the login and the signup link target.
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        secret: impl Into<String>,
        magic_link_url: Url,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            secret: secret.into(),
            api_url: "https://test.stytch.com/v1/"
                .parse()
                .expect("valid default URL"),
            magic_link_url,
            session_duration_minutes: 60,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the identity API base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: Url) -> Self {
        self.api_url = with_trailing_slash(url);
        self
    }

    /// Lifetime requested for new and validated sessions.
    #[must_use]
    pub fn with_session_duration_minutes(mut self, minutes: u32) -> Self {
        self.session_duration_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    #[must_use]
    pub fn magic_link_url(&self) -> &Url {
        &self.magic_link_url
    }

    #[must_use]
    pub fn session_duration_minutes(&self) -> u32 {
        self.session_duration_minutes
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`.
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// HTTP client for a Stytch-style magic link API.
pub struct HttpIdentityGateway {
    config: GatewayConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct LoginOrCreateRequest<'a> {
    email: &'a str,
    login_magic_link_url: &'a str,
    signup_magic_link_url: &'a str,
}

#[derive(Deserialize)]
struct LoginOrCreateResponse {
    user_id: UserId,
    #[serde(default)]
    user_created: bool,
}

#[derive(Serialize)]
struct MagicLinkAuthenticateRequest<'a> {
    token: &'a str,
    session_duration_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<&'a str>,
}

#[derive(Serialize)]
struct SessionAuthenticateRequest<'a> {
    session_token: &'a str,
    session_duration_minutes: u32,
}

#[derive(Deserialize)]
struct SessionResponse {
    session_token: SessionToken,
    user: User,
}

#[derive(Serialize)]
struct UpdateUserRequest<'a> {
    trusted_metadata: &'a TrustedMetadata,
}

impl From<SessionResponse> for AuthenticatedSession {
    fn from(r: SessionResponse) -> Self {
        Self {
            session_token: r.session_token,
            user: r.user,
        }
    }
}

impl HttpIdentityGateway {
    /// Create a gateway client with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.config.api_url.join(path).map_err(Into::into)
    }

    async fn post<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
        operation: &'static str,
    ) -> Result<T, Error> {
        let response = self
            .http
            .post(self.endpoint(path)?)
            .basic_auth(&self.config.project_id, Some(&self.config.secret))
            .json(body)
            .send()
            .await?;

        let response = Self::ensure_success(response, operation).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Provider {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

impl IdentityGateway for HttpIdentityGateway {
    async fn request_link(&self, email: &str) -> Result<LinkRequested, Error> {
        let link_url = self.config.magic_link_url.as_str();
        let body = LoginOrCreateRequest {
            email,
            login_magic_link_url: link_url,
            signup_magic_link_url: link_url,
        };
        let response: LoginOrCreateResponse = self
            .post("magic_links/email/login_or_create", &body, "magic link request")
            .await?;

        Ok(LinkRequested {
            user_id: response.user_id,
            user_created: response.user_created,
        })
    }

    async fn exchange_link(
        &self,
        token: &str,
        existing: Option<&SessionToken>,
    ) -> Result<AuthenticatedSession, Error> {
        let body = MagicLinkAuthenticateRequest {
            token,
            session_duration_minutes: self.config.session_duration_minutes,
            session_token: existing.map(SessionToken::expose),
        };
        self.post::<_, SessionResponse>(
            "magic_links/authenticate",
            &body,
            "magic link authenticate",
        )
        .await
        .map(Into::into)
    }

    async fn validate(&self, session: &SessionToken) -> Result<AuthenticatedSession, Error> {
        let body = SessionAuthenticateRequest {
            session_token: session.expose(),
            session_duration_minutes: self.config.session_duration_minutes,
        };
        self.post::<_, SessionResponse>("sessions/authenticate", &body, "session authenticate")
            .await
            .map(Into::into)
    }

    async fn update_trusted_metadata(
        &self,
        user_id: &UserId,
        metadata: &TrustedMetadata,
    ) -> Result<(), Error> {
        let path = format!("users/{}", urlencoding::encode(user_id.as_str()));
        let response = self
            .http
            .put(self.endpoint(&path)?)
            .basic_auth(&self.config.project_id, Some(&self.config.secret))
            .json(&UpdateUserRequest {
                trusted_metadata: metadata,
            })
            .send()
            .await?;

        Self::ensure_success(response, "user update").await?;
        Ok(())
    }
}
