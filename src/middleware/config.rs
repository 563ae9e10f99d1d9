use std::str::FromStr;
use std::time::Duration;

use axum_extra::extract::cookie::Key;
use url::Url;

use super::error::ConfigError;
use crate::authz::QueryProfile;
use crate::gate::PolicyFailureMode;
use crate::gateway::{GatewayConfig, HttpIdentityGateway};
use crate::policy::{HttpPolicyEngine, PolicyConfig};

const DEFAULT_MAGIC_LINK_URL: &str = "http://localhost:3000/callback";

/// Shared web settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct WebSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) error_cookie_name: String,
    pub(crate) session_ttl_minutes: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) profile: QueryProfile,
    pub(crate) failure_mode: PolicyFailureMode,
}

impl WebSettings {
    pub(crate) fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__linkgate_session".into(),
            error_cookie_name: "__linkgate_error".into(),
            session_ttl_minutes: 60,
            secure_cookies: true,
            profile: QueryProfile::default(),
            failure_mode: PolicyFailureMode::default(),
        }
    }
}

/// Gate configuration.
///
/// The identity gateway and policy engine are constructor parameters.
///
/// Use [`from_env()`](GateConfig::from_env) for the HTTP clients configured
/// from the environment, or [`new()`](GateConfig::new) with `with_*` methods
/// for full control.
pub struct GateConfig<I = HttpIdentityGateway, P = HttpPolicyEngine> {
    pub(super) identity: I,
    pub(super) policy: P,
    pub(super) settings: WebSettings,
}

impl<I, P> GateConfig<I, P> {
    #[must_use]
    pub fn new(identity: I, policy: P) -> Self {
        Self {
            identity,
            policy,
            settings: WebSettings::defaults(),
        }
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_error_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.error_cookie_name = name.into();
        self
    }

    /// Max-Age of the session cookie. Match it to the identity session lifetime.
    #[must_use]
    pub fn with_session_ttl_minutes(mut self, minutes: i64) -> Self {
        self.settings.session_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Policy version, principal attributes and actions used for every query.
    #[must_use]
    pub fn with_profile(mut self, profile: QueryProfile) -> Self {
        self.settings.profile = profile;
        self
    }

    #[must_use]
    pub fn with_policy_version(mut self, version: impl Into<String>) -> Self {
        self.settings.profile.policy_version = version.into();
        self
    }

    #[must_use]
    pub fn with_failure_mode(mut self, mode: PolicyFailureMode) -> Self {
        self.settings.failure_mode = mode;
        self
    }
}

impl GateConfig {
    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `IDENTITY_PROJECT_ID`: identity service project id
    /// - `IDENTITY_SECRET`: identity service secret
    ///
    /// # Optional env vars
    /// - `IDENTITY_API_URL`: identity API base URL
    /// - `MAGIC_LINK_URL`: link target (default `http://localhost:3000/callback`)
    /// - `SESSION_DURATION_MINUTES`: session lifetime (default 60)
    /// - `POLICY_ENGINE_URL`: policy engine base URL (default `http://localhost:3592`)
    /// - `POLICY_VERSION`: policy version sent with every principal
    /// - `HTTP_TIMEOUT_SECS`: timeout for identity and policy calls
    /// - `POLICY_FAILURE_MODE`: `reauth` (default) or `degrade`
    /// - `DEV_AUTH`: Set to `"1"` or `"true"` to disable secure cookies
    /// - `COOKIE_KEY`: Cookie encryption key bytes
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if required env vars are missing, a value does
    /// not parse, or an HTTP client cannot be built.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let project_id =
            lookup("IDENTITY_PROJECT_ID").ok_or(ConfigError::Missing("IDENTITY_PROJECT_ID"))?;
        let secret = lookup("IDENTITY_SECRET").ok_or(ConfigError::Missing("IDENTITY_SECRET"))?;
        let magic_link_url = match parse_var::<Url>(&lookup, "MAGIC_LINK_URL")? {
            Some(url) => url,
            None => DEFAULT_MAGIC_LINK_URL
                .parse()
                .map_err(|e| invalid("MAGIC_LINK_URL", e))?,
        };

        let mut gateway = GatewayConfig::new(project_id, secret, magic_link_url);
        let mut policy = PolicyConfig::default();

        if let Some(url) = parse_var::<Url>(&lookup, "IDENTITY_API_URL")? {
            gateway = gateway.with_api_url(url);
        }
        if let Some(minutes) = parse_var::<u32>(&lookup, "SESSION_DURATION_MINUTES")? {
            gateway = gateway.with_session_duration_minutes(minutes);
        }
        if let Some(url) = parse_var::<Url>(&lookup, "POLICY_ENGINE_URL")? {
            policy = policy.with_base_url(url);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "HTTP_TIMEOUT_SECS")? {
            let timeout = Duration::from_secs(secs);
            gateway = gateway.with_timeout(timeout);
            policy = policy.with_timeout(timeout);
        }

        let failure_mode = match lookup("POLICY_FAILURE_MODE").as_deref() {
            None | Some("reauth") => PolicyFailureMode::ForceReauth,
            Some("degrade") => PolicyFailureMode::Degrade,
            Some(other) => {
                return Err(invalid(
                    "POLICY_FAILURE_MODE",
                    format!("expected `reauth` or `degrade`, got `{other}`"),
                ));
            }
        };

        let dev_auth = matches!(lookup("DEV_AUTH").as_deref(), Some("1") | Some("true"));

        let cookie_key = match lookup("COOKIE_KEY") {
            Some(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                invalid(
                    "COOKIE_KEY",
                    "must be at least 64 bytes. Remove the env var to use an ephemeral key.",
                )
            })?,
            None => {
                tracing::warn!("COOKIE_KEY not set, sessions will not survive a restart");
                Key::generate()
            }
        };

        let session_ttl = i64::from(gateway.session_duration_minutes());
        let identity = HttpIdentityGateway::new(gateway)?;
        let policy = HttpPolicyEngine::new(policy)?;
        let mut config = Self::new(identity, policy)
            .with_cookie_key(cookie_key)
            .with_session_ttl_minutes(session_ttl)
            .with_secure_cookies(!dev_auth)
            .with_failure_mode(failure_mode);

        if let Some(version) = lookup("POLICY_VERSION") {
            config = config.with_policy_version(version);
        }
        Ok(config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&'static str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(name)
        .map(|raw| raw.trim().parse::<T>().map_err(|e| invalid(name, e)))
        .transpose()
}

fn invalid(var: &'static str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.to_string(),
    }
}
