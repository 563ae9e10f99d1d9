use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::authz::{
    AuthorizationQuery, DecisionSet, Effect, PolicyEngine, PolicyError, Principal,
    ResourceAction, ResourceDecision,
};
use crate::error::Error;
use crate::gateway::{DEFAULT_TIMEOUT, with_trailing_slash};
use crate::request_id::generate_request_id;

/// Policy engine endpoint configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct PolicyConfig {
    pub(crate) base_url: Url,
    pub(crate) timeout: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3592/".parse().expect("valid default URL"),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PolicyConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self::default().with_base_url(base_url)
    }

    #[must_use]
    pub fn with_base_url(mut self, url: Url) -> Self {
        self.base_url = with_trailing_slash(url);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Client for the Cerbos `check/resources` JSON API.
pub struct HttpPolicyEngine {
    config: PolicyConfig,
    http: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckResourcesRequest<'a> {
    request_id: String,
    principal: &'a Principal,
    resources: &'a [ResourceAction],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckResourcesResponse {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    results: Vec<CheckResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckResult {
    resource: ResourceRef,
    #[serde(default)]
    actions: BTreeMap<String, Effect>,
    #[serde(default)]
    validation_errors: Vec<ValidationError>,
}

#[derive(Deserialize)]
struct ResourceRef {
    id: String,
    #[serde(default)]
    kind: String,
}

#[derive(Deserialize)]
struct ValidationError {
    #[serde(default)]
    path: String,
    #[serde(default)]
    message: String,
}

impl From<CheckResourcesResponse> for DecisionSet {
    fn from(r: CheckResourcesResponse) -> Self {
        Self {
            request_id: r.request_id,
            results: r
                .results
                .into_iter()
                .map(|result| ResourceDecision {
                    resource_id: result.resource.id,
                    kind: result.resource.kind,
                    actions: result.actions,
                    validation_errors: result
                        .validation_errors
                        .into_iter()
                        .map(|e| format!("{}: {}", e.path, e.message))
                        .collect(),
                })
                .collect(),
        }
    }
}

impl HttpPolicyEngine {
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: PolicyConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    fn check_url(&self) -> Result<Url, PolicyError> {
        self.config
            .base_url
            .join("api/check/resources")
            .map_err(|e| PolicyError::Unreachable(e.to_string()))
    }
}

impl PolicyEngine for HttpPolicyEngine {
    async fn check(&self, query: &AuthorizationQuery) -> Result<DecisionSet, PolicyError> {
        let body = CheckResourcesRequest {
            request_id: generate_request_id(),
            principal: &query.principal,
            resources: &query.resource_actions,
        };

        let response = self
            .http
            .post(self.check_url()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| PolicyError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            return Err(PolicyError::Engine { status, detail });
        }

        response
            .json::<CheckResourcesResponse>()
            .await
            .map(Into::into)
            .map_err(|e| PolicyError::Decode(e.to_string()))
    }
}
