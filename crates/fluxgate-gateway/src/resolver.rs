// crates/fluxgate-gateway/src/resolver.rs
// ============================================================================
// Module: HTTP Publish-Config Resolver
// Description: Remote device-key resolution over HTTP.
// Purpose: Turn a device key into a publish configuration in one round-trip.
// Dependencies: fluxgate-core, fluxgate-config, reqwest, url
// ============================================================================

//! ## Overview
//! [`HttpPublishConfigResolver`] POSTs `{"key": "..."}` to the things
//! service and decodes the returned [`PublishConfig`]. Refusals (401, 403,
//! 404) become [`ResolverError::InvalidKey`]; every other failure becomes
//! [`ResolverError::Unavailable`].
//!
//! Security posture: the key travels only in the request body. Error
//! messages carry status codes and transport errors, never the key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use fluxgate_config::ResolverConfig;
use fluxgate_core::PublishConfig;
use fluxgate_core::PublishConfigResolver;
use fluxgate_core::ResolverError;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde::Serialize;
use url::Url;

/// Resolution endpoint, relative to the configured base URL.
pub const RESOLVE_PATH: &str = "/v1/publish-config";

/// Resolution request body.
#[derive(Serialize)]
struct ResolveRequest<'a> {
    /// Device key.
    key: &'a str,
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// HTTP-backed publish-config resolver.
///
/// # Invariants
/// - `endpoint` is an absolute http(s) URL ending in [`RESOLVE_PATH`].
pub struct HttpPublishConfigResolver {
    /// Resolution endpoint.
    endpoint: Url,
    /// Optional bearer token for the things service.
    auth_token: Option<String>,
    /// HTTP client configured with timeouts.
    client: Client,
}

impl HttpPublishConfigResolver {
    /// Builds a resolver against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Unavailable`] when the URL is not http(s) or
    /// the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ResolverError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let endpoint = Url::parse(&format!("{trimmed}{RESOLVE_PATH}"))
            .map_err(|err| ResolverError::Unavailable(format!("invalid resolver url: {err}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ResolverError::Unavailable(
                "resolver url must use http or https".to_string(),
            ));
        }
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|err| ResolverError::Unavailable(err.to_string()))?;
        Ok(Self {
            endpoint,
            auth_token,
            client,
        })
    }

    /// Builds a resolver from the `[gateway.resolver]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError::Unavailable`] when the client cannot be built.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, ResolverError> {
        Self::new(
            &config.base_url,
            config.auth_token.clone(),
            config.connect_timeout(),
            config.request_timeout(),
        )
    }

    /// Returns the resolution endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Builds request headers.
    fn build_headers(&self) -> Result<HeaderMap, ResolverError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ResolverError::Unavailable("invalid resolver auth token".to_string())
            })?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl PublishConfigResolver for HttpPublishConfigResolver {
    async fn resolve_by_key(&self, key: &str) -> Result<PublishConfig, ResolverError> {
        let headers = self.build_headers()?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(headers)
            .json(&ResolveRequest {
                key,
            })
            .send()
            .await
            .map_err(|err| ResolverError::Unavailable(err.without_url().to_string()))?;
        match response.status() {
            StatusCode::OK => response.json::<PublishConfig>().await.map_err(|_| {
                ResolverError::Unavailable("resolver returned an undecodable body".to_string())
            }),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(ResolverError::InvalidKey)
            }
            status => Err(ResolverError::Unavailable(format!("resolver error: status {status}"))),
        }
    }
}
