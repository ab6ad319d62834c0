// crates/fluxgate-config/src/config.rs
// ============================================================================
// Module: Fluxgate Configuration
// Description: Configuration loading and validation for Fluxgate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: fluxgate-core, fluxgate-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has defaults, so an empty file yields a working in-memory
//! deployment with caching on and no global admin. Missing or invalid values
//! fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;

use fluxgate_core::Identity;
use fluxgate_core::MemberId;
use fluxgate_core::StaticIdentityProvider;
use fluxgate_store_sqlite::SqliteStoreConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "fluxgate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FLUXGATE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of static identity entries.
pub const MAX_IDENTITY_ENTRIES: usize = 1024;
/// Maximum length of a static identity token.
pub const MAX_IDENTITY_TOKEN_LENGTH: usize = 256;
/// Maximum length of a member identifier.
pub const MAX_MEMBER_ID_LENGTH: usize = 256;
/// Default deadline for each external call (ms).
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 2_000;
/// Minimum external call deadline (ms).
pub const MIN_CALL_TIMEOUT_MS: u64 = 10;
/// Maximum external call deadline (ms).
pub const MAX_CALL_TIMEOUT_MS: u64 = 60_000;
/// Default resolver connect timeout (ms).
const DEFAULT_RESOLVER_CONNECT_TIMEOUT_MS: u64 = 500;
/// Default resolver request timeout (ms).
const DEFAULT_RESOLVER_REQUEST_TIMEOUT_MS: u64 = 2_000;
/// Minimum resolver connect timeout (ms).
const MIN_RESOLVER_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum resolver connect timeout (ms).
const MAX_RESOLVER_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Minimum resolver request timeout (ms).
const MIN_RESOLVER_REQUEST_TIMEOUT_MS: u64 = 100;
/// Maximum resolver request timeout (ms).
const MAX_RESOLVER_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// Default subscriber limit per topic.
pub const DEFAULT_MAX_SUBSCRIPTIONS_PER_TOPIC: usize = 1_024;
/// Hard upper bound for the subscriber limit per topic.
pub const MAX_SUBSCRIPTIONS_PER_TOPIC: usize = 65_536;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Fluxgate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FluxgateConfig {
    /// Decision engine configuration.
    #[serde(default)]
    pub authz: AuthzConfig,
    /// Membership cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Optional `SQLite` tenancy store; in-memory repositories when absent.
    #[serde(default)]
    pub store: Option<SqliteStoreConfig>,
    /// Protocol gateway configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Static identity table.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Optional config source metadata (not serialized).
    #[serde(skip)]
    pub source_modified_at: Option<SystemTime>,
}

impl FluxgateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml_str(content)?;
        config.source_modified_at = fs::metadata(&resolved).and_then(|meta| meta.modified()).ok();
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.authz.validate()?;
        if let Some(store) = &self.store {
            store.validate().map_err(|err| ConfigError::Invalid(format!("store: {err}")))?;
        }
        self.gateway.validate()?;
        self.identity.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Authz
// ============================================================================

/// Decision engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthzConfig {
    /// Global-admin principal; bypasses every check when set.
    #[serde(default)]
    pub admin_member_id: Option<String>,
    /// Deadline for each identity, cache, and repository call (ms).
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Grants organization owners every action on the org's groups.
    #[serde(default = "default_true")]
    pub org_owner_bypass: bool,
    /// Decision audit configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            admin_member_id: None,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            org_owner_bypass: true,
            audit: AuditConfig::default(),
        }
    }
}

impl AuthzConfig {
    /// Returns the configured global admin as a member id.
    #[must_use]
    pub fn admin_member(&self) -> Option<MemberId> {
        self.admin_member_id.as_deref().map(MemberId::new)
    }

    /// Returns the external call deadline.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Validates authz configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(admin) = &self.admin_member_id {
            validate_member_id("authz.admin_member_id", admin)?;
        }
        validate_timeout_range(
            "authz.call_timeout_ms",
            self.call_timeout_ms,
            MIN_CALL_TIMEOUT_MS,
            MAX_CALL_TIMEOUT_MS,
        )?;
        self.audit.validate("authz.audit")
    }
}

/// Audit sink configuration shared by the engine and the gateway.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Whether audit events are emitted.
    #[serde(default)]
    pub enabled: bool,
    /// Optional JSON-lines file; stderr when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string(&format!("{field}.path"), &path.to_string_lossy())?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Membership cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Enables the in-memory membership caches; disabled always misses.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
        }
    }
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Protocol gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Remote publish-config resolver; required to run the gateway.
    #[serde(default)]
    pub resolver: Option<ResolverConfig>,
    /// Deadline for each resolver and broker call (ms).
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Subscriber limit per topic in the in-memory broker.
    #[serde(default = "default_max_subscriptions_per_topic")]
    pub max_subscriptions_per_topic: usize,
    /// Gateway audit configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            resolver: None,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            max_subscriptions_per_topic: DEFAULT_MAX_SUBSCRIPTIONS_PER_TOPIC,
            audit: AuditConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Returns the gateway call deadline.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Validates gateway configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_range(
            "gateway.call_timeout_ms",
            self.call_timeout_ms,
            MIN_CALL_TIMEOUT_MS,
            MAX_CALL_TIMEOUT_MS,
        )?;
        if self.max_subscriptions_per_topic == 0
            || self.max_subscriptions_per_topic > MAX_SUBSCRIPTIONS_PER_TOPIC
        {
            return Err(ConfigError::Invalid(format!(
                "gateway.max_subscriptions_per_topic must be between 1 and \
                 {MAX_SUBSCRIPTIONS_PER_TOPIC}"
            )));
        }
        if let Some(resolver) = &self.resolver {
            resolver.validate()?;
        }
        self.audit.validate("gateway.audit")
    }
}

/// Remote publish-config resolver configuration.
#[derive(Clone, Deserialize)]
pub struct ResolverConfig {
    /// Resolver endpoint (http or https).
    pub base_url: String,
    /// Optional bearer token for resolver requests.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_resolver_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds.
    #[serde(default = "default_resolver_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl fmt::Debug for ResolverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl ResolverConfig {
    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates resolver configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let trimmed = self.base_url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Invalid("gateway.resolver.base_url is required".to_string()));
        }
        let url = Url::parse(trimmed)
            .map_err(|_| ConfigError::Invalid("gateway.resolver.base_url is invalid".to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(
                "gateway.resolver.base_url must include http:// or https://".to_string(),
            ));
        }
        if url.host_str().is_none() {
            return Err(ConfigError::Invalid(
                "gateway.resolver.base_url must include a host".to_string(),
            ));
        }
        if let Some(token) = &self.auth_token
            && token.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "gateway.resolver.auth_token must be non-empty".to_string(),
            ));
        }
        validate_timeout_range(
            "gateway.resolver.connect_timeout_ms",
            self.connect_timeout_ms,
            MIN_RESOLVER_CONNECT_TIMEOUT_MS,
            MAX_RESOLVER_CONNECT_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            "gateway.resolver.request_timeout_ms",
            self.request_timeout_ms,
            MIN_RESOLVER_REQUEST_TIMEOUT_MS,
            MAX_RESOLVER_REQUEST_TIMEOUT_MS,
        )?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Static identity table for local deployments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityConfig {
    /// Token bindings.
    #[serde(default)]
    pub entries: Vec<IdentityEntry>,
}

/// One token binding.
///
/// # Invariants
/// - `Debug` output never includes the token.
#[derive(Clone, Deserialize)]
pub struct IdentityEntry {
    /// Bearer token presented by the caller.
    pub token: String,
    /// Member the token resolves to.
    pub member_id: String,
    /// Contact email (informational).
    #[serde(default)]
    pub email: String,
}

impl fmt::Debug for IdentityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityEntry")
            .field("token", &"<redacted>")
            .field("member_id", &self.member_id)
            .field("email", &self.email)
            .finish()
    }
}

impl IdentityConfig {
    /// Builds the identity provider for the configured table.
    #[must_use]
    pub fn build_provider(&self) -> StaticIdentityProvider {
        StaticIdentityProvider::new(self.entries.iter().map(|entry| {
            (
                entry.token.clone(),
                Identity {
                    id: MemberId::new(entry.member_id.clone()),
                    email: entry.email.clone(),
                },
            )
        }))
    }

    /// Validates the identity table.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.entries.len() > MAX_IDENTITY_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "identity.entries exceeds max of {MAX_IDENTITY_ENTRIES}"
            )));
        }
        let mut seen = BTreeSet::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.token.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "identity.entries[{index}].token must be non-empty"
                )));
            }
            if entry.token.len() > MAX_IDENTITY_TOKEN_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "identity.entries[{index}].token exceeds {MAX_IDENTITY_TOKEN_LENGTH} bytes"
                )));
            }
            if !seen.insert(entry.token.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "identity.entries[{index}].token is duplicated"
                )));
            }
            validate_member_id(&format!("identity.entries[{index}].member_id"), &entry.member_id)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a member identifier field.
fn validate_member_id(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_MEMBER_ID_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "{field} exceeds {MAX_MEMBER_ID_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Validates a timeout value against bounds.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Serde default for enabled-by-default flags.
const fn default_true() -> bool {
    true
}

/// Default external call deadline in milliseconds.
const fn default_call_timeout_ms() -> u64 {
    DEFAULT_CALL_TIMEOUT_MS
}

/// Default subscriber limit per topic.
const fn default_max_subscriptions_per_topic() -> usize {
    DEFAULT_MAX_SUBSCRIPTIONS_PER_TOPIC
}

/// Default resolver connect timeout in milliseconds.
const fn default_resolver_connect_timeout_ms() -> u64 {
    DEFAULT_RESOLVER_CONNECT_TIMEOUT_MS
}

/// Default resolver request timeout in milliseconds.
const fn default_resolver_request_timeout_ms() -> u64 {
    DEFAULT_RESOLVER_REQUEST_TIMEOUT_MS
}
