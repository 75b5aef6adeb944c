//! Client configuration.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::cache::CacheConfig;
use crate::error::ConfigError;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default contract-based endpoint name.
pub const DEFAULT_ENDPOINT: &str = "Default";

/// Connection settings for an [`AcumaticaClient`](crate::AcumaticaClient).
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub username: String,
    pub password: String,
    pub tenant: String,
    pub branch: Option<String>,
    pub locale: Option<String>,
    pub endpoint_name: String,
    /// Pinned endpoint version; the latest advertised version when `None`.
    pub endpoint_version: Option<String>,
    pub timeout: Duration,
    /// Reject servers whose TLS certificate does not validate.
    pub verify_ssl: bool,
    /// Keep one session for the client's lifetime instead of logging in
    /// and out around every request.
    pub persistent_login: bool,
    /// Log in again and retry once when a request comes back 401.
    pub retry_on_idle_logout: bool,
    /// Discover generic inquiries from the OData `$metadata` document.
    pub inquiries: bool,
    pub cache: CacheConfig,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tenant", &self.tenant)
            .field("branch", &self.branch)
            .field("locale", &self.locale)
            .field("endpoint_name", &self.endpoint_name)
            .field("endpoint_version", &self.endpoint_version)
            .field("timeout", &self.timeout)
            .field("verify_ssl", &self.verify_ssl)
            .field("persistent_login", &self.persistent_login)
            .field("retry_on_idle_logout", &self.retry_on_idle_logout)
            .field("inquiries", &self.inquiries)
            .field("cache", &self.cache)
            .finish()
    }
}

impl ClientConfig {
    /// Starts a builder with the four required settings.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use acumatica_client::ClientConfig;
    ///
    /// let config = ClientConfig::builder("https://erp.example.com", "admin", "secret", "Company")
    ///     .endpoint_version("24.200.001")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.endpoint_name, "Default");
    /// ```
    pub fn builder(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        tenant: impl Into<String>,
    ) -> ClientConfigBuilder {
        ClientConfigBuilder {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            tenant: tenant.into(),
            branch: None,
            locale: None,
            endpoint_name: DEFAULT_ENDPOINT.to_string(),
            endpoint_version: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verify_ssl: true,
            persistent_login: true,
            retry_on_idle_logout: true,
            inquiries: true,
            cache: CacheConfig::default(),
        }
    }

    /// Reads configuration from `ACUMATICA_*` environment variables.
    ///
    /// Required: `ACUMATICA_URL`, `ACUMATICA_USERNAME`, `ACUMATICA_PASSWORD`,
    /// `ACUMATICA_TENANT`. Optional: `ACUMATICA_BRANCH`, `ACUMATICA_LOCALE`,
    /// `ACUMATICA_ENDPOINT`, `ACUMATICA_ENDPOINT_VERSION`,
    /// `ACUMATICA_VERIFY_SSL`, `ACUMATICA_CACHE_DIR`,
    /// `ACUMATICA_CACHE_TTL_HOURS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str, field: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::missing_field(field))
        };

        let mut builder = Self::builder(
            required("ACUMATICA_URL", "base_url")?,
            required("ACUMATICA_USERNAME", "username")?,
            required("ACUMATICA_PASSWORD", "password")?,
            required("ACUMATICA_TENANT", "tenant")?,
        );

        if let Some(branch) = lookup("ACUMATICA_BRANCH") {
            builder = builder.branch(branch);
        }
        if let Some(locale) = lookup("ACUMATICA_LOCALE") {
            builder = builder.locale(locale);
        }
        if let Some(endpoint) = lookup("ACUMATICA_ENDPOINT") {
            builder = builder.endpoint_name(endpoint);
        }
        if let Some(version) = lookup("ACUMATICA_ENDPOINT_VERSION") {
            builder = builder.endpoint_version(version);
        }
        if let Some(verify) = lookup("ACUMATICA_VERIFY_SSL") {
            let verify = match verify.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(ConfigError::invalid_value("ACUMATICA_VERIFY_SSL", &verify)),
            };
            builder = builder.verify_ssl(verify);
        }

        let mut cache = CacheConfig::default();
        if let Some(dir) = lookup("ACUMATICA_CACHE_DIR") {
            cache.dir = Some(dir.into());
        }
        if let Some(hours) = lookup("ACUMATICA_CACHE_TTL_HOURS") {
            let hours: u64 = hours
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_value("ACUMATICA_CACHE_TTL_HOURS", &hours))?;
            cache.ttl = Duration::from_secs(hours * 3600);
        }

        builder.cache(cache).build()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    base_url: String,
    username: String,
    password: String,
    tenant: String,
    branch: Option<String>,
    locale: Option<String>,
    endpoint_name: String,
    endpoint_version: Option<String>,
    timeout: Duration,
    verify_ssl: bool,
    persistent_login: bool,
    retry_on_idle_logout: bool,
    inquiries: bool,
    cache: CacheConfig,
}

impl ClientConfigBuilder {
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn endpoint_name(mut self, name: impl Into<String>) -> Self {
        self.endpoint_name = name.into();
        self
    }

    pub fn endpoint_version(mut self, version: impl Into<String>) -> Self {
        self.endpoint_version = Some(version.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set to `false` to accept self-signed or otherwise invalid
    /// certificates, as on development instances.
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    pub fn persistent_login(mut self, persistent: bool) -> Self {
        self.persistent_login = persistent;
        self
    }

    pub fn retry_on_idle_logout(mut self, retry: bool) -> Self {
        self.retry_on_idle_logout = retry;
        self
    }

    pub fn inquiries(mut self, enabled: bool) -> Self {
        self.inquiries = enabled;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// ## Errors
    ///
    /// Returns an error if the base URL does not parse or a required
    /// setting is empty.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        for (value, field) in [
            (&self.username, "username"),
            (&self.tenant, "tenant"),
            (&self.endpoint_name, "endpoint_name"),
        ] {
            if value.is_empty() {
                return Err(ConfigError::missing_field(field));
            }
        }
        let base_url = Url::parse(self.base_url.trim_end_matches('/'))?;

        Ok(ClientConfig {
            base_url,
            username: self.username,
            password: self.password,
            tenant: self.tenant,
            branch: self.branch,
            locale: self.locale,
            endpoint_name: self.endpoint_name,
            endpoint_version: self.endpoint_version,
            timeout: self.timeout,
            verify_ssl: self.verify_ssl,
            persistent_login: self.persistent_login,
            retry_on_idle_logout: self.retry_on_idle_logout,
            inquiries: self.inquiries,
            cache: self.cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("ACUMATICA_URL", "https://erp.example.com/"),
        ("ACUMATICA_USERNAME", "admin"),
        ("ACUMATICA_PASSWORD", "secret"),
        ("ACUMATICA_TENANT", "Company"),
    ];

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfig::builder("https://erp.example.com", "u", "p", "t")
            .build()
            .unwrap();
        assert_eq!(config.endpoint_name, "Default");
        assert_eq!(config.endpoint_version, None);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.verify_ssl);
        assert!(config.persistent_login);
        assert!(config.retry_on_idle_logout);
        assert!(config.inquiries);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_invalid_url() {
        let err = ClientConfig::builder("not a url", "u", "p", "t").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn test_empty_tenant_rejected() {
        let err = ClientConfig::builder("https://erp.example.com", "u", "p", "")
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: tenant");
    }

    #[test]
    fn test_from_lookup_required_and_optional() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ACUMATICA_ENDPOINT_VERSION", "24.200.001"));
        pairs.push(("ACUMATICA_BRANCH", "HQ"));
        pairs.push(("ACUMATICA_CACHE_TTL_HOURS", "2"));
        pairs.push(("ACUMATICA_CACHE_DIR", "/tmp/acu-cache"));
        let config = ClientConfig::from_lookup(env(&pairs)).unwrap();

        assert_eq!(config.base_url.as_str(), "https://erp.example.com/");
        assert_eq!(config.endpoint_version.as_deref(), Some("24.200.001"));
        assert_eq!(config.branch.as_deref(), Some("HQ"));
        assert_eq!(config.cache.ttl, Duration::from_secs(7200));
        assert_eq!(config.cache.dir.as_deref(), Some(std::path::Path::new("/tmp/acu-cache")));
    }

    #[test]
    fn test_from_lookup_missing_password() {
        let pairs: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(k, _)| *k != "ACUMATICA_PASSWORD")
            .collect();
        let err = ClientConfig::from_lookup(env(&pairs)).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: password");
    }

    #[test]
    fn test_from_lookup_verify_ssl() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ACUMATICA_VERIFY_SSL", "False"));
        let config = ClientConfig::from_lookup(env(&pairs)).unwrap();
        assert!(!config.verify_ssl);

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ACUMATICA_VERIFY_SSL", "maybe"));
        let err = ClientConfig::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_from_lookup_bad_ttl() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ACUMATICA_CACHE_TTL_HOURS", "soon"));
        let err = ClientConfig::from_lookup(env(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ClientConfig::builder("https://erp.example.com", "u", "hunter2", "t")
            .build()
            .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
