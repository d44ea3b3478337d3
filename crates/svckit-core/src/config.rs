//! Configuration types for svckit
//!
//! Every integration takes one of these structs. Zero or empty fields are
//! filled with defaults before the vendor call is made, and `validate()`
//! rejects configurations the vendor would refuse anyway.
//!
//! Structs carrying secrets implement `Debug` by hand so that keys, tokens
//! and passwords are printed as `<REDACTED>`.

use serde::{Deserialize, Serialize};

const REDACTED: &str = "<REDACTED>";

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { REDACTED }
}

fn redact_opt(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| REDACTED)
}

/// A `host:port` pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port` form
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self, what: &str) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config(format!("{} host cannot be empty", what)));
        }
        if self.port == 0 {
            return Err(crate::Error::config(format!("{} port must be > 0", what)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Consul
// ---------------------------------------------------------------------------

/// Service registration configuration (Consul)
#[derive(Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Service name as it appears in the catalog
    pub name: String,

    /// Service tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Health-check timeout (in seconds)
    #[serde(default = "default_check_timeout_secs")]
    pub timeout_secs: u64,

    /// Health-check interval (in seconds)
    #[serde(default = "default_check_interval_secs")]
    pub interval_secs: u64,

    /// Deregister the instance after its check stays critical this long
    /// (in seconds). 0 leaves the instance registered indefinitely.
    #[serde(default = "default_deregister_after_secs")]
    pub deregister_critical_service_after_secs: u64,

    /// Health-check route on the instance (e.g. "health")
    #[serde(default)]
    pub check_route: String,

    /// Whether the health check uses https
    #[serde(default)]
    pub is_ssl: bool,

    /// Consul agent address
    pub consul: Endpoint,

    /// Address the registered instance listens on
    pub project: Endpoint,

    /// Consul ACL token
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for RegistrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationConfig")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .field("timeout_secs", &self.timeout_secs)
            .field("interval_secs", &self.interval_secs)
            .field(
                "deregister_critical_service_after_secs",
                &self.deregister_critical_service_after_secs,
            )
            .field("check_route", &self.check_route)
            .field("is_ssl", &self.is_ssl)
            .field("consul", &self.consul)
            .field("project", &self.project)
            .field("token", &redact_opt(&self.token))
            .finish()
    }
}

impl RegistrationConfig {
    /// Create a registration config with default check timings
    pub fn new(name: impl Into<String>, consul: Endpoint, project: Endpoint) -> Self {
        Self {
            name: name.into(),
            tags: Vec::new(),
            timeout_secs: default_check_timeout_secs(),
            interval_secs: default_check_interval_secs(),
            deregister_critical_service_after_secs: default_deregister_after_secs(),
            check_route: String::new(),
            is_ssl: false,
            consul,
            project,
            token: None,
        }
    }

    /// Set the service tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the health-check route
    pub fn with_check_route(mut self, route: impl Into<String>) -> Self {
        self.check_route = route.into();
        self
    }

    /// Use https for the health check
    pub fn with_ssl(mut self, is_ssl: bool) -> Self {
        self.is_ssl = is_ssl;
        self
    }

    /// Set the ACL token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Scheme used for the health-check URL
    pub fn scheme(&self) -> &'static str {
        if self.is_ssl { "https" } else { "http" }
    }

    /// The URL the registry polls to check the instance
    ///
    /// `{scheme}://{project.host}:{project.port}/{check_route}`
    pub fn health_check_url(&self) -> String {
        format!(
            "{}://{}/{}",
            self.scheme(),
            self.project.address(),
            self.check_route.trim_start_matches('/')
        )
    }

    /// Validate the registration configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.is_empty() {
            return Err(crate::Error::config("Service name cannot be empty"));
        }
        self.consul.validate("Consul")?;
        self.project.validate("Service")?;
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Health-check interval must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Health-check timeout must be > 0"));
        }
        Ok(())
    }
}

fn default_check_timeout_secs() -> u64 {
    5
}

fn default_check_interval_secs() -> u64 {
    10
}

fn default_deregister_after_secs() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Nacos
// ---------------------------------------------------------------------------

/// Group used when none is configured
pub const DEFAULT_NACOS_GROUP: &str = "DEFAULT_GROUP";

/// Dynamic configuration client settings (Nacos)
#[derive(Clone, Serialize, Deserialize)]
pub struct NacosConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Namespace (tenant). Empty selects the public namespace.
    #[serde(default)]
    pub namespace_id: String,

    /// Config data id
    pub data_id: String,

    /// Config group
    #[serde(default)]
    pub group: String,

    /// Do not fall back to the local snapshot when the server is unreachable
    #[serde(default)]
    pub not_load_cache_at_start: bool,

    /// Directory for config snapshots. Empty disables snapshots.
    #[serde(default)]
    pub cache_dir: String,

    /// Request timeout (in milliseconds)
    #[serde(default)]
    pub timeout_ms: u64,

    /// Long-poll hold time requested from the server (in milliseconds)
    #[serde(default)]
    pub long_poll_timeout_ms: u64,

    /// Server context path
    #[serde(default)]
    pub context_path: String,

    /// Username for servers with auth enabled
    #[serde(default)]
    pub username: Option<String>,

    /// Password for servers with auth enabled
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for NacosConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NacosConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("namespace_id", &self.namespace_id)
            .field("data_id", &self.data_id)
            .field("group", &self.group)
            .field("not_load_cache_at_start", &self.not_load_cache_at_start)
            .field("cache_dir", &self.cache_dir)
            .field("timeout_ms", &self.timeout_ms)
            .field("long_poll_timeout_ms", &self.long_poll_timeout_ms)
            .field("context_path", &self.context_path)
            .field("username", &self.username)
            .field("password", &redact_opt(&self.password))
            .finish()
    }
}

impl NacosConfig {
    /// Create a config with every optional field at its zero value
    pub fn new(host: impl Into<String>, port: u16, data_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            namespace_id: String::new(),
            data_id: data_id.into(),
            group: String::new(),
            not_load_cache_at_start: false,
            cache_dir: String::new(),
            timeout_ms: 0,
            long_poll_timeout_ms: 0,
            context_path: String::new(),
            username: None,
            password: None,
        }
    }

    /// Fill zero-valued fields with their defaults
    pub fn with_defaults(mut self) -> Self {
        if self.timeout_ms == 0 {
            self.timeout_ms = 5000;
        }
        if self.long_poll_timeout_ms == 0 {
            self.long_poll_timeout_ms = 30_000;
        }
        if self.group.is_empty() {
            self.group = DEFAULT_NACOS_GROUP.to_string();
        }
        if self.context_path.is_empty() {
            self.context_path = "/nacos".to_string();
        }
        self
    }

    /// Base URL of the open API, e.g. `http://127.0.0.1:8848/nacos`
    pub fn base_url(&self) -> String {
        let context = self.context_path.trim_end_matches('/');
        let context = if context.is_empty() || context.starts_with('/') {
            context.to_string()
        } else {
            format!("/{}", context)
        };
        format!("http://{}:{}{}", self.host, self.port, context)
    }

    /// Validate the Nacos configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config("Nacos host cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("Nacos port must be > 0"));
        }
        if self.data_id.is_empty() {
            return Err(crate::Error::config("Nacos data id cannot be empty"));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(crate::Error::config(
                "Nacos username and password must be set together",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Factory selection
// ---------------------------------------------------------------------------

/// Service registry selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryConfig {
    /// Consul agent
    Consul(RegistrationConfig),

    /// Custom registry
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RegistryConfig {
    /// Validate the registry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RegistryConfig::Consul(config) => config.validate(),
            RegistryConfig::Custom { factory, config } => {
                validate_custom("registry", factory, config)
            }
        }
    }

    /// Get the registry type name
    pub fn type_name(&self) -> &str {
        match self {
            RegistryConfig::Consul(_) => "consul",
            RegistryConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Config source selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigSourceConfig {
    /// Nacos config service
    Nacos(NacosConfig),

    /// Custom config source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ConfigSourceConfig {
    /// Validate the config source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ConfigSourceConfig::Nacos(config) => config.validate(),
            ConfigSourceConfig::Custom { factory, config } => {
                validate_custom("config source", factory, config)
            }
        }
    }

    /// Get the config source type name
    pub fn type_name(&self) -> &str {
        match self {
            ConfigSourceConfig::Nacos(_) => "nacos",
            ConfigSourceConfig::Custom { factory, .. } => factory,
        }
    }
}

fn validate_custom(
    what: &str,
    factory: &str,
    config: &serde_json::Value,
) -> Result<(), crate::Error> {
    if factory.is_empty() {
        return Err(crate::Error::config(format!(
            "Custom {} factory cannot be empty",
            what
        )));
    }
    if config.is_null() {
        return Err(crate::Error::config(format!(
            "Custom {} config cannot be null",
            what
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tencent Cloud
// ---------------------------------------------------------------------------

/// Default lifetime of a temporary credential (in seconds)
pub const STS_DURATION_SECONDS_DEFAULT: i64 = 3600;

/// Longest lifetime a temporary credential may have (in seconds)
pub const STS_DURATION_SECONDS_MAX: i64 = 7200;

/// Whether a policy statement grants or denies its actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Grant the listed actions
    Allow,
    /// Deny the listed actions
    #[default]
    Deny,
}

impl Effect {
    /// Policy string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }
}

/// Temporary credential request (Tencent Cloud STS for COS)
#[derive(Clone, Serialize, Deserialize)]
pub struct StsConfig {
    /// Account app id
    pub app_id: String,

    /// Permanent secret id
    pub secret_id: String,

    /// Permanent secret key
    /// ⚠️ NEVER log this value
    pub secret_key: String,

    /// COS bucket (e.g. "photos-1250000000")
    pub bucket: String,

    /// COS region (e.g. "ap-guangzhou")
    pub region: String,

    /// Granted actions. Empty selects post/put/get object.
    #[serde(default)]
    pub actions: Vec<String>,

    /// Statement effect
    #[serde(default)]
    pub effect: Effect,

    /// Credential lifetime (in seconds). Out-of-range values fall back to 3600.
    #[serde(default)]
    pub duration_seconds: i64,

    /// Resources covered by the statement. Empty selects the whole bucket.
    #[serde(default)]
    pub resources: Vec<String>,
}

impl std::fmt::Debug for StsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StsConfig")
            .field("app_id", &self.app_id)
            .field("secret_id", &self.secret_id)
            .field("secret_key", &redact(&self.secret_key))
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("actions", &self.actions)
            .field("effect", &self.effect)
            .field("duration_seconds", &self.duration_seconds)
            .field("resources", &self.resources)
            .finish()
    }
}

impl StsConfig {
    /// Fill empty or out-of-range fields with their defaults
    pub fn with_defaults(mut self) -> Self {
        if self.duration_seconds <= 0 || self.duration_seconds > STS_DURATION_SECONDS_MAX {
            self.duration_seconds = STS_DURATION_SECONDS_DEFAULT;
        }
        if self.resources.is_empty() {
            self.resources.push(format!(
                "qcs::cos:{}:uid/{}:{}/*",
                self.region, self.app_id, self.bucket
            ));
        }
        if self.actions.is_empty() {
            self.actions = default_sts_actions();
        }
        self
    }

    /// Validate the request
    pub fn validate(&self) -> Result<(), crate::Error> {
        for (value, what) in [
            (&self.app_id, "app id"),
            (&self.secret_id, "secret id"),
            (&self.secret_key, "secret key"),
            (&self.bucket, "bucket"),
            (&self.region, "region"),
        ] {
            if value.is_empty() {
                return Err(crate::Error::config(format!("STS {} cannot be empty", what)));
            }
        }
        Ok(())
    }
}

/// Actions granted when a request names none
pub fn default_sts_actions() -> Vec<String> {
    vec![
        "name/cos:PostObject".to_string(),
        "name/cos:PutObject".to_string(),
        "name/cos:GetObject".to_string(),
    ]
}

/// COS client configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CosClientConfig {
    /// Secret id (temporary id when `is_sts`)
    pub secret_id: String,

    /// Secret key (temporary key when `is_sts`)
    /// ⚠️ NEVER log this value
    pub secret_key: String,

    /// STS session token, only sent when `is_sts`
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub session_token: String,

    /// Bucket URL, e.g. `https://photos-1250000000.cos.ap-guangzhou.myqcloud.com/`
    pub bucket_url: String,

    /// Verify uploads against the CRC64 the server reports
    #[serde(default)]
    pub enable_crc: bool,

    /// Whether the key pair is a temporary credential
    #[serde(default)]
    pub is_sts: bool,
}

impl std::fmt::Debug for CosClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosClientConfig")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &redact(&self.secret_key))
            .field("session_token", &redact(&self.session_token))
            .field("bucket_url", &self.bucket_url)
            .field("enable_crc", &self.enable_crc)
            .field("is_sts", &self.is_sts)
            .finish()
    }
}

impl CosClientConfig {
    /// Validate the client configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.bucket_url.is_empty() {
            return Err(crate::Error::config("COS bucket URL cannot be empty"));
        }
        if !self.bucket_url.starts_with("https://") && !self.bucket_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "COS bucket URL must use HTTP or HTTPS scheme. Got: {}",
                self.bucket_url
            )));
        }
        if self.secret_id.is_empty() || self.secret_key.is_empty() {
            return Err(crate::Error::config("COS secret id and key are required"));
        }
        if self.is_sts && self.session_token.is_empty() {
            return Err(crate::Error::config(
                "COS session token is required for temporary credentials",
            ));
        }
        Ok(())
    }
}

/// Endpoint used when an SMS config names none
pub const SMS_ENDPOINT_DEFAULT: &str = "sms.tencentcloudapi.com";

/// SMS client configuration (Tencent Cloud)
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SmsConfig {
    /// Secret id
    pub secret_id: String,

    /// Secret key
    /// ⚠️ NEVER log this value
    pub secret_key: String,

    /// Region (e.g. "ap-guangzhou")
    pub region: String,

    /// Request timeout (in seconds). 0 selects 60.
    #[serde(default)]
    pub timeout_secs: u64,

    /// API endpoint. Empty selects `sms.tencentcloudapi.com`.
    #[serde(default)]
    pub endpoint: String,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &redact(&self.secret_key))
            .field("region", &self.region)
            .field("timeout_secs", &self.timeout_secs)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl SmsConfig {
    /// Fill zero-valued fields with their defaults
    pub fn with_defaults(mut self) -> Self {
        if self.timeout_secs == 0 {
            self.timeout_secs = 60;
        }
        if self.endpoint.is_empty() {
            self.endpoint = SMS_ENDPOINT_DEFAULT.to_string();
        }
        self
    }

    /// Validate the client configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.secret_id.is_empty() || self.secret_key.is_empty() {
            return Err(crate::Error::config("SMS secret id and key are required"));
        }
        if self.region.is_empty() {
            return Err(crate::Error::config("SMS region cannot be empty"));
        }
        Ok(())
    }
}
