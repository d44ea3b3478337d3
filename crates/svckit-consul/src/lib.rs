// # Consul Service Registry
//
// Registers service instances with a Consul agent over its HTTP API.
//
// The client is single-shot: one request per call, errors are returned to
// the caller, nothing runs in the background.
//
// ## Security Requirements
//
// - The ACL token NEVER appears in logs or Debug output
// - The token is sent as the `X-Consul-Token` header only
//
// ## API Reference
//
// - Register: PUT `/v1/agent/service/register`
// - Deregister: PUT `/v1/agent/service/deregister/:service_id`

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use svckit_core::config::{RegistrationConfig, RegistryConfig};
use svckit_core::traits::{ServiceInstance, ServiceRegistry, ServiceRegistryFactory};
use svckit_core::{Error, IntegrationRegistry, Result};

/// Default HTTP timeout for agent requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the ACL token
const TOKEN_HEADER: &str = "X-Consul-Token";

/// Consul agent client
pub struct ConsulRegistry {
    /// Agent base URL, e.g. `http://127.0.0.1:8500`
    base_url: String,

    /// ACL token
    /// ⚠️ NEVER log this value
    token: Option<String>,

    client: reqwest::Client,
}

impl std::fmt::Debug for ConsulRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsulRegistry")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Agent registration payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceRegistration<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    name: &'a str,
    address: &'a str,
    port: u16,
    tags: &'a [String],
    check: AgentServiceCheck<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentServiceCheck<'a> {
    #[serde(rename = "HTTP")]
    http: &'a str,
    interval: String,
    timeout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    deregister_critical_service_after: Option<String>,
}

impl<'a> From<&'a ServiceInstance> for AgentServiceRegistration<'a> {
    fn from(instance: &'a ServiceInstance) -> Self {
        let check = &instance.check;
        Self {
            id: &instance.id,
            name: &instance.name,
            address: &instance.address,
            port: instance.port,
            tags: &instance.tags,
            check: AgentServiceCheck {
                http: &check.http,
                interval: format!("{}s", check.interval_secs),
                timeout: format!("{}s", check.timeout_secs),
                deregister_critical_service_after: (check.deregister_critical_service_after_secs
                    > 0)
                .then(|| format!("{}s", check.deregister_critical_service_after_secs)),
            },
        }
    }
}

impl ConsulRegistry {
    /// Create a client for the agent named in `config`
    pub fn new(config: &RegistrationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: format!("http://{}", config.consul.address()),
            token: config.token.clone().filter(|t| !t.is_empty()),
            client,
        })
    }

    /// Agent base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn put(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.put(format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => request.header(TOKEN_HEADER, token),
            None => request,
        }
    }

    async fn check_response(response: reqwest::Response, context: &str) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        Err(Error::from_status("consul", status.as_u16(), context, &body))
    }
}

#[async_trait]
impl ServiceRegistry for ConsulRegistry {
    /// Register an instance with the agent
    ///
    /// ```http
    /// PUT /v1/agent/service/register
    /// X-Consul-Token: <token>
    /// ```
    async fn register(&self, instance: &ServiceInstance) -> Result<()> {
        tracing::debug!(
            "Registering {} ({}) at {}:{}, check {}",
            instance.name,
            instance.id,
            instance.address,
            instance.port,
            instance.check.http
        );

        let response = self
            .put("/v1/agent/service/register")
            .json(&AgentServiceRegistration::from(instance))
            .send()
            .await
            .map_err(|e| Error::http(format!("consul request failed: {}", e)))?;

        Self::check_response(response, "service register").await?;

        tracing::info!("Registered service {} with id {}", instance.name, instance.id);
        Ok(())
    }

    /// Remove an instance from the agent
    async fn deregister(&self, service_id: &str) -> Result<()> {
        let response = self
            .put(&format!("/v1/agent/service/deregister/{}", service_id))
            .send()
            .await
            .map_err(|e| Error::http(format!("consul request failed: {}", e)))?;

        Self::check_response(response, &format!("service deregister {}", service_id)).await?;

        tracing::info!("Deregistered service id {}", service_id);
        Ok(())
    }

    fn registry_name(&self) -> &'static str {
        "consul"
    }
}

/// Validate `config`, build a client and register a fresh instance
///
/// Returns the client together with the generated service id, which is
/// needed to deregister later.
pub async fn init_consul(config: &RegistrationConfig) -> Result<(ConsulRegistry, String)> {
    config.validate()?;

    let registry = ConsulRegistry::new(config).map_err(|e| {
        Error::registry(format!(
            "consul init fail, please check consul host and port is right: {}",
            e
        ))
    })?;

    let instance = ServiceInstance::from_config(config);
    registry.register(&instance).await.map_err(|e| {
        Error::registry(format!(
            "consul service register fail, please check parameter is right: {}",
            e
        ))
    })?;

    Ok((registry, instance.id))
}

/// Factory for creating Consul registries
pub struct ConsulFactory;

impl ServiceRegistryFactory for ConsulFactory {
    fn create(&self, config: &RegistryConfig) -> Result<Box<dyn ServiceRegistry>> {
        match config {
            RegistryConfig::Consul(registration) => {
                registration.validate()?;
                Ok(Box::new(ConsulRegistry::new(registration)?))
            }
            _ => Err(Error::config("Invalid config for Consul registry")),
        }
    }
}

/// Register the Consul factory under `"consul"`
///
/// ```rust
/// use svckit_core::IntegrationRegistry;
///
/// let registry = IntegrationRegistry::new();
/// svckit_consul::register(&registry);
/// assert!(registry.has_registry("consul"));
/// ```
pub fn register(registry: &IntegrationRegistry) {
    registry.register_registry("consul", Box::new(ConsulFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use svckit_core::config::Endpoint;

    fn config() -> RegistrationConfig {
        RegistrationConfig::new(
            "orders",
            Endpoint::new("127.0.0.1", 8500),
            Endpoint::new("10.0.0.5", 9000),
        )
        .with_tags(vec!["v1".to_string(), "grpc".to_string()])
        .with_check_route("/health")
    }

    #[test]
    fn test_registration_payload() {
        let mut instance = ServiceInstance::from_config(&config());
        instance.id = "fixed-id".to_string();

        let json = serde_json::to_value(AgentServiceRegistration::from(&instance)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ID": "fixed-id",
                "Name": "orders",
                "Address": "10.0.0.5",
                "Port": 9000,
                "Tags": ["v1", "grpc"],
                "Check": {
                    "HTTP": "http://10.0.0.5:9000/health",
                    "Interval": "10s",
                    "Timeout": "5s",
                    "DeregisterCriticalServiceAfter": "60s"
                }
            })
        );
    }

    #[test]
    fn test_zero_deregister_after_is_omitted() {
        let mut config = config();
        config.deregister_critical_service_after_secs = 0;
        let instance = ServiceInstance::from_config(&config);

        let json = serde_json::to_value(AgentServiceRegistration::from(&instance)).unwrap();
        assert!(json["Check"].get("DeregisterCriticalServiceAfter").is_none());
    }

    #[test]
    fn test_factory_creation() {
        let factory = ConsulFactory;
        assert!(factory.create(&RegistryConfig::Consul(config())).is_ok());

        let mut invalid = config();
        invalid.name.clear();
        assert!(factory.create(&RegistryConfig::Consul(invalid)).is_err());
    }

    #[test]
    fn test_token_not_exposed_in_debug() {
        let registry = ConsulRegistry::new(&config().with_token("secret-acl-token")).unwrap();

        let debug_str = format!("{:?}", registry);
        assert!(!debug_str.contains("secret-acl-token"));
        assert!(debug_str.contains("ConsulRegistry"));
        assert_eq!(registry.base_url(), "http://127.0.0.1:8500");
    }

    #[test]
    fn test_registry_name() {
        let registry = ConsulRegistry::new(&config()).unwrap();
        assert_eq!(registry.registry_name(), "consul");
    }
}
