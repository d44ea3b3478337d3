// # Nacos Config Source
//
// Fetches a named configuration blob from a Nacos server, decodes it, and
// watches it for changes through the long-poll listener API.
//
// ## Features
//
// - Namespace (tenant) and group selection
// - Username/password login with cached access tokens
// - Snapshot failover: the last fetched content is persisted in `cache_dir`
//   and served when the server is unreachable
// - Change stream for `ConfigWatcher`
//
// ## Security Requirements
//
// - The password and access token NEVER appear in logs or Debug output

mod auth;
mod client;
pub mod listener;

pub use client::NacosConfigClient;
pub use listener::content_md5;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use svckit_core::config::{ConfigSourceConfig, NacosConfig};
use svckit_core::traits::{ConfigSource, ConfigSourceFactory};
use svckit_core::{Error, IntegrationRegistry, Result};

/// Create a client, fetch the configured data id and decode it as JSON
///
/// Every failure is reported as `init nacos fail: {cause}`.
///
/// ```rust,no_run
/// # async fn example() -> svckit_core::Result<()> {
/// #[derive(serde::Deserialize)]
/// struct AppConfig {
///     database_url: String,
/// }
///
/// let config = svckit_core::NacosConfig::new("127.0.0.1", 8848, "app.json");
/// let (_client, app): (_, AppConfig) = svckit_nacos::init_nacos(config).await?;
/// println!("{}", app.database_url);
/// # Ok(())
/// # }
/// ```
pub async fn init_nacos<T: DeserializeOwned>(config: NacosConfig) -> Result<(NacosConfigClient, T)> {
    let init_error = |e: Error| Error::config_source(format!("init nacos fail: {}", e));

    let client = NacosConfigClient::new(config).await.map_err(init_error)?;
    let content = client.fetch().await.map_err(init_error)?;
    let value = serde_json::from_str(&content).map_err(|e| init_error(e.into()))?;

    Ok((client, value))
}

/// Factory for creating Nacos config sources
pub struct NacosFactory;

#[async_trait]
impl ConfigSourceFactory for NacosFactory {
    async fn create(&self, config: &ConfigSourceConfig) -> Result<Box<dyn ConfigSource>> {
        match config {
            ConfigSourceConfig::Nacos(nacos) => {
                Ok(Box::new(NacosConfigClient::new(nacos.clone()).await?))
            }
            _ => Err(Error::config("Invalid config for Nacos config source")),
        }
    }
}

/// Register the Nacos factory under `"nacos"`
pub fn register(registry: &IntegrationRegistry) {
    registry.register_config_source("nacos", Box::new(NacosFactory));
}
