// # Config Source Trait
//
// Defines the interface for fetching and watching a remote configuration blob.
//
// ## Implementations
//
// - Nacos: `svckit-nacos` crate
//
// ## Usage
//
// ```rust,ignore
// use svckit_core::ConfigSource;
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* ConfigSource implementation */;
//
//     // Get current content
//     let content = source.fetch().await?;
//
//     // Watch for changes
//     let mut stream = source.watch();
//     while let Some(change) = stream.next().await {
//         println!("config changed: {}", change.md5);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

/// A configuration blob changed on the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChangeEvent {
    /// Config data id
    pub data_id: String,
    /// Config group
    pub group: String,
    /// Namespace (tenant), empty for the public namespace
    pub tenant: String,
    /// The new content
    pub content: String,
    /// Lowercase hex MD5 of `content`
    pub md5: String,
}

/// Trait for config source implementations
///
/// This trait defines two core capabilities:
/// 1. **fetch()**: Fetch the current content
/// 2. **watch()**: Stream of change events
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch the current content
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The raw content
    /// - `Err(Error)`: If the content could not be fetched (and no snapshot applies)
    async fn fetch(&self) -> Result<String, crate::Error>;

    /// Watch for changes
    ///
    /// Returns a stream that yields a `ConfigChangeEvent` whenever the
    /// content changes on the server. Dropping the stream stops the watch.
    ///
    /// # Behavior
    ///
    /// - Changes are compared against the content last seen by `fetch()`
    ///   or by the watch itself
    /// - Identical consecutive contents never yield two events
    fn watch(&self) -> Pin<Box<dyn Stream<Item = ConfigChangeEvent> + Send + 'static>>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing config sources from configuration
///
/// Construction is async because sources may load local snapshots first.
#[async_trait]
pub trait ConfigSourceFactory: Send + Sync {
    /// Create a ConfigSource instance from configuration
    async fn create(
        &self,
        config: &crate::config::ConfigSourceConfig,
    ) -> Result<Box<dyn ConfigSource>, crate::Error>;
}
