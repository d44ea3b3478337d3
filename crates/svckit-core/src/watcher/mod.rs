//! Config watcher
//!
//! The ConfigWatcher keeps a decoded configuration value current:
//! - Fetches and decodes the initial content from a ConfigSource
//! - Follows the source's change stream
//! - Publishes each decoded value through a [`ConfigHandle`]
//! - Invokes an optional callback for every applied change
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ ConfigSource │─── ConfigChangeEvent ───┐
//! └──────────────┘                         │
//!                                          ▼
//!                                 ┌────────────────┐
//!                                 │ ConfigWatcher  │
//!                                 └────────────────┘
//!                                          │
//!              ┌───────────────────────────┼──────────────────────┐
//!              ▼                           ▼                      ▼
//!      ┌──────────────┐           ┌──────────────┐        ┌─────────────┐
//!      │ ConfigHandle │           │  on_change   │        │   Events    │
//!      │  (publish)   │           │  (callback)  │        │  (notify)   │
//!      └──────────────┘           └──────────────┘        └─────────────┘
//! ```
//!
//! A change that fails to decode is reported and skipped; the handle keeps
//! serving the previous value.

use crate::error::Result;
use crate::traits::{ConfigChangeEvent, ConfigSource};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// Default capacity of the watcher's event channel
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the ConfigWatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Watcher started following the source
    Started {
        source: String,
    },

    /// A change was decoded and published
    Updated {
        data_id: String,
        group: String,
        md5: String,
    },

    /// A change arrived with the content already published
    Unchanged {
        data_id: String,
        md5: String,
    },

    /// A change could not be decoded; the previous value is kept
    DecodeFailed {
        data_id: String,
        error: String,
    },

    /// Watcher stopped
    Stopped {
        reason: String,
    },
}

/// Read access to the latest decoded configuration
///
/// Handles are cheap to clone and can be moved into request handlers.
#[derive(Debug, Clone)]
pub struct ConfigHandle<T> {
    rx: watch::Receiver<Arc<T>>,
}

impl<T> ConfigHandle<T> {
    /// The latest published value
    pub fn current(&self) -> Arc<T> {
        self.rx.borrow().clone()
    }

    /// Wait until a newer value is published
    ///
    /// Returns an error once the watcher has been dropped.
    pub async fn changed(&mut self) -> Result<Arc<T>> {
        self.rx
            .changed()
            .await
            .map_err(|_| crate::Error::config_source("config watcher dropped"))?;
        Ok(self.rx.borrow_and_update().clone())
    }
}

type ChangeCallback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Keeps a decoded configuration value in step with a ConfigSource
///
/// ## Lifecycle
///
/// 1. Create with [`ConfigWatcher::new()`] (fetches and decodes once)
/// 2. Optionally attach a callback with [`ConfigWatcher::on_change()`]
/// 3. Drive with [`ConfigWatcher::run()`] or [`ConfigWatcher::run_with_shutdown()`]
pub struct ConfigWatcher<T> {
    source: Box<dyn ConfigSource>,
    value_tx: watch::Sender<Arc<T>>,
    last_content: Mutex<String>,
    on_change: Option<ChangeCallback<T>>,
    event_tx: mpsc::Sender<WatchEvent>,
}

impl<T> ConfigWatcher<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Fetch and decode the initial value, then build the watcher
    ///
    /// # Returns
    ///
    /// A tuple of (watcher, handle, event_receiver)
    pub async fn new(
        source: Box<dyn ConfigSource>,
        event_channel_capacity: usize,
    ) -> Result<(Self, ConfigHandle<T>, mpsc::Receiver<WatchEvent>)> {
        let content = source.fetch().await?;
        let value: T = serde_json::from_str(&content)?;

        let (value_tx, value_rx) = watch::channel(Arc::new(value));
        let (event_tx, event_rx) = mpsc::channel(event_channel_capacity.max(1));

        let watcher = Self {
            source,
            value_tx,
            last_content: Mutex::new(content),
            on_change: None,
            event_tx,
        };

        Ok((watcher, ConfigHandle { rx: value_rx }, event_rx))
    }

    /// Invoke `callback` with every newly applied value
    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_change = Some(Box::new(callback));
        self
    }

    /// Another handle onto the published value
    pub fn handle(&self) -> ConfigHandle<T> {
        ConfigHandle {
            rx: self.value_tx.subscribe(),
        }
    }

    /// Run until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// With `None` this behaves like [`ConfigWatcher::run()`].
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(WatchEvent::Started {
            source: self.source.source_name().to_string(),
        });

        let mut changes = self.source.watch();

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                change = changes.next() => match change {
                    Some(change) => self.apply(change).await,
                    None => {
                        warn!("Config source {} closed its change stream", self.source.source_name());
                        self.emit_event(WatchEvent::Stopped {
                            reason: "Source stream ended".to_string(),
                        });
                        break;
                    }
                },

                _ = &mut shutdown => {
                    info!("Shutdown signal received, config watcher stopping");
                    self.emit_event(WatchEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    /// Decode and publish one change
    async fn apply(&self, change: ConfigChangeEvent) {
        let mut last_content = self.last_content.lock().await;
        if *last_content == change.content {
            debug!("Config {} unchanged (md5 {}), skipping", change.data_id, change.md5);
            self.emit_event(WatchEvent::Unchanged {
                data_id: change.data_id,
                md5: change.md5,
            });
            return;
        }

        let value: T = match serde_json::from_str(&change.content) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Config {} changed but could not be decoded, keeping previous value: {}",
                    change.data_id, e
                );
                self.emit_event(WatchEvent::DecodeFailed {
                    data_id: change.data_id,
                    error: e.to_string(),
                });
                return;
            }
        };

        *last_content = change.content;
        drop(last_content);

        if let Some(callback) = &self.on_change {
            callback(&value);
        }
        self.value_tx.send_replace(Arc::new(value));

        info!(
            "Config {} ({}) updated, md5 {}",
            change.data_id, change.group, change.md5
        );
        self.emit_event(WatchEvent::Updated {
            data_id: change.data_id,
            group: change.group,
            md5: change.md5,
        });
    }

    fn emit_event(&self, event: WatchEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Watch event channel full, dropping event. Consider increasing its capacity.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_event_clone_eq() {
        let event = WatchEvent::Updated {
            data_id: "app.json".to_string(),
            group: "DEFAULT_GROUP".to_string(),
            md5: "abc".to_string(),
        };
        assert_eq!(event.clone(), event);
    }
}
