// Nacos config client
//
// Speaks the Nacos v1 open API:
//
// - GET  `{context}/v1/cs/configs?dataId=&group=&tenant=`   fetch content
// - POST `{context}/v1/cs/configs/listener`                 long-poll for changes
// - POST `{context}/v1/auth/login`                          access token
//
// Successful fetches are written to the snapshot store. When the server
// cannot be reached the last snapshot is served instead, unless
// `not_load_cache_at_start` is set.

use async_trait::async_trait;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use svckit_core::config::{DEFAULT_NACOS_GROUP, NacosConfig};
use svckit_core::snapshot::{FileSnapshotStore, Snapshot, SnapshotStore, snapshot_key};
use svckit_core::traits::{ConfigChangeEvent, ConfigSource};
use svckit_core::{Error, Result};
use tokio::sync::Mutex;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::auth::{AccessToken, LoginResponse};
use crate::listener::{
    LISTENING_CONFIGS_FIELD, LONG_PULLING_TIMEOUT_HEADER, content_md5, listening_configs,
    parse_changed_configs,
};

/// Pause before polling again after a failed poll or refetch
const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Nacos config client
///
/// Cheap to clone; clones share the HTTP client, token cache and snapshot
/// store.
#[derive(Clone)]
pub struct NacosConfigClient {
    inner: Arc<Inner>,
}

struct Inner {
    /// Config with defaults applied
    config: NacosConfig,
    base_url: String,
    http: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
    snapshots: Option<Arc<dyn SnapshotStore>>,
    /// MD5 of the content last handed out for the configured data id
    last_md5: Mutex<Option<String>>,
}

impl std::fmt::Debug for NacosConfigClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NacosConfigClient")
            .field("config", &self.inner.config)
            .field("base_url", &self.inner.base_url)
            .field("snapshots", &self.inner.snapshots.is_some())
            .finish()
    }
}

impl NacosConfigClient {
    /// Create a client, opening the snapshot file in `cache_dir` if one is set
    pub async fn new(config: NacosConfig) -> Result<Self> {
        let config = config.with_defaults();
        let snapshots: Option<Arc<dyn SnapshotStore>> = if config.cache_dir.is_empty() {
            None
        } else {
            Some(Arc::new(FileSnapshotStore::in_dir(&config.cache_dir).await?))
        };

        Self::build(config, snapshots)
    }

    /// Create a client backed by the given snapshot store
    pub fn with_snapshot_store(config: NacosConfig, store: Arc<dyn SnapshotStore>) -> Result<Self> {
        Self::build(config.with_defaults(), Some(store))
    }

    fn build(config: NacosConfig, snapshots: Option<Arc<dyn SnapshotStore>>) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            inner: Arc::new(Inner {
                base_url: config.base_url(),
                config,
                http,
                token: Mutex::new(None),
                snapshots,
                last_md5: Mutex::new(None),
            }),
        })
    }

    /// The effective configuration (defaults applied)
    pub fn config(&self) -> &NacosConfig {
        &self.inner.config
    }

    /// Fetch a config from the configured namespace
    ///
    /// An empty `group` selects `DEFAULT_GROUP`.
    pub async fn get_config(&self, data_id: &str, group: &str) -> Result<String> {
        let group = if group.is_empty() { DEFAULT_NACOS_GROUP } else { group };
        self.inner.get_config(data_id, group).await
    }
}

impl Inner {
    fn tenant(&self) -> &str {
        &self.config.namespace_id
    }

    async fn get_config(&self, data_id: &str, group: &str) -> Result<String> {
        let key = snapshot_key(data_id, group, self.tenant());

        match self.request_config(data_id, group).await {
            Ok(content) => {
                if let Some(store) = &self.snapshots {
                    let snapshot = Snapshot::new(content.clone(), content_md5(&content));
                    if let Err(e) = store.save(&key, &snapshot).await {
                        tracing::warn!("Failed to save config snapshot {}: {}", key, e);
                    }
                }
                Ok(content)
            }
            Err(e) if e.is_transient() && !self.config.not_load_cache_at_start => {
                let Some(store) = &self.snapshots else {
                    return Err(e);
                };
                match store.load(&key).await? {
                    Some(snapshot) => {
                        tracing::warn!(
                            "Nacos unreachable ({}), serving snapshot of {} saved at {}",
                            e,
                            key,
                            snapshot.saved_at
                        );
                        Ok(snapshot.content)
                    }
                    None => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn request_config(&self, data_id: &str, group: &str) -> Result<String> {
        let mut query = vec![
            ("dataId", data_id.to_string()),
            ("group", group.to_string()),
        ];
        if !self.tenant().is_empty() {
            query.push(("tenant", self.tenant().to_string()));
        }
        if let Some(token) = self.access_token().await? {
            query.push(("accessToken", token));
        }

        let response = self
            .http
            .get(format!("{}/v1/cs/configs", self.base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::http(format!("nacos request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read nacos response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::from_status(
                "nacos",
                status.as_u16(),
                &format!("config {}+{} not found", data_id, group),
                &body,
            ));
        }

        tracing::debug!("Fetched config {}+{} ({} bytes)", data_id, group, body.len());
        Ok(body)
    }

    /// Current access token, logging in first when needed
    ///
    /// `None` when no credentials are configured.
    async fn access_token(&self) -> Result<Option<String>> {
        let (Some(username), Some(password)) = (&self.config.username, &self.config.password)
        else {
            return Ok(None);
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(Some(token.value().to_string()));
        }

        let response = self
            .http
            .post(format!("{}/v1/auth/login", self.base_url))
            .form(&[("username", username.as_str()), ("password", password.as_str())])
            .send()
            .await
            .map_err(|e| Error::http(format!("nacos login failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status("nacos", status.as_u16(), "login", &body));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| Error::provider("nacos", format!("Failed to parse login response: {}", e)))?;

        tracing::debug!("Logged in to nacos as {}, token ttl {}s", username, login.token_ttl);
        let token = AccessToken::from_login(login, Instant::now());
        let value = token.value().to_string();
        *cached = Some(token);
        Ok(Some(value))
    }

    /// One long-poll round for the configured data id
    ///
    /// Returns `true` when the server reports a change.
    async fn poll_for_change(&self, md5: &str) -> Result<bool> {
        let config = &self.config;
        let listening = listening_configs(&config.data_id, &config.group, md5, self.tenant());

        let mut request = self
            .http
            .post(format!("{}/v1/cs/configs/listener", self.base_url))
            .header(LONG_PULLING_TIMEOUT_HEADER, config.long_poll_timeout_ms.to_string())
            .timeout(Duration::from_millis(
                config.long_poll_timeout_ms + config.timeout_ms,
            ))
            .form(&[(LISTENING_CONFIGS_FIELD, listening.as_str())]);
        if let Some(token) = self.access_token().await? {
            request = request.query(&[("accessToken", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("nacos listener request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read nacos response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::from_status("nacos", status.as_u16(), "listen", &body));
        }

        Ok(parse_changed_configs(&body)
            .iter()
            .any(|changed| changed.data_id == config.data_id && changed.group == config.group))
    }

    /// Fetch the configured data id and record its md5
    ///
    /// Returns `None` when the content matches what was last handed out.
    async fn fetch_if_changed(&self) -> Result<Option<(String, String)>> {
        let content = self
            .get_config(&self.config.data_id, &self.config.group)
            .await?;
        let md5 = content_md5(&content);

        let mut last = self.last_md5.lock().await;
        if last.as_deref() == Some(md5.as_str()) {
            return Ok(None);
        }
        *last = Some(md5.clone());
        Ok(Some((content, md5)))
    }
}

#[async_trait]
impl ConfigSource for NacosConfigClient {
    async fn fetch(&self) -> Result<String> {
        let inner = &self.inner;
        let content = inner
            .get_config(&inner.config.data_id, &inner.config.group)
            .await?;
        *inner.last_md5.lock().await = Some(content_md5(&content));
        Ok(content)
    }

    fn watch(&self) -> Pin<Box<dyn Stream<Item = ConfigChangeEvent> + Send + 'static>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let config = &inner.config;
            tracing::info!(
                "Starting nacos listener (data_id={}, group={}, tenant={:?})",
                config.data_id,
                config.group,
                config.namespace_id
            );

            loop {
                let md5 = inner.last_md5.lock().await.clone().unwrap_or_default();

                let changed = tokio::select! {
                    result = inner.poll_for_change(&md5) => result,
                    _ = tx.closed() => break,
                };

                match changed {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        tracing::warn!("Nacos listener poll failed: {}", e);
                        tokio::time::sleep(ERROR_PAUSE).await;
                        continue;
                    }
                }

                match inner.fetch_if_changed().await {
                    Ok(Some((content, md5))) => {
                        tracing::info!("Config {}+{} changed, md5 {}", config.data_id, config.group, md5);
                        let event = ConfigChangeEvent {
                            data_id: config.data_id.clone(),
                            group: config.group.clone(),
                            tenant: config.namespace_id.clone(),
                            content,
                            md5,
                        };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!("Config {} reported changed but content is identical", config.data_id);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to refetch changed config {}: {}", config.data_id, e);
                        tokio::time::sleep(ERROR_PAUSE).await;
                    }
                }
            }

            tracing::debug!("Nacos listener for {} stopped, receiver dropped", config.data_id);
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    fn source_name(&self) -> &'static str {
        "nacos"
    }
}
