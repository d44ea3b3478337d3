// # svckitd - Service Companion Daemon
//
// A thin integration layer over the svckit crates. It holds no vendor
// logic of its own. It is responsible for:
//
// 1. Reading configuration from environment variables
// 2. Registering the service instance with Consul
// 3. Loading the service config from Nacos and keeping it current
// 4. Deregistering on shutdown
//
// ## Configuration
//
// All configuration is done via environment variables. Consul is enabled by
// `SVCKIT_CONSUL_HOST`, Nacos by `SVCKIT_NACOS_HOST`; at least one of them
// must be set.
//
// ### Service
// - `SVCKIT_SERVICE_NAME`: Service name (required with Consul)
// - `SVCKIT_SERVICE_TAGS`: Comma-separated tags
// - `SVCKIT_SERVICE_HOST`: Address the health check reaches (required with Consul)
// - `SVCKIT_SERVICE_PORT`: Port the health check reaches (required with Consul)
// - `SVCKIT_CHECK_ROUTE`: Health-check route, e.g. `health`
// - `SVCKIT_CHECK_SSL`: Use https for the health check (true/false)
//
// ### Consul
// - `SVCKIT_CONSUL_HOST`: Agent host
// - `SVCKIT_CONSUL_PORT`: Agent port (default 8500)
// - `SVCKIT_CONSUL_TOKEN`: ACL token (optional)
//
// ### Nacos
// - `SVCKIT_NACOS_HOST`: Server host
// - `SVCKIT_NACOS_PORT`: Server port (default 8848)
// - `SVCKIT_NACOS_NAMESPACE`: Namespace id (optional)
// - `SVCKIT_NACOS_DATA_ID`: Data id of the JSON config (required with Nacos)
// - `SVCKIT_NACOS_GROUP`: Group (default DEFAULT_GROUP)
// - `SVCKIT_NACOS_CACHE_DIR`: Snapshot directory (optional)
// - `SVCKIT_NACOS_USERNAME`, `SVCKIT_NACOS_PASSWORD`: Login for servers with auth
//
// ### Logging
// - `SVCKIT_LOG_LEVEL`: trace, debug, info, warn or error (default info)
//
// ## Example
//
// ```bash
// export SVCKIT_SERVICE_NAME=orders
// export SVCKIT_SERVICE_HOST=10.0.0.5
// export SVCKIT_SERVICE_PORT=9000
// export SVCKIT_CHECK_ROUTE=health
// export SVCKIT_CONSUL_HOST=127.0.0.1
// export SVCKIT_NACOS_HOST=127.0.0.1
// export SVCKIT_NACOS_DATA_ID=orders.json
//
// svckitd
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use svckit_core::config::{ConfigSourceConfig, Endpoint, NacosConfig, RegistrationConfig};
use svckit_core::{ConfigWatcher, IntegrationRegistry, ServiceRegistry, WatchEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound for stopping the watcher and for deregistering
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_CONSUL_PORT: u16 = 8500;
const DEFAULT_NACOS_PORT: u16 = 8848;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum SvckitExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<SvckitExitCode> for ExitCode {
    fn from(code: SvckitExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    service_name: Option<String>,
    service_tags: Vec<String>,
    service_host: Option<String>,
    service_port: Option<u16>,
    check_route: String,
    check_ssl: bool,
    consul_host: Option<String>,
    consul_port: u16,
    consul_token: Option<String>,
    nacos_host: Option<String>,
    nacos_port: u16,
    nacos_namespace: String,
    nacos_data_id: Option<String>,
    nacos_group: String,
    nacos_cache_dir: String,
    nacos_username: Option<String>,
    nacos_password: Option<String>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            service_name: var("SVCKIT_SERVICE_NAME"),
            service_tags: var("SVCKIT_SERVICE_TAGS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            service_host: var("SVCKIT_SERVICE_HOST"),
            service_port: parse_var(&var, "SVCKIT_SERVICE_PORT")?,
            check_route: var("SVCKIT_CHECK_ROUTE").unwrap_or_default(),
            check_ssl: parse_bool(&var, "SVCKIT_CHECK_SSL")?,
            consul_host: var("SVCKIT_CONSUL_HOST"),
            consul_port: parse_var(&var, "SVCKIT_CONSUL_PORT")?.unwrap_or(DEFAULT_CONSUL_PORT),
            consul_token: var("SVCKIT_CONSUL_TOKEN"),
            nacos_host: var("SVCKIT_NACOS_HOST"),
            nacos_port: parse_var(&var, "SVCKIT_NACOS_PORT")?.unwrap_or(DEFAULT_NACOS_PORT),
            nacos_namespace: var("SVCKIT_NACOS_NAMESPACE").unwrap_or_default(),
            nacos_data_id: var("SVCKIT_NACOS_DATA_ID"),
            nacos_group: var("SVCKIT_NACOS_GROUP").unwrap_or_default(),
            nacos_cache_dir: var("SVCKIT_NACOS_CACHE_DIR").unwrap_or_default(),
            nacos_username: var("SVCKIT_NACOS_USERNAME"),
            nacos_password: var("SVCKIT_NACOS_PASSWORD"),
            log_level: var("SVCKIT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.consul_host.is_none() && self.nacos_host.is_none() {
            anyhow::bail!(
                "Nothing to do: set SVCKIT_CONSUL_HOST to register with Consul \
                and/or SVCKIT_NACOS_HOST to load config from Nacos"
            );
        }

        if self.consul_host.is_some() {
            if !cfg!(feature = "consul") {
                anyhow::bail!("SVCKIT_CONSUL_HOST is set but svckitd was built without Consul support");
            }
            for (value, name) in [
                (self.service_name.is_some(), "SVCKIT_SERVICE_NAME"),
                (self.service_host.is_some(), "SVCKIT_SERVICE_HOST"),
                (self.service_port.is_some(), "SVCKIT_SERVICE_PORT"),
            ] {
                if !value {
                    anyhow::bail!("{} is required when SVCKIT_CONSUL_HOST is set", name);
                }
            }
        }
        if let Some(registration) = self.registration() {
            registration.validate()?;
        }

        if self.nacos_host.is_some() {
            if !cfg!(feature = "nacos") {
                anyhow::bail!("SVCKIT_NACOS_HOST is set but svckitd was built without Nacos support");
            }
            if self.nacos_data_id.is_none() {
                anyhow::bail!(
                    "SVCKIT_NACOS_DATA_ID is required when SVCKIT_NACOS_HOST is set. \
                    Set it via: export SVCKIT_NACOS_DATA_ID=app.json"
                );
            }
        }
        if let Some(nacos) = self.nacos() {
            nacos.validate()?;
        }

        if parse_level(&self.log_level).is_none() {
            anyhow::bail!(
                "SVCKIT_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }

    /// Consul registration settings, if Consul is enabled
    fn registration(&self) -> Option<RegistrationConfig> {
        let consul_host = self.consul_host.as_ref()?;

        let mut registration = RegistrationConfig::new(
            self.service_name.clone().unwrap_or_default(),
            Endpoint::new(consul_host.clone(), self.consul_port),
            Endpoint::new(
                self.service_host.clone().unwrap_or_default(),
                self.service_port.unwrap_or_default(),
            ),
        )
        .with_tags(self.service_tags.clone())
        .with_check_route(self.check_route.clone())
        .with_ssl(self.check_ssl);
        if let Some(token) = &self.consul_token {
            registration = registration.with_token(token.clone());
        }

        Some(registration)
    }

    /// Nacos client settings, if Nacos is enabled
    fn nacos(&self) -> Option<NacosConfig> {
        let host = self.nacos_host.as_ref()?;

        let mut nacos = NacosConfig::new(
            host.clone(),
            self.nacos_port,
            self.nacos_data_id.clone().unwrap_or_default(),
        );
        nacos.namespace_id = self.nacos_namespace.clone();
        nacos.group = self.nacos_group.clone();
        nacos.cache_dir = self.nacos_cache_dir.clone();
        nacos.username = self.nacos_username.clone();
        nacos.password = self.nacos_password.clone();

        Some(nacos)
    }
}

fn parse_var<V, T>(var: &V, name: &str) -> Result<Option<T>>
where
    V: Fn(&str) -> Option<String>,
    T: FromStr,
{
    var(name)
        .map(|raw| {
            raw.parse()
                .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", name, raw))
        })
        .transpose()
}

fn parse_bool<V>(var: &V, name: &str) -> Result<bool>
where
    V: Fn(&str) -> Option<String>,
{
    match var(name).map(|v| v.to_lowercase()).as_deref() {
        None | Some("false") | Some("0") | Some("no") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some(other) => anyhow::bail!("{} must be true or false. Got: '{}'", name, other),
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return SvckitExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return SvckitExitCode::ConfigError.into();
    }

    let log_level = parse_level(&config.log_level).unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return SvckitExitCode::ConfigError.into();
    }

    info!("Starting svckitd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SvckitExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => SvckitExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup failed: {:#}", e);
                SvckitExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                SvckitExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Failure class, mapped to an exit code
enum DaemonError {
    /// Registration or initial config load failed
    Startup(anyhow::Error),
    /// Failure after the daemon was up
    Runtime(anyhow::Error),
}

/// A registered instance
struct Registration {
    registry: Box<dyn ServiceRegistry>,
    service_id: String,
}

/// A running config watcher
struct RunningWatcher {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<svckit_core::Result<()>>,
}

/// Run the daemon
async fn run_daemon(config: Config) -> std::result::Result<(), DaemonError> {
    let integrations = IntegrationRegistry::new();

    #[cfg(feature = "nacos")]
    {
        info!("Registering Nacos config source");
        svckit_nacos::register(&integrations);
    }

    let registration = register_service(&config).await.map_err(DaemonError::Startup)?;

    let watcher = match start_watcher(&config, &integrations).await {
        Ok(watcher) => watcher,
        Err(e) => {
            // Do not leave a registered instance behind
            release_after_failed_start(registration).await;
            return Err(DaemonError::Startup(e));
        }
    };

    info!("Daemon initialized successfully");

    let shutdown = wait_for_shutdown().await;
    match &shutdown {
        Ok(signal) => info!("Received shutdown signal: {}", signal),
        Err(e) => error!("Shutdown error: {}", e),
    }
    info!("Shutting down daemon");

    let mut result = shutdown.map(|_| ());

    if let Some(watcher) = watcher {
        let _ = watcher.shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, watcher.task).await {
            Ok(Ok(Ok(()))) => debug!("Config watcher stopped"),
            Ok(Ok(Err(e))) => result = Err(anyhow::anyhow!("Config watcher failed: {}", e)),
            Ok(Err(e)) => result = Err(anyhow::anyhow!("Config watcher task panicked: {}", e)),
            Err(_) => warn!("Config watcher did not stop within {:?}", SHUTDOWN_TIMEOUT),
        }
    }

    if let Some(registration) = registration
        && let Err(e) = deregister(registration).await
    {
        result = Err(e);
    }

    result.map_err(DaemonError::Runtime)
}

/// Register the instance with Consul when it is enabled
#[cfg(feature = "consul")]
async fn register_service(config: &Config) -> Result<Option<Registration>> {
    let Some(registration) = config.registration() else {
        return Ok(None);
    };

    let (registry, service_id) = svckit_consul::init_consul(&registration).await?;
    info!(
        "Registered {} as {} with Consul at {}",
        registration.name,
        service_id,
        registry.base_url()
    );

    Ok(Some(Registration {
        registry: Box::new(registry),
        service_id,
    }))
}

#[cfg(not(feature = "consul"))]
async fn register_service(config: &Config) -> Result<Option<Registration>> {
    match config.registration() {
        Some(registration) => anyhow::bail!(
            "Cannot register {}: built without Consul support",
            registration.name
        ),
        None => Ok(None),
    }
}

async fn deregister(registration: Registration) -> Result<()> {
    let Registration {
        registry,
        service_id,
    } = registration;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, registry.deregister(&service_id)).await {
        Ok(Ok(())) => {
            info!("Deregistered {} from {}", service_id, registry.registry_name());
            Ok(())
        }
        Ok(Err(e)) => Err(anyhow::anyhow!("Failed to deregister {}: {}", service_id, e)),
        Err(_) => Err(anyhow::anyhow!(
            "Deregistering {} timed out after {:?}",
            service_id,
            SHUTDOWN_TIMEOUT
        )),
    }
}

/// Deregister after a failed startup, returning the cleanup error if any
///
/// The error is logged since startup already failed for another reason.
async fn release_after_failed_start(registration: Option<Registration>) -> Option<anyhow::Error> {
    let registration = registration?;
    match deregister(registration).await {
        Ok(()) => None,
        Err(e) => {
            warn!("Instance may still be registered: {:#}", e);
            Some(e)
        }
    }
}

/// Load the Nacos config and start watching it when Nacos is enabled
async fn start_watcher(
    config: &Config,
    integrations: &IntegrationRegistry,
) -> Result<Option<RunningWatcher>> {
    let Some(nacos) = config.nacos() else {
        return Ok(None);
    };
    let data_id = nacos.data_id.clone();

    let source = integrations
        .create_config_source(&ConfigSourceConfig::Nacos(nacos))
        .await?;

    let (watcher, handle, events) = ConfigWatcher::<serde_json::Value>::new(
        source,
        svckit_core::watcher::DEFAULT_EVENT_CHANNEL_CAPACITY,
    )
    .await
    .map_err(|e| anyhow::anyhow!("init nacos fail: {}", e))?;

    info!("Loaded config {} ({} bytes)", data_id, handle.current().to_string().len());

    let watcher = watcher.on_change(|value: &serde_json::Value| {
        debug!("Applied config: {}", value);
    });

    tokio::spawn(log_events(events));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(async move { watcher.run_with_shutdown(Some(shutdown_rx)).await });

    Ok(Some(RunningWatcher { shutdown_tx, task }))
}

async fn log_events(mut events: mpsc::Receiver<WatchEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            WatchEvent::Started { source } => info!("Watching config through {}", source),
            WatchEvent::Updated { data_id, group, md5 } => {
                info!("Config {}/{} updated (md5 {})", group, data_id, md5)
            }
            WatchEvent::Unchanged { data_id, md5 } => {
                debug!("Config {} reported changed but content is identical (md5 {})", data_id, md5)
            }
            WatchEvent::DecodeFailed { data_id, error } => {
                warn!("Config {} update rejected, keeping previous value: {}", data_id, error)
            }
            WatchEvent::Stopped { reason } => info!("Config watcher stopped: {}", reason),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
