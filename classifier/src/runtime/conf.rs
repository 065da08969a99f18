use std::{
    error::Error,
    fmt,
    net::Ipv4Addr,
    path::{Path, PathBuf},
    time::Duration,
};

use classifier_common::{IN_FLIGHT_MAX_ENTRIES, ProtocolId};
use figment::{
    Figment,
    providers::{Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::runtime::{
    cli::Cli,
    conf::conf_serde::{duration, level},
};

pub mod conf_serde;

/// Where classification runs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// TC programs in the kernel, dispatching with tail calls.
    #[default]
    Ebpf,
    /// Frames captured from the interface and classified in worker threads.
    Userspace,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Ebpf => f.write_str("ebpf"),
            Backend::Userspace => f.write_str("userspace"),
        }
    }
}

/// Protocols that can be enabled for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tls,
    Http,
}

impl Protocol {
    pub fn id(self) -> ProtocolId {
        match self {
            Protocol::Tls => ProtocolId::Tls,
            Protocol::Http => ProtocolId::Http,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InFlightConf {
    /// Upper bound on tracked connections. Inserts past it are dropped.
    pub max_entries: usize,
}

impl Default for InFlightConf {
    fn default() -> Self {
        Self {
            max_entries: IN_FLIGHT_MAX_ENTRIES as usize,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TelemetryConf {
    /// How often failure counters are read and published.
    #[serde(with = "duration")]
    pub interval: Duration,
}

impl Default for TelemetryConf {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MetricsConf {
    /// Enable the metrics server.
    pub enabled: bool,
    /// The network address the metrics server will listen on.
    pub listen_address: String,
    /// The port the metrics server will listen on.
    pub port: u16,
}

impl Default for MetricsConf {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_address: Ipv4Addr::UNSPECIFIED.to_string(),
            port: 10250,
        }
    }
}

/// Agent configuration, layered as defaults < config file < CLI/env.
#[derive(Debug, Deserialize, Serialize)]
pub struct Conf {
    /// Path the configuration was loaded from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    #[serde(with = "level")]
    pub log_level: Level,

    /// Interfaces to observe.
    pub interfaces: Vec<String>,

    #[serde(default)]
    pub backend: Backend,

    /// Protocols that get a handler. Disabled ones are still fingerprinted but
    /// every match counts as a failed dispatch.
    #[serde(default = "defaults::protocols")]
    pub protocols: Vec<Protocol>,

    #[serde(default)]
    pub in_flight: InFlightConf,

    /// Logical CPUs for the userspace backend.
    /// - Default: 2
    #[serde(default = "defaults::workers")]
    pub workers: usize,

    #[serde(default)]
    pub telemetry: TelemetryConf,

    /// Configuration for the Metrics server (e.g., for Prometheus scraping).
    #[serde(default)]
    pub metrics: MetricsConf,

    /// Maximum time to wait for background tasks to stop.
    /// - Default: 5s
    #[serde(default = "defaults::shutdown_timeout", with = "duration")]
    pub shutdown_timeout: Duration,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            config_path: None,
            log_level: Level::INFO,
            interfaces: Vec::from(["eth0".to_string()]),
            backend: Backend::default(),
            protocols: defaults::protocols(),
            in_flight: InFlightConf::default(),
            workers: defaults::workers(),
            telemetry: TelemetryConf::default(),
            metrics: MetricsConf::default(),
            shutdown_timeout: defaults::shutdown_timeout(),
        }
    }
}

mod defaults {
    use std::time::Duration;

    use super::Protocol;

    pub fn protocols() -> Vec<Protocol> {
        Vec::from([Protocol::Tls, Protocol::Http])
    }

    pub fn workers() -> usize {
        2
    }

    pub fn shutdown_timeout() -> Duration {
        Duration::from_secs(5)
    }
}

impl Conf {
    /// Builds the configuration from defaults, the optional YAML file named by
    /// `cli.config`, and finally the flags and environment captured in `cli`.
    ///
    /// # Errors
    /// * `ConfigError::NoConfigFile` - the named file does not exist.
    /// * `ConfigError::InvalidConfigPath` - the path is not a regular file.
    /// * `ConfigError::InvalidExtension` - the file is not `.yaml`/`.yml`.
    /// * `ConfigError::Extraction` - a value failed to parse.
    /// * `ConfigError::Invalid` - the merged values are unusable.
    pub fn new(cli: Cli) -> Result<(Self, Cli), ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Conf::default()));

        let config_path_to_store = if let Some(config_path) = &cli.config {
            validate_config_path(config_path)?;
            figment = figment.merge(Yaml::file(config_path));
            Some(config_path.clone())
        } else {
            None
        };

        figment = figment.merge(Serialized::defaults(&cli));

        let mut conf: Conf = figment.extract()?;
        conf.validate()?;

        conf.config_path = config_path_to_store;
        Ok((conf, cli))
    }

    /// Enabled protocols as dispatch indices, without duplicates.
    pub fn protocol_ids(&self) -> Vec<ProtocolId> {
        let mut ids: Vec<ProtocolId> = Vec::with_capacity(self.protocols.len());
        for id in self.protocols.iter().map(|p| p.id()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.interfaces.is_empty() {
            return Err(ConfigError::Invalid("at least one interface is required".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.workers > classifier_common::MAX_CPUS as usize {
            return Err(ConfigError::Invalid(format!(
                "workers must not exceed {}",
                classifier_common::MAX_CPUS
            )));
        }
        if self.in_flight.max_entries == 0 {
            return Err(ConfigError::Invalid("in_flight.max_entries must be at least 1".into()));
        }
        if self.telemetry.interval.is_zero() {
            return Err(ConfigError::Invalid("telemetry.interval must be non-zero".into()));
        }
        Ok(())
    }
}

/// Validates that the given path points to an existing file with a supported extension.
fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
    if !path.is_file() {
        if path.exists() {
            return Err(ConfigError::InvalidConfigPath(
                path.to_string_lossy().into_owned(),
            ));
        }
        return Err(ConfigError::NoConfigFile);
    }

    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => Ok(()),
        Some(ext) => Err(ConfigError::InvalidExtension(ext.to_string())),
        None => Err(ConfigError::InvalidExtension("none".to_string())),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    /// The specified configuration file does not exist.
    NoConfigFile,
    /// The path exists but is not a file (e.g., it's a directory).
    InvalidConfigPath(String),
    /// The file has an unsupported extension.
    InvalidExtension(String),
    /// Failed to extract configuration data.
    Extraction(Box<figment::Error>),
    /// Values parsed but cannot be used together.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoConfigFile => write!(f, "no config file provided"),
            ConfigError::InvalidConfigPath(p) => write!(f, "path '{p}' is not a valid file"),
            ConfigError::InvalidExtension(ext) => {
                write!(f, "invalid file extension '.{ext}', expected 'yaml' or 'yml'")
            }
            ConfigError::Extraction(e) => write!(f, "configuration error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Extraction(e) => Some(e),
            _ => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::Extraction(Box::from(e))
    }
}
