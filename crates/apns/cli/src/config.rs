//! Command-line flags and the optional config file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use apns_core::{Environment, MAX_COLLAPSE_ID_LEN, NotificationOptions, Priority, PushType};
use apns_push::{ClientConfig, HeaderError};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no certificate path given, pass --certificate-path or set certificate_path in {0}")]
    MissingCertificatePath(PathBuf),
    #[error(transparent)]
    InvalidHeader(#[from] HeaderError),
    #[error("collapse id is {0} bytes, at most {MAX_COLLAPSE_ID_LEN} are allowed")]
    CollapseIdTooLong(usize),
}

/// Check a topic before it is used for every notification of a run.
pub fn check_topic(topic: &str) -> Result<(), ConfigError> {
    apns_push::check_header("apns-topic", topic)?;
    Ok(())
}

fn check_collapse_id(collapse_id: &str) -> Result<(), ConfigError> {
    if collapse_id.len() > MAX_COLLAPSE_ID_LEN {
        return Err(ConfigError::CollapseIdTooLong(collapse_id.len()));
    }
    apns_push::check_header("apns-collapse-id", collapse_id)?;
    Ok(())
}

const ABOUT: &str = "Listens to STDIN to send notifications and writes APNs response code and reason to STDOUT.";

const LONG_ABOUT: &str = r#"Listens to STDIN to send notifications and writes APNs response code and reason to STDOUT.
The expected format is: <DeviceToken> <APNS Payload>
Example: aff0c63d9eaa63ad161bafee732d5bc2c31f66d552054718ff19ce314371e5d0 {"aps": {"alert": "hi"}}"#;

#[derive(Debug, clap::Parser)]
#[command(name = "apns-push", about = ABOUT, long_about = LONG_ABOUT)]
pub struct Cli {
    /// Path to the PEM file holding the client certificate and its private key.
    #[arg(short = 'c', long, env = "APNS_CERTIFICATE_PATH")]
    pub certificate_path: Option<PathBuf>,

    /// Topic of the notifications, typically the bundle ID of the app.
    /// Defaults to the topic named in the certificate.
    #[arg(short, long, env = "APNS_TOPIC")]
    pub topic: Option<String>,

    /// APNs server to send notifications to: production or development.
    #[arg(short, long, env = "APNS_MODE")]
    pub mode: Option<Environment>,

    /// Delivery priority: high, normal or low.
    #[arg(long, env = "APNS_PRIORITY")]
    pub priority: Option<Priority>,

    /// Value of the apns-push-type header, e.g. alert or background.
    #[arg(long, env = "APNS_PUSH_TYPE")]
    pub push_type: Option<PushType>,

    /// UNIX time after which APNs stops trying to deliver.
    #[arg(long, env = "APNS_EXPIRATION")]
    pub expiration: Option<u64>,

    /// Identifier used to coalesce notifications on the device.
    #[arg(long, env = "APNS_COLLAPSE_ID")]
    pub collapse_id: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, env = "APNS_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Config file. Defaults to apns-push/config.toml in the user config directory, if present.
    #[arg(long, env = "APNS_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Contents of the TOML config file. Every key is optional; flags win.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub certificate_path: Option<PathBuf>,
    pub topic: Option<String>,
    pub mode: Option<Environment>,
    pub priority: Option<Priority>,
    pub push_type: Option<PushType>,
    pub expiration: Option<u64>,
    pub collapse_id: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("apns-push")
            .join("config.toml")
    }
}

/// Fully resolved run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub certificate_path: PathBuf,
    /// Explicit topic; `None` means use the certificate's.
    pub topic: Option<String>,
    pub environment: Environment,
    pub options: NotificationOptions,
    pub timeout: Option<Duration>,
}

impl Settings {
    /// Merge flags with the config file, flags taking precedence.
    pub fn resolve(cli: Cli) -> Result<Self, ConfigError> {
        let (path, file) = match &cli.config {
            Some(path) => (path.clone(), FileConfig::load(path)?),
            None => {
                let path = FileConfig::default_path();
                let file = if path.exists() {
                    FileConfig::load(&path)?
                } else {
                    FileConfig::default()
                };
                (path, file)
            }
        };

        tracing::debug!(path = %path.display(), "resolved config file");
        Self::merge(cli, file, &path)
    }

    fn merge(cli: Cli, file: FileConfig, path: &Path) -> Result<Self, ConfigError> {
        let certificate_path = cli
            .certificate_path
            .or(file.certificate_path)
            .ok_or_else(|| ConfigError::MissingCertificatePath(path.to_path_buf()))?;

        let topic = cli.topic.or(file.topic);
        if let Some(topic) = &topic {
            check_topic(topic)?;
        }

        let collapse_id = cli.collapse_id.or(file.collapse_id);
        if let Some(collapse_id) = &collapse_id {
            check_collapse_id(collapse_id)?;
        }

        Ok(Self {
            certificate_path,
            topic,
            environment: cli.mode.or(file.mode).unwrap_or_default(),
            options: NotificationOptions {
                apns_id: None,
                collapse_id,
                expiration: cli.expiration.or(file.expiration),
                priority: cli.priority.or(file.priority),
                push_type: cli.push_type.or(file.push_type),
            },
            timeout: cli.timeout.or(file.timeout_secs).map(Duration::from_secs),
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(timeout) = self.timeout {
            config.request_timeout = timeout;
        }
        config
    }
}
