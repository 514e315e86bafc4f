//! Configuration manager for sessionkeep.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_URL: &str = "http://localhost:8000/";
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the token signing secret.
pub const SECRET_ENV: &str = "JWT_SECRET";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    #[serde(default)]
    pub name: String,
    /// Base URL embedded in confirmation and reset links.
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to token issuance.
    #[serde(default)]
    pub token: Token,
    /// Related to Argon2 configuration.
    #[serde(default, skip_serializing)]
    pub argon2: Argon2,
    /// Related to session cache.
    #[serde(default, skip_serializing)]
    pub cache: Cache,
    /// Related to automatic mail sending.
    #[serde(skip_serializing)]
    pub mail: Option<Mail>,
}

fn default_url() -> String {
    DEFAULT_URL.to_owned()
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: String::default(),
            url: default_url(),
            version: String::default(),
            path: PathBuf::default(),
            token: Token::default(),
            argon2: Argon2::default(),
            cache: Cache::default(),
            mail: None,
        }
    }
}

/// Token configuration. Lifetimes are in seconds.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    /// HMAC algorithm used to sign tokens.
    pub algorithm: Algorithm,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: u64,
    pub refresh_ttl: u64,
    pub email_ttl: u64,
}

impl Default for Token {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::HS256,
            issuer: "sessionkeep".into(),
            audience: "sessionkeep".into(),
            access_ttl: 60 * 60 * 24,    // 1 day.
            refresh_ttl: 60 * 60 * 24 * 7, // 7 days.
            email_ttl: 300,
        }
    }
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2 {
    /// Memory used while hashing, in KiB.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 4,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Session cache configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Cache {
    /// Redis URL. In-process cache when missing.
    pub address: Option<String>,
    /// Snapshot lifetime in seconds.
    pub ttl: u64,
    /// Per-call timeout in milliseconds before a call counts as a miss.
    pub timeout_ms: u64,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            address: None,
            ttl: 300,
            timeout_ms: 250,
        }
    }
}

/// Time a notifier may take to accept a message, in milliseconds.
pub const DEFAULT_NOTIFY_TIMEOUT_MS: u64 = 2000;

fn default_notify_timeout() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT_MS
}

/// RabbitMQ notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mail {
    /// Hostname:(?port) for RabbitMQ instance.
    pub address: String,
    /// RabbitMQ default vhost.
    pub vhost: Option<String>,
    /// RabbitMQ username to access queue.
    pub username: String,
    /// RabbitMQ password to access queue.
    pub password: String,
    /// Max channel connections.
    pub pool: Option<u16>,
    /// Queue name to send mailing events.
    pub queue: String,
    /// Publish timeout in milliseconds before the notification is dropped.
    #[serde(default = "default_notify_timeout")]
    pub timeout_ms: u64,
}

impl Default for Mail {
    fn default() -> Self {
        Self {
            address: String::default(),
            vhost: None,
            username: String::default(),
            password: String::default(),
            pool: None,
            queue: String::default(),
            timeout_ms: DEFAULT_NOTIFY_TIMEOUT_MS,
        }
    }
}

impl Configuration {
    /// Bound on a single notifier call.
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(
            self.mail
                .as_ref()
                .map_or(DEFAULT_NOTIFY_TIMEOUT_MS, |mail| mail.timeout_ms),
        )
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let config = match serde_yaml::from_reader(file) {
                    Ok(config) => config,
                    Err(err) => return Ok(Arc::new(self.error(err))),
                };

                Ok(Arc::new(self.finalize(config)?))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Parse a YAML document directly.
    pub fn from_yaml(yaml: &str) -> Result<Self, crate::AuthError> {
        let config: Configuration = serde_yaml::from_str(yaml)
            .map_err(|err| crate::AuthError::Configuration(err.to_string()))?;

        Self::default()
            .finalize(config)
            .map_err(|err| crate::AuthError::Configuration(err.to_string()))
    }

    fn finalize(
        &self,
        mut config: Configuration,
    ) -> Result<Self, url::ParseError> {
        // set app version.
        config.version = VERSION.to_owned();
        config.url = self.normalize_url(&config.url)?;
        Ok(config)
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found or invalid");
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}
