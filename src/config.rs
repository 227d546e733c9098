//! Configuration management for the overseer server.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::AppState;
use crate::cipher::make_secret_key;
use crate::cli::Args;
use crate::clock::SystemClock;
use crate::error::OverseerError;
use crate::overseer::{CookieOverseer, Overseer, StorageOverseer};
use crate::session::{CookieOptions, DEFAULT_COOKIE_NAME};
use crate::storer::{
    Cleaner, DiskStorer, ExpiryPolicy, MemoryStorer, RedisStorer, DEFAULT_CLEAN_INTERVAL,
    DEFAULT_MAX_AGE,
};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerSection,
    /// Session configuration.
    pub session: SessionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable graceful shutdown.
    pub graceful_shutdown: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            graceful_shutdown: true,
        }
    }
}

/// Where session values live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Encrypted client-side cookie.
    Cookie,
    /// Process memory.
    #[default]
    Memory,
    /// One file per session.
    Disk,
    /// Redis keys with native TTL.
    Redis,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cookie => "cookie",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Redis => "redis",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cookie" => Ok(Self::Cookie),
            "memory" => Ok(Self::Memory),
            "disk" => Ok(Self::Disk),
            "redis" => Ok(Self::Redis),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

/// Session configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Session backend.
    pub backend: Backend,
    /// Server-side session lifetime. Zero together with a zero clean
    /// interval keeps sessions forever.
    pub max_age_secs: u64,
    /// How often the memory and disk sweepers run.
    pub clean_interval_secs: u64,
    /// Renew the session on every request.
    pub reset_expiry: bool,
    /// Directory for the disk backend.
    pub disk_dir: PathBuf,
    /// Connection URL for the redis backend.
    pub redis_url: String,
    /// Key namespace for the redis backend.
    pub redis_key_prefix: String,
    /// Base64 encryption key for the cookie backend, 16 or 32 bytes.
    pub secret_key: Option<String>,
    /// Session cookie attributes.
    pub cookie: CookieSection,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            max_age_secs: DEFAULT_MAX_AGE.as_secs(),
            clean_interval_secs: DEFAULT_CLEAN_INTERVAL.as_secs(),
            reset_expiry: true,
            disk_dir: PathBuf::from("sessions"),
            redis_url: "redis://127.0.0.1/".to_string(),
            redis_key_prefix: "overseer".to_string(),
            secret_key: None,
            cookie: CookieSection::default(),
        }
    }
}

/// Session cookie section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSection {
    pub name: String,
    pub domain: Option<String>,
    pub path: String,
    /// Zero makes a browser-session cookie.
    pub max_age_secs: u64,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for CookieSection {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            domain: None,
            path: "/".to_string(),
            max_age_secs: 0,
            secure: true,
            http_only: true,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source (for testing).
    pub fn apply_env_from<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = var("OVERSEER_HOST") {
            self.server.host = host;
        }

        if let Some(port) = var("OVERSEER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }

        if let Some(backend) = var("OVERSEER_BACKEND") {
            self.session.backend = backend.parse()?;
        }

        if let Some(key) = var("OVERSEER_SECRET_KEY") {
            if !key.is_empty() {
                self.session.secret_key = Some(key);
            }
        }

        if let Some(dir) = var("OVERSEER_DISK_DIR") {
            self.session.disk_dir = PathBuf::from(dir);
        }

        if let Some(url) = var("OVERSEER_REDIS_URL") {
            self.session.redis_url = url;
        }

        if let Some(level) = var("OVERSEER_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }

        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(backend) = args.backend {
            self.session.backend = backend;
        }

        if args.insecure_cookies {
            self.session.cookie.secure = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env()?;
        config.apply_args(args);

        Ok(config)
    }

    /// Address the server listens on.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;
        Ok(SocketAddr::new(host, self.server.port))
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

impl SessionSection {
    /// Server-side expiry policy for the memory and disk backends.
    pub fn expiry_policy(&self) -> Result<ExpiryPolicy, ConfigError> {
        ExpiryPolicy::new(
            Duration::from_secs(self.max_age_secs),
            Duration::from_secs(self.clean_interval_secs),
        )
        .map_err(ConfigError::Session)
    }

    pub fn cookie_options(&self) -> CookieOptions {
        let cookie = &self.cookie;
        let mut options = CookieOptions::new()
            .with_name(cookie.name.clone())
            .with_path(cookie.path.clone())
            .with_max_age(Duration::from_secs(cookie.max_age_secs))
            .with_secure(cookie.secure)
            .with_http_only(cookie.http_only);

        if let Some(ref domain) = cookie.domain {
            options = options.with_domain(domain.clone());
        }
        options
    }

    /// Decode the configured cookie encryption key, if any.
    pub fn decode_secret_key(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let Some(ref encoded) = self.secret_key else {
            return Ok(None);
        };

        let key = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ConfigError::InvalidSecretKey(e.to_string()))?;
        if key.len() != 16 && key.len() != 32 {
            return Err(ConfigError::InvalidSecretKey(format!(
                "expected 16 or 32 bytes, got {}",
                key.len()
            )));
        }
        Ok(Some(key))
    }

    /// Build the overseer and, for swept backends, start the sweeper.
    pub async fn build_state(&self) -> Result<AppState, ConfigError> {
        let options = self.cookie_options();

        let (overseer, cleaner): (Arc<dyn Overseer>, Option<Arc<dyn Cleaner>>) =
            match self.backend {
                Backend::Cookie => {
                    let key = match self.decode_secret_key()? {
                        Some(key) => key,
                        None => {
                            warn!("no secret key configured, cookies will not survive a restart");
                            make_secret_key()
                        }
                    };
                    let overseer =
                        CookieOverseer::new(options, &key).map_err(ConfigError::Session)?;
                    (Arc::new(overseer), None)
                }
                Backend::Memory => {
                    let storer = Arc::new(MemoryStorer::with_clock(
                        self.expiry_policy()?,
                        Arc::new(SystemClock),
                    ));
                    let overseer = StorageOverseer::new(options, storer.clone())
                        .map_err(ConfigError::Session)?;
                    let cleaner: Arc<dyn Cleaner> = storer;
                    (Arc::new(overseer), Some(cleaner))
                }
                Backend::Disk => {
                    let storer = Arc::new(
                        DiskStorer::with_clock(
                            self.disk_dir.clone(),
                            self.expiry_policy()?,
                            Arc::new(SystemClock),
                        )
                        .map_err(ConfigError::Session)?,
                    );
                    let overseer = StorageOverseer::new(options, storer.clone())
                        .map_err(ConfigError::Session)?;
                    let cleaner: Arc<dyn Cleaner> = storer;
                    (Arc::new(overseer), Some(cleaner))
                }
                Backend::Redis => {
                    let max_age = Duration::from_secs(self.max_age_secs);
                    let storer = RedisStorer::new(&self.redis_url, max_age)
                        .await
                        .map_err(ConfigError::Session)?
                        .with_key_prefix(self.redis_key_prefix.clone());
                    let overseer = StorageOverseer::new(options, Arc::new(storer))
                        .map_err(ConfigError::Session)?;
                    (Arc::new(overseer), None)
                }
            };

        if let Some(ref cleaner) = cleaner {
            cleaner.start_cleaner().map_err(ConfigError::Session)?;
        }

        info!("session backend: {}", self.backend);
        Ok(AppState::new(overseer, self.backend)
            .with_cleaner(cleaner)
            .with_reset_expiry(self.reset_expiry))
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// Unrecognized session backend name.
    UnknownBackend(String),
    /// Secret key is not valid base64 or has the wrong length.
    InvalidSecretKey(String),
    /// The session layer rejected the configuration.
    Session(OverseerError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::UnknownBackend(name) => write!(
                f,
                "unknown session backend '{}' (expected cookie, memory, disk or redis)",
                name
            ),
            Self::InvalidSecretKey(reason) => write!(f, "invalid secret key: {}", reason),
            Self::Session(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
