//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/livepoll.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/livepoll.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Relative paths are resolved against the home directory
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
    #[serde(default)]
    pub poll_tmp_dir: Option<PathBuf>,
    #[serde(default = "default_seed_sample_pack")]
    pub seed_sample_pack: bool,
}

fn default_base_dir() -> String {
    "livepoll".to_string()
}

fn default_seed_sample_pack() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { base_dir: default_base_dir(), poll_tmp_dir: None, seed_sample_pack: default_seed_sample_pack() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Address put into QR codes; probed from the routing table when unset
    #[serde(default)]
    pub advertise_address: Option<IpAddr>,
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address(), port: default_port(), advertise_address: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QrConfig {
    #[serde(default = "default_module_px")]
    pub module_px: u32,
    #[serde(default = "default_quiet_zone")]
    pub quiet_zone: u32,
}

fn default_module_px() -> u32 {
    crate::io::qr::DEFAULT_MODULE_PX
}

fn default_quiet_zone() -> u32 {
    crate::io::qr::DEFAULT_QUIET_ZONE
}

impl Default for QrConfig {
    fn default() -> Self {
        Self { module_px: default_module_px(), quiet_zone: default_quiet_zone() }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub qr: QrConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    base_dir: String,
    poll_tmp_dir: PathBuf,
    seed_sample_pack: bool,
    bind_address: IpAddr,
    port: u16,
    advertise_address: Option<IpAddr>,
    module_px: u32,
    quiet_zone: u32,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn default_poll_tmp_dir() -> PathBuf {
        env::temp_dir().join("livepoll")
    }

    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        let TomlConfig { storage, http, qr } = toml_config;
        Self {
            base_dir: storage.base_dir,
            poll_tmp_dir: storage.poll_tmp_dir.unwrap_or_else(Self::default_poll_tmp_dir),
            seed_sample_pack: storage.seed_sample_pack,
            bind_address: http.bind_address,
            port: http.port,
            advertise_address: http.advertise_address,
            module_px: qr.module_px,
            quiet_zone: qr.quiet_zone,
            config_file,
        }
    }

    /// Determine config file path from the command line or environment
    pub fn resolve_config_path(cli: Option<&str>) -> String {
        if let Some(path) = cli {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        DEFAULT_CONFIG_PATH.to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        anyhow::ensure!(toml_config.qr.module_px > 0, "qr.module_px must be at least 1");

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn poll_tmp_dir(&self) -> &Path {
        &self.poll_tmp_dir
    }

    pub fn seed_sample_pack(&self) -> bool {
        self.seed_sample_pack
    }

    pub fn bind_address(&self) -> IpAddr {
        self.bind_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn advertise_address(&self) -> Option<IpAddr> {
        self.advertise_address
    }

    pub fn module_px(&self) -> u32 {
        self.module_px
    }

    pub fn quiet_zone(&self) -> u32 {
        self.quiet_zone
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}
