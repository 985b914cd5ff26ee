use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, RwLock},
    time::Duration,
};

use chanmirror_utils::path::{is_single_component, resolve_path, xdg_config_home};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

pub const DEFAULT_UPSTREAM_CHANNEL: &str = "conda-forge";
pub const DEFAULT_PLATFORMS: [&str; 2] = ["linux-64", "noarch"];
pub const DEFAULT_PARALLEL_LIMIT: u32 = 4;
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Application's configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// Channel to mirror, either a name on anaconda.org or a full URL.
    /// Default: conda-forge
    pub upstream_channel: Option<String>,

    /// Platform subdirectories to keep in the mirror.
    /// Default: ["linux-64", "noarch"]
    pub platforms: Option<Vec<String>>,

    /// Specs that constrain every resolution.
    /// Default: []
    pub pinned_packages: Option<Vec<String>>,

    /// If true, pinned specs only constrain the solution and are not mirrored themselves.
    /// Default: false
    pub exclude_pinned: Option<bool>,

    /// If true, enables parallel downloading of packages.
    /// Default: true
    pub parallel: Option<bool>,

    /// Maximum number of parallel downloads.
    /// Default: 4
    pub parallel_limit: Option<u32>,

    /// Verify SHA-256 checksums in addition to sizes.
    /// Default: true
    pub validate_sha256: Option<bool>,

    /// Read size used while streaming package downloads, in bytes.
    /// Default: 16384
    pub chunk_size: Option<usize>,

    /// Global HTTP timeout in seconds.
    pub timeout: Option<u64>,

    /// User agent sent with every request.
    /// Default: chanmirror/<version>
    pub user_agent: Option<String>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("CHANMIRROR_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("chanmirror").join("config.toml"),
    })
});

/// Loads the configuration from [`CONFIG_PATH`] into the global [`CONFIG`].
pub fn init() -> Result<()> {
    let config = Config::new()?;
    let mut global_config = CONFIG.write().unwrap();
    *global_config = Some(config);
    Ok(())
}

/// Points subsequent [`init`] calls at another config file. `$VAR` and `~` are expanded.
pub fn set_config_path(path: &str) -> Result<()> {
    let path = resolve_path(path)?;
    let mut config_path = CONFIG_PATH.write().unwrap();
    *config_path = path;
    Ok(())
}

pub fn get_config() -> Config {
    {
        let config_guard = CONFIG.read().unwrap();
        if let Some(config) = config_guard.as_ref() {
            return config.clone();
        }
    }

    let mut config_guard = CONFIG.write().unwrap();
    config_guard.get_or_insert_with(Config::default_config).clone()
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            upstream_channel: Some(DEFAULT_UPSTREAM_CHANNEL.to_string()),
            platforms: Some(DEFAULT_PLATFORMS.iter().map(|p| p.to_string()).collect()),
            pinned_packages: Some(Vec::new()),
            exclude_pinned: Some(false),
            parallel: Some(true),
            parallel_limit: Some(DEFAULT_PARALLEL_LIMIT),
            validate_sha256: Some(true),
            chunk_size: Some(DEFAULT_CHUNK_SIZE),
            timeout: None,
            user_agent: None,
        }
    }

    /// Creates a new configuration by loading it from the configuration file.
    /// If the configuration file is not found, it uses the default configuration.
    pub fn new() -> Result<Self> {
        let config_path = CONFIG_PATH.read().unwrap().to_path_buf();
        Self::from_path(&config_path)
    }

    pub fn from_path(config_path: &Path) -> Result<Self> {
        let mut config = match fs::read_to_string(config_path) {
            Ok(content) => {
                debug!("loading configuration from {}", config_path.display());
                toml::from_str(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "no configuration at {}, using defaults",
                    config_path.display()
                );
                Self::default_config()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    /// Fills unset fields with their defaults and rejects values the mirror cannot work with.
    pub fn resolve(&mut self) -> Result<()> {
        if self.parallel_limit == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "parallel_limit",
                reason: "must be at least 1".into(),
            });
        }
        if self.chunk_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "chunk_size",
                reason: "must be at least 1".into(),
            });
        }
        if let Some(channel) = &self.upstream_channel {
            if channel.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "upstream_channel",
                    reason: "must not be empty".into(),
                });
            }
        }

        if let Some(platforms) = &mut self.platforms {
            if let Some(bad) = platforms
                .iter()
                .find(|p| p.trim().is_empty() || !is_single_component(p))
            {
                return Err(ConfigError::InvalidValue {
                    field: "platforms",
                    reason: format!("`{bad}` is not a platform name"),
                });
            }
            platforms.sort();
            platforms.dedup();
        }

        self.upstream_channel
            .get_or_insert_with(|| DEFAULT_UPSTREAM_CHANNEL.to_string());
        self.platforms
            .get_or_insert_with(|| DEFAULT_PLATFORMS.iter().map(|p| p.to_string()).collect());
        self.pinned_packages.get_or_insert_with(Vec::new);
        self.exclude_pinned.get_or_insert(false);
        self.parallel.get_or_insert(true);
        self.parallel_limit.get_or_insert(DEFAULT_PARALLEL_LIMIT);
        self.validate_sha256.get_or_insert(true);
        self.chunk_size.get_or_insert(DEFAULT_CHUNK_SIZE);

        Ok(())
    }

    /// The channel to mirror. `CHANMIRROR_UPSTREAM_CHANNEL` takes precedence over the file.
    pub fn get_upstream_channel(&self) -> String {
        if let Ok(channel) = std::env::var("CHANMIRROR_UPSTREAM_CHANNEL") {
            if !channel.trim().is_empty() {
                return channel;
            }
        }
        self.upstream_channel
            .clone()
            .unwrap_or_else(|| DEFAULT_UPSTREAM_CHANNEL.to_string())
    }

    pub fn get_platforms(&self) -> Vec<String> {
        self.platforms
            .clone()
            .unwrap_or_else(|| DEFAULT_PLATFORMS.iter().map(|p| p.to_string()).collect())
    }

    pub fn get_pinned_packages(&self) -> Vec<String> {
        self.pinned_packages.clone().unwrap_or_default()
    }

    pub fn exclude_pinned(&self) -> bool {
        self.exclude_pinned.unwrap_or(false)
    }

    /// Number of packages processed at once. Parallelism disabled means one.
    pub fn concurrency(&self) -> usize {
        if self.parallel.unwrap_or(true) {
            self.parallel_limit.unwrap_or(DEFAULT_PARALLEL_LIMIT).max(1) as usize
        } else {
            1
        }
    }

    pub fn validate_sha256(&self) -> bool {
        self.validate_sha256.unwrap_or(true)
    }

    pub fn get_chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE).max(1)
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}
