use crate::search::DEFAULT_PARALLEL_THRESHOLD;
use crate::server::framing::DEFAULT_MAX_FRAME_LEN;
use crate::server::{default_endpoint, tcp_endpoint, Endpoint, ServerOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "fzd";
const CONFIG_FILE: &str = "config.json";

/// Daemon configuration stored in the app data directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Unix socket to listen on; defaults to the per-user runtime socket
    #[serde(default)]
    pub socket_path: Option<PathBuf>,

    /// Listen on loopback TCP instead of a Unix socket
    #[serde(default)]
    pub tcp_addr: Option<String>,

    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,

    /// Per-connection read/write timeout. 0 disables it.
    #[serde(default)]
    pub io_timeout_secs: u64,

    /// Serve each connection on its own thread
    #[serde(default)]
    pub concurrent_connections: bool,

    /// Failed accepts retried before the daemon gives up
    #[serde(default)]
    pub accept_retries: u32,

    /// Lists at least this long are matched in parallel. 0 disables it.
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
}

fn default_max_frame_len() -> usize {
    DEFAULT_MAX_FRAME_LEN
}

fn default_parallel_threshold() -> usize {
    DEFAULT_PARALLEL_THRESHOLD
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            tcp_addr: None,
            max_frame_len: default_max_frame_len(),
            io_timeout_secs: 0,
            concurrent_connections: false,
            accept_retries: 0,
            parallel_threshold: default_parallel_threshold(),
        }
    }
}

impl AppConfig {
    /// Load config from the app data directory, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path).context("Failed to read config file")?;
        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Save config to the app data directory
    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Endpoint the daemon listens on and clients connect to
    pub fn endpoint(&self) -> Result<Endpoint> {
        if let Some(addr) = &self.tcp_addr {
            return tcp_endpoint(addr);
        }
        #[cfg(unix)]
        {
            if let Some(path) = &self.socket_path {
                return Ok(Endpoint::Unix(path.clone()));
            }
        }
        Ok(default_endpoint())
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_secs > 0).then(|| Duration::from_secs(self.io_timeout_secs))
    }

    pub fn to_server_options(&self) -> Result<ServerOptions> {
        let mut options = ServerOptions::new(self.endpoint()?);
        options.max_frame_len = self.max_frame_len;
        options.io_timeout = self.io_timeout();
        options.concurrent = self.concurrent_connections;
        options.accept_retries = self.accept_retries;
        Ok(options)
    }
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}
