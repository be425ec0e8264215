//! Configuration – reads/writes `~/.rover/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rover_runtime::SessionConfig;
use rover_types::{Facing, Pose, RoverError};

/// Persisted user configuration stored in `~/.rover/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Serial device the robot's radio link is attached to.
    #[serde(default = "default_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// How long one poll of the link may block, in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Start position on the floor plan (metres).
    #[serde(default = "default_start")]
    pub start_x: f64,
    #[serde(default = "default_start")]
    pub start_y: f64,

    #[serde(default)]
    pub facing: Facing,

    /// Table loaded by `/replay` when no path is given.
    #[serde(default = "default_replay_file")]
    pub replay_file: PathBuf,

    /// Infrared threshold used by `/objects`.
    #[serde(default = "default_object_threshold")]
    pub object_threshold_cm: f64,
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud_rate() -> u32 {
    57_600
}
fn default_read_timeout_ms() -> u64 {
    50
}
fn default_start() -> f64 {
    1.0
}
fn default_replay_file() -> PathBuf {
    PathBuf::from("deg_ir_sonar.txt")
}
fn default_object_threshold() -> f64 {
    rover_decoder::objects::DEFAULT_THRESHOLD
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            start_x: default_start(),
            start_y: default_start(),
            facing: Facing::default(),
            replay_file: default_replay_file(),
            object_threshold_cm: default_object_threshold(),
        }
    }
}

impl Config {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            read_timeout: self.read_timeout(),
            start_pose: Pose::at(self.start_x, self.start_y, self.facing),
        }
    }
}

/// Return the path to `~/.rover/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rover").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, RoverError> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, RoverError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        RoverError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| RoverError::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Apply `ROVER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROVER_PORT` | `port` |
/// | `ROVER_BAUD` | `baud_rate` |
/// | `ROVER_READ_TIMEOUT_MS` | `read_timeout_ms` |
/// | `ROVER_REPLAY_FILE` | `replay_file` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ROVER_PORT") {
        cfg.port = v;
    }
    if let Ok(v) = std::env::var("ROVER_BAUD")
        && let Ok(baud) = v.parse::<u32>()
    {
        cfg.baud_rate = baud;
    }
    if let Ok(v) = std::env::var("ROVER_READ_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.read_timeout_ms = ms;
    }
    if let Ok(v) = std::env::var("ROVER_REPLAY_FILE") {
        cfg.replay_file = PathBuf::from(v);
    }
}

/// Save the config to disk, creating `~/.rover/` if necessary.
pub fn save(cfg: &Config) -> Result<(), RoverError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), RoverError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            RoverError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
        // Owner-only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                RoverError::Config(format!("failed to restrict {}: {e}", parent.display()))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RoverError::Config(format!("failed to serialize config: {e}")))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| RoverError::Config(format!("failed to write {}: {e}", path.display())))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| RoverError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}
