/// Layered configuration: environment, config file, built-in defaults
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Prefix of every environment variable read by [`ConfigLayer::from_env`].
pub const ENV_VAR_PREFIX: &str = "CLUBREADYBOOKER_";
/// Name of the config file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";
/// Config directory under `$HOME`.
pub const HOME_CONFIG_DIR: &str = ".config/clubready_booker";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting could not be converted to its type
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The timezone is not an IANA zone name
    #[error("Unknown timezone {name:?}")]
    UnknownTimezone { name: String },

    /// The config directory named in the environment does not exist
    #[error("Config directory does not exist: {}", path.display())]
    MissingConfigDir { path: PathBuf },

    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Days ahead of now a class may be booked
    pub bookable_range: u32,
    /// Cap on calendar events fetched per run
    pub max_results: usize,
    /// Timezone of the gym's schedule
    pub timezone: Tz,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bookable_range: 2,
            max_results: 100,
            timezone: chrono_tz::America::New_York,
        }
    }
}

/// One source of settings; unset keys fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigLayer {
    #[serde(default)]
    pub bookable_range: Option<u32>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub config_dir: Option<PathBuf>,
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
        value,
    })
}

impl ConfigLayer {
    /// Builds a layer from `CLUBREADYBOOKER_*` variables.
    ///
    /// # Arguments
    /// * `vars` - Environment pairs, e.g. `std::env::vars()`
    pub fn from_env<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut layer = Self::default();
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_VAR_PREFIX) else {
                continue;
            };
            match key {
                "BOOKABLE_RANGE" => {
                    layer.bookable_range = Some(parse_env("bookable_range", value)?)
                }
                "MAX_RESULTS" => layer.max_results = Some(parse_env("max_results", value)?),
                "TIMEZONE" => layer.timezone = Some(value),
                "CONFIG_DIR" => layer.config_dir = Some(PathBuf::from(value)),
                _ => debug!(variable = %name, "Ignoring unknown config variable"),
            }
        }
        Ok(layer)
    }

    /// Loads a layer from a JSON config file.
    ///
    /// A missing file is not an error; it yields an empty layer.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(
                path = %path.display(),
                "Config file not found, using environment and defaults only"
            );
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Config {
    /// Resolves each setting from `env`, then `file`, then `defaults`.
    pub fn resolve(
        env: &ConfigLayer,
        file: &ConfigLayer,
        defaults: &Config,
    ) -> Result<Self, ConfigError> {
        let timezone = match env.timezone.as_ref().or(file.timezone.as_ref()) {
            Some(name) => name
                .trim()
                .parse::<Tz>()
                .map_err(|_| ConfigError::UnknownTimezone { name: name.clone() })?,
            None => defaults.timezone,
        };

        Ok(Self {
            bookable_range: env
                .bookable_range
                .or(file.bookable_range)
                .unwrap_or(defaults.bookable_range),
            max_results: env
                .max_results
                .or(file.max_results)
                .unwrap_or(defaults.max_results),
            timezone,
        })
    }
}

/// Finds the config directory.
///
/// An explicit directory (from the environment or the command line) must
/// exist. Otherwise `$HOME/.config/clubready_booker` is used if present.
pub fn locate_config_dir(
    explicit: Option<&Path>,
    home: Option<&Path>,
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(dir) = explicit {
        if !dir.is_dir() {
            return Err(ConfigError::MissingConfigDir {
                path: dir.to_path_buf(),
            });
        }
        debug!(path = %dir.display(), "Using config dir");
        return Ok(Some(dir.to_path_buf()));
    }

    let candidate = home.map(|h| h.join(HOME_CONFIG_DIR));
    match candidate {
        Some(dir) if dir.is_dir() => {
            debug!(path = %dir.display(), "Using config dir");
            Ok(Some(dir))
        }
        _ => Ok(None),
    }
}
