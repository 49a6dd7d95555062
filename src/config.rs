use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use chrono_tz::Tz;
use serde::{
    de::{self, IgnoredAny, SeqAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};
use thiserror::Error;

use crate::local_time::DEFAULT_TIMEZONE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Room [{room}] uses output [{output}] for both rising and shutting")]
    SameOutput { room: String, output: OutputId },
    #[error("Location {latitude},{longitude} is out of range")]
    InvalidLocation { latitude: f64, longitude: f64 },
    #[error("Credentials are required when dry_run is disabled")]
    MissingCredentials,
}

/// Addressable output (relay channel) on the gateway.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputId(pub u32);

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutterConfig {
    pub room_name: String,
    pub up_output: OutputId,
    pub down_output: OutputId,
    pub auto_up: bool,
    pub auto_down: bool,
    /// `HH:MM` before which the shutter must not rise.
    pub earliest_up: Option<String>,
    /// `HH:MM` after which the shutter goes down, even before sunset.
    pub latest_down: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub om_host: String,
    #[serde(default)]
    pub verify_https: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
}

fn default_timezone() -> Tz {
    DEFAULT_TIMEZONE
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub debug: bool,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    pub location: Location,
    #[serde(default, deserialize_with = "deserialize_shutters")]
    pub shutters: Vec<ShutterConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let Location { latitude, longitude, .. } = self.location;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(ConfigError::InvalidLocation { latitude, longitude });
        }

        if !self.dry_run && self.credentials.is_none() {
            return Err(ConfigError::MissingCredentials);
        }

        if let Some(shutter) = self.shutters.iter().find(|s| s.up_output == s.down_output) {
            return Err(ConfigError::SameOutput {
                room: shutter.room_name.clone(),
                output: shutter.up_output,
            });
        }

        Ok(())
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

/// One `shutters` value: `[up, down, auto_up, auto_down, earliest_up, latest_down]`,
/// or the older `[up, down]` form which rises and shuts automatically without overrides.
struct RoomEntry {
    up_output: OutputId,
    down_output: OutputId,
    auto_up: bool,
    auto_down: bool,
    earliest_up: Option<String>,
    latest_down: Option<String>,
}

struct RoomEntryVisitor;

impl<'de> Visitor<'de> for RoomEntryVisitor {
    type Value = RoomEntry;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("[up, down] or [up, down, auto_up, auto_down, earliest_up, latest_down]")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let up_output = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let down_output = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(1, &self))?;

        let Some(auto_up) = seq.next_element()? else {
            return Ok(RoomEntry {
                up_output,
                down_output,
                auto_up: true,
                auto_down: true,
                earliest_up: None,
                latest_down: None,
            });
        };
        let auto_down = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(3, &self))?;
        let earliest_up: Option<String> = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(4, &self))?;
        let latest_down: Option<String> = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(5, &self))?;

        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(7, &self));
        }

        Ok(RoomEntry {
            up_output,
            down_output,
            auto_up,
            auto_down,
            earliest_up: earliest_up.filter(|v| !v.trim().is_empty()),
            latest_down: latest_down.filter(|v| !v.trim().is_empty()),
        })
    }
}

impl<'de> Deserialize<'de> for RoomEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(RoomEntryVisitor)
    }
}

fn deserialize_shutters<'de, D>(deserializer: D) -> Result<Vec<ShutterConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let rooms = BTreeMap::<String, RoomEntry>::deserialize(deserializer)?;
    Ok(rooms
        .into_iter()
        .map(|(room_name, entry)| ShutterConfig {
            room_name,
            up_output: entry.up_output,
            down_output: entry.down_output,
            auto_up: entry.auto_up,
            auto_down: entry.auto_down,
            earliest_up: entry.earliest_up,
            latest_down: entry.latest_down,
        })
        .collect())
}
