use directories::ProjectDirs;
use once_cell::sync::Lazy;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::unwrap_or_exit::UnwrapOrExit;

pub static ENV_PREFIX: Lazy<String> = Lazy::new(|| "OMSHUT".to_string());

pub static SETTINGS: Lazy<Settings> = Lazy::new(Settings::default);

pub const DEFAULT_SUN_API: &str = "http://api.sunrise-sunset.org/json";

/// Delay between two device commands, keeps the gateway from being flooded.
pub const TRIGGER_PACING: Duration = Duration::from_secs(3);

/// An output triggered less than this many hours ago is not triggered again.
pub const TRIGGER_SUPPRESSION_HOURS: i64 = 20;

pub fn env_name(name: &str) -> String {
    format!("{}_{}", *ENV_PREFIX, name)
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub config_file: PathBuf,
    pub history_file: PathBuf,
    pub sun_api_url: String,
    pub http_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let config_file = generic_setting("CONFIG", get_config_dir().join("config.json"));
        let history_file = generic_setting("HISTORY", get_data_dir().join("history.json"));
        let sun_api_url = string_setting("SUN_API", DEFAULT_SUN_API);
        let http_timeout = Duration::from_secs(number_setting("HTTP_TIMEOUT", 30u64));

        Self {
            config_file,
            history_file,
            sun_api_url,
            http_timeout,
        }
    }
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("be", "openmotics", env!("CARGO_PKG_NAME"))
}

pub fn get_data_dir() -> PathBuf {
    if let Some(s) = env::var_os(env_name("DATA")) {
        PathBuf::from(s)
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

pub fn get_config_dir() -> PathBuf {
    if let Some(s) = env::var_os(env_name("CONFIG_DIR")) {
        PathBuf::from(s)
    } else if let Some(proj_dirs) = project_directory() {
        proj_dirs.config_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".config")
    }
}

fn string_setting(name: &str, default: impl Into<String>) -> String {
    env::var(env_name(name)).ok().unwrap_or(default.into())
}

fn number_setting<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env::var(env_name(name))
        .ok()
        .map(|value| value.parse::<T>().unwrap_or_exit(&format!("{} is not a valid number", env_name(name))))
        .unwrap_or(default)
}

fn generic_setting<T>(name: &str, default: T) -> T
where
    T: From<String>,
{
    env::var(env_name(name)).ok().map(T::from).unwrap_or(default)
}
