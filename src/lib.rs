pub mod config;
pub mod decision;
pub mod history;
pub mod local_time;
pub mod openmotics;
pub mod runner;
pub mod settings;
pub mod sun_times;
pub mod trigger;
pub mod unwrap_or_exit;
