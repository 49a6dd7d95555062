use std::fs::OpenOptions;

use color_eyre::eyre::Result;
use om_shutters::settings::{env_name, get_data_dir};
use once_cell::sync::Lazy;
use tracing_error::ErrorLayer;
use tracing_subscriber::{self, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, Layer};

pub static LOG_ENV: Lazy<String> = Lazy::new(|| env_name("LOGLEVEL"));

pub static LOG_FILE: Lazy<String> = Lazy::new(|| format!("{}.log", env!("CARGO_PKG_NAME")));

pub static ENV_COLOR_LOG: Lazy<bool> = Lazy::new(|| {
    std::env::var(env_name("ENV_COLOR_LOG"))
        .map(|v| v.parse::<bool>().unwrap_or(true))
        .unwrap_or(true)
});

pub static LOG_SOURCE_FILES: Lazy<bool> = Lazy::new(|| {
    std::env::var(env_name("LOG_SOURCE_FILES"))
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false)
});

pub fn initialize_panic_handler() -> Result<()> {
    std::panic::set_hook(Box::new(move |panic_info| {
        #[cfg(not(debug_assertions))]
        {
            use human_panic::{handle_dump, print_msg, Metadata};
            let meta = Metadata::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

            let file_path = handle_dump(&meta, panic_info);
            print_msg(file_path, &meta).expect("human-panic: failed to print error message to console");
        }

        log::error!("Panic occurred: {}", panic_info);

        #[cfg(debug_assertions)]
        {
            better_panic::Settings::auto()
                .most_recent_first(false)
                .lineno_suffix(true)
                .verbosity(better_panic::Verbosity::Full)
                .create_panic_handler()(panic_info);
        }

        std::process::exit(1);
    }));

    Ok(())
}

/// Console logging at `debug` level while `debug` is set, otherwise `info` and above appended to a log
/// file in the data directory.
pub fn initialize_logging(debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    std::env::set_var(
        "RUST_LOG",
        std::env::var("RUST_LOG")
            .or_else(|_| {
                std::env::var(LOG_ENV.as_str())
                    .map(|log_level| format!("{}={}", env!("CARGO_CRATE_NAME"), log_level))
            })
            .unwrap_or_else(|_| format!("{}={}", env!("CARGO_CRATE_NAME"), default_level)),
    );

    let registry = tracing_subscriber::registry().with(ErrorLayer::default());
    if debug {
        let console_subscriber = tracing_subscriber::fmt::layer()
            .with_file(*LOG_SOURCE_FILES)
            .with_line_number(*LOG_SOURCE_FILES)
            .with_target(false)
            .with_ansi(*ENV_COLOR_LOG)
            .with_filter(tracing_subscriber::filter::EnvFilter::from_default_env());
        registry.with(console_subscriber).init();
    } else {
        let directory = get_data_dir();
        std::fs::create_dir_all(&directory)?;
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(directory.join(LOG_FILE.as_str()))?;
        let file_subscriber = tracing_subscriber::fmt::layer()
            .with_file(*LOG_SOURCE_FILES)
            .with_line_number(*LOG_SOURCE_FILES)
            .with_writer(log_file)
            .with_target(false)
            .with_ansi(false)
            .with_filter(tracing_subscriber::filter::EnvFilter::from_default_env());
        registry.with(file_subscriber).init();
    }
    Ok(())
}
