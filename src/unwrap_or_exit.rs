use std::process;

/// Exit code used when a setting from the environment cannot be used.
pub const SETTINGS_EXIT_CODE: i32 = 2;

/// Turns an unusable environment setting into an immediate, readable exit.
///
/// Settings are resolved lazily before logging is up, so the message goes to stderr.
pub trait UnwrapOrExit<T> {
    fn unwrap_or_exit(self, msg: &str) -> T;
}

impl<T, E: std::fmt::Display> UnwrapOrExit<T> for Result<T, E> {
    fn unwrap_or_exit(self, msg: &str) -> T {
        self.unwrap_or_else(|e| {
            eprintln!("{}: {}: {}", env!("CARGO_PKG_NAME"), msg, e);
            process::exit(SETTINGS_EXIT_CODE)
        })
    }
}
