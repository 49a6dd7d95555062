use app::{initialize_app, load_config};
use app_env::{initialize_logging, initialize_panic_handler};
use color_eyre::eyre::Result;
use om_shutters::settings::SETTINGS;
mod app;
mod app_env;

async fn run_application() -> Result<()> {
    initialize_panic_handler()?;

    let settings = &*SETTINGS;
    let config = load_config(settings)?;
    initialize_logging(config.debug)?;

    let app = initialize_app(settings, config)?;
    app.run().await?;

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    if let Err(e) = run_application().await {
        log::error!("{:#}", e);
        eprintln!("{} fatal error: {:?}", env!("CARGO_PKG_NAME"), e);
        Err(e)
    } else {
        Ok(())
    }
}
