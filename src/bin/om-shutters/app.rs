use chrono::Utc;
use color_eyre::eyre::{Result, WrapErr};
use om_shutters::{
    config::Config,
    history::HistoryFile,
    openmotics::OpenMoticsClient,
    runner::{RunSummary, ShutterRun},
    settings::{Settings, TRIGGER_PACING},
    sun_times::SunriseSunsetClient,
};

pub struct App {
    config: Config,
    sun_client: SunriseSunsetClient,
    gateway: Option<OpenMoticsClient>,
    history: HistoryFile,
}

pub fn load_config(settings: &Settings) -> Result<Config> {
    Config::load(&settings.config_file).wrap_err("Cannot load configuration")
}

pub fn initialize_app(settings: &Settings, config: Config) -> Result<App> {
    log::debug!("Using history file {:?}", settings.history_file);
    if config.dry_run {
        log::warn!("Dry run enabled, no shutter will move");
    }

    let sun_http = reqwest::Client::builder()
        .timeout(settings.http_timeout)
        .build()
        .wrap_err("Cannot create http client")?;
    let sun_client = SunriseSunsetClient::new(sun_http, settings.sun_api_url.clone());

    let gateway = config
        .credentials
        .as_ref()
        .map(|credentials| -> Result<OpenMoticsClient> {
            let http = reqwest::Client::builder()
                .timeout(settings.http_timeout)
                .danger_accept_invalid_certs(!credentials.verify_https)
                .build()
                .wrap_err("Cannot create gateway http client")?;
            Ok(OpenMoticsClient::new(http, credentials))
        })
        .transpose()?;

    Ok(App {
        config,
        sun_client,
        gateway,
        history: HistoryFile::new(settings.history_file.clone()),
    })
}

impl App {
    pub async fn run(&self) -> Result<RunSummary> {
        ShutterRun::new(
            &self.config,
            &self.sun_client,
            &self.gateway,
            &self.history,
            TRIGGER_PACING,
        )
        .run(Utc::now())
        .await
    }
}
