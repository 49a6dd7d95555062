use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use color_eyre::eyre::{Result, WrapErr};

use crate::{
    config::Config,
    decision::{decide, Decision, RunContext},
    history::HistoryFile,
    openmotics::OutputController,
    sun_times::SunriseSunsetClient,
    trigger::{TriggerExecutor, TriggerReport},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub decision: Decision,
    pub rise: TriggerReport,
    pub shut: TriggerReport,
}

fn write_report(f: &mut fmt::Formatter<'_>, name: &str, due: usize, report: &TriggerReport) -> fmt::Result {
    write!(
        f,
        "{}: {} due, {} triggered, {} already triggered, {} dry run",
        name, due, report.triggered, report.already_triggered, report.dry_run
    )
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_report(f, "rise", self.decision.rise.len(), &self.rise)?;
        f.write_str("; ")?;
        write_report(f, "shut", self.decision.shut.len(), &self.shut)
    }
}

/// One scheduler invocation: look up the sun, decide, trigger rising then shutting.
pub struct ShutterRun<'a, C> {
    config: &'a Config,
    sun_client: &'a SunriseSunsetClient,
    executor: TriggerExecutor<'a, C>,
}

impl<'a, C: OutputController> ShutterRun<'a, C> {
    pub fn new(
        config: &'a Config,
        sun_client: &'a SunriseSunsetClient,
        controller: &'a C,
        history: &'a HistoryFile,
        pacing: Duration,
    ) -> Self {
        Self {
            config,
            sun_client,
            executor: TriggerExecutor::new(controller, history, config.dry_run, pacing),
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let location = &self.config.location;
        let local_now = now.with_timezone(&location.timezone);

        let sun = self
            .sun_client
            .fetch(location.latitude, location.longitude, local_now.date_naive())
            .await
            .wrap_err("Cannot look up today's sunrise and sunset")?;

        let ctx = RunContext {
            local_now,
            sun,
            latitude: location.latitude,
            longitude: location.longitude,
        };
        log::info!("Local time: {}", ctx.local_now);
        log::info!("Sunrise: {}", ctx.sun.sunrise);
        log::info!("Sunset: {}", ctx.sun.sunset);

        let decision = decide(&ctx, &self.config.shutters);
        if decision.is_empty() {
            log::info!("Nothing to do");
        }

        if !decision.rise.is_empty() {
            log::info!("Rising shutters: {}", join(&decision.rise));
        }
        let rise = self
            .executor
            .trigger_all(&decision.rise, now)
            .await
            .wrap_err("Rising shutters failed")?;

        if !decision.shut.is_empty() {
            log::info!("Shutting shutters: {}", join(&decision.shut));
        }
        let shut = self
            .executor
            .trigger_all(&decision.shut, now)
            .await
            .wrap_err("Shutting shutters failed")?;

        let summary = RunSummary { decision, rise, shut };
        log::info!("Finished: {}", summary);
        Ok(summary)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
