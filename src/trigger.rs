use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    decision::ShutterAction,
    history::{HistoryError, HistoryFile},
    openmotics::{DeviceError, OutputController},
};

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Cannot trigger {action}: {source}")]
    Device {
        action: ShutterAction,
        #[source]
        source: DeviceError,
    },
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// What happened to the actions handed to [`TriggerExecutor::trigger_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerReport {
    pub triggered: usize,
    pub already_triggered: usize,
    pub dry_run: usize,
}

pub struct TriggerExecutor<'a, C> {
    controller: &'a C,
    history: &'a HistoryFile,
    dry_run: bool,
    pacing: Duration,
}

impl<'a, C: OutputController> TriggerExecutor<'a, C> {
    pub fn new(controller: &'a C, history: &'a HistoryFile, dry_run: bool, pacing: Duration) -> Self {
        Self {
            controller,
            history,
            dry_run,
            pacing,
        }
    }

    /// Activates the output of every action that was not already triggered within the suppression window.
    ///
    /// Actions run one after another with a pause after each real command. The first device or history
    /// failure aborts the remaining actions; outputs triggered before it stay recorded.
    pub async fn trigger_all(&self, actions: &[ShutterAction], now: DateTime<Utc>) -> Result<TriggerReport, TriggerError> {
        let mut report = TriggerReport::default();

        for action in actions {
            log::info!("Triggering output [{}] in room [{}]", action.output, action.room);

            if self.history.was_triggered_recently(action.output, now)? {
                log::info!("Output [{}] was already triggered", action.output);
                report.already_triggered += 1;
                continue;
            }

            if self.dry_run {
                log::warn!("DRY RUN; not triggering output [{}]", action.output);
                report.dry_run += 1;
                continue;
            }

            self.controller
                .set_output(action.output, true)
                .await
                .map_err(|source| TriggerError::Device {
                    action: action.clone(),
                    source,
                })?;
            self.history.record_trigger(action.output, now)?;
            report.triggered += 1;

            log::debug!("Sleeping for {:?}", self.pacing);
            tokio::time::sleep(self.pacing).await;
        }

        Ok(report)
    }
}
