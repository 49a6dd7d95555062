use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::{
    config::{OutputId, ShutterConfig},
    local_time::parse_local_time,
    sun_times::SunTimes,
};

/// Everything a single run decides on. Built once at start, never changed afterwards.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub local_now: DateTime<Tz>,
    pub sun: SunTimes,
    pub latitude: f64,
    pub longitude: f64,
}

impl RunContext {
    pub fn now_utc(&self) -> DateTime<Utc> {
        self.local_now.with_timezone(&Utc)
    }

    pub fn local_date(&self) -> NaiveDate {
        self.local_now.date_naive()
    }

    pub fn timezone(&self) -> Tz {
        self.local_now.timezone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutterAction {
    pub room: String,
    pub output: OutputId,
}

impl ShutterAction {
    fn new(room: &str, output: OutputId) -> Self {
        Self {
            room: room.to_string(),
            output,
        }
    }
}

impl fmt::Display for ShutterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.room, self.output)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    pub rise: Vec<ShutterAction>,
    pub shut: Vec<ShutterAction>,
}

impl Decision {
    pub fn is_empty(&self) -> bool {
        self.rise.is_empty() && self.shut.is_empty()
    }
}

/// Splits the configured rooms into the outputs to rise and the outputs to shut right now.
///
/// Rising is gated by sunrise for everyone, and `earliest_up` can only hold a room back further.
/// Shutting is gated by sunset, except that a passed `latest_down` shuts the room regardless.
/// Both lists are computed independently, so a room can appear in both.
pub fn decide(ctx: &RunContext, shutters: &[ShutterConfig]) -> Decision {
    let now = ctx.now_utc();
    let date = ctx.local_date();
    let tz = ctx.timezone();

    if now < ctx.sun.sunrise {
        log::info!("Sun has not risen yet");
    } else if now < ctx.sun.sunset {
        log::info!("Sun is up");
    } else {
        log::info!("Sun has set");
    }

    Decision {
        rise: rooms_to_rise(ctx, now, date, &tz, shutters),
        shut: rooms_to_shut(ctx, now, date, &tz, shutters),
    }
}

fn rooms_to_rise(
    ctx: &RunContext,
    now: DateTime<Utc>,
    date: NaiveDate,
    tz: &Tz,
    shutters: &[ShutterConfig],
) -> Vec<ShutterAction> {
    if now < ctx.sun.sunrise {
        return Vec::new();
    }

    shutters
        .iter()
        .filter(|shutter| {
            if !shutter.auto_up {
                log::debug!("[{}] automatic rising disabled", shutter.room_name);
                return false;
            }
            match parse_local_time(date, tz, shutter.earliest_up.as_deref()) {
                Some(earliest_up) if earliest_up > now => {
                    log::debug!("[{}] too early to rise, waiting until {}", shutter.room_name, earliest_up);
                    false
                }
                _ => true,
            }
        })
        .map(|shutter| ShutterAction::new(&shutter.room_name, shutter.up_output))
        .collect()
}

fn rooms_to_shut(
    ctx: &RunContext,
    now: DateTime<Utc>,
    date: NaiveDate,
    tz: &Tz,
    shutters: &[ShutterConfig],
) -> Vec<ShutterAction> {
    shutters
        .iter()
        .filter(|shutter| {
            if !shutter.auto_down {
                log::debug!("[{}] automatic shutting disabled", shutter.room_name);
                return false;
            }
            if let Some(latest_down) = parse_local_time(date, tz, shutter.latest_down.as_deref()) {
                if latest_down < now {
                    log::debug!("[{}] past its latest down time {}", shutter.room_name, latest_down);
                    return true;
                }
            }
            now >= ctx.sun.sunset
        })
        .map(|shutter| ShutterAction::new(&shutter.room_name, shutter.down_output))
        .collect()
}
