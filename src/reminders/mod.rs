//! Reminder parsing and daily medication timers.
//!
//! Times are wall-clock `HH:MM` in local time. A time that is now or already
//! past today refers to tomorrow.

pub mod timers;

pub use timers::{Announcer, MedicationTimers, ReminderTimers};

use crate::error::{AuraError, Result};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use std::time::Duration;

pub const USAGE_MESSAGE: &str =
    "Tell me what to remind you about using 'remind me to ... at HH:MM'.";
pub const BAD_TIME_MESSAGE: &str = "I couldn't parse the time. Use HH:MM format.";

const TRIGGER: &str = "remind me to";

/// Parse `"HH:MM"` (hour 0-23, minute 0-59).
///
/// Surrounding whitespace and a trailing period (as speech recognizers like
/// to add) are ignored.
///
/// # Errors
///
/// Returns [`AuraError::Reminder`] for anything else.
pub fn parse_clock_time(raw: &str) -> Result<NaiveTime> {
    let s = raw.trim().trim_end_matches('.').trim();
    let bad = || AuraError::Reminder(format!("invalid time {raw:?}"));
    let (h, m) = s.split_once(':').ok_or_else(bad)?;
    let hour: u32 = h.trim().parse().map_err(|_| bad())?;
    let minute: u32 = m.trim().parse().map_err(|_| bad())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(bad)
}

/// Time from `now` until the next occurrence of `at`.
///
/// If `at` is now or already past today, the occurrence is tomorrow, so the
/// result is always in `(0, 24h]`.
#[must_use]
pub fn delay_until(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let mut target = now.date().and_time(at);
    if target <= now {
        target += TimeDelta::days(1);
    }
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// A parsed "remind me" command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderRequest {
    /// `remind me to {task} at {time}` with a valid time.
    Timed {
        task: String,
        time: NaiveTime,
        /// The time as the user said it.
        spoken: String,
    },
    /// A time was given but could not be parsed.
    BadTime,
    /// No `" at "` in the command.
    Untimed { task: String },
    /// The command does not contain "remind me to".
    Usage,
}

impl ReminderRequest {
    /// The reply to show and speak.
    #[must_use]
    pub fn reply(&self) -> String {
        match self {
            Self::Timed { task, spoken, .. } => {
                format!("Okay, I'll remind you to {task} at {spoken}.")
            }
            Self::BadTime => BAD_TIME_MESSAGE.to_owned(),
            Self::Untimed { task } => {
                format!("Okay, I'll remind you to {task} (but no time was given).")
            }
            Self::Usage => USAGE_MESSAGE.to_owned(),
        }
    }
}

/// Parse a (lower-cased) reminder command.
///
/// Everything after the first "remind me to" is split on the last `" at "`.
#[must_use]
pub fn parse_reminder(command: &str) -> ReminderRequest {
    let Some((_, rest)) = command.split_once(TRIGGER) else {
        return ReminderRequest::Usage;
    };
    let rest = rest.trim();
    match rest.rsplit_once(" at ") {
        Some((task, raw_time)) => match parse_clock_time(raw_time) {
            Ok(time) => ReminderRequest::Timed {
                task: task.trim().to_owned(),
                time,
                spoken: raw_time.trim().trim_end_matches('.').to_owned(),
            },
            Err(_) => ReminderRequest::BadTime,
        },
        None => ReminderRequest::Untimed {
            task: rest.to_owned(),
        },
    }
}
