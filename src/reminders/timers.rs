//! Fixed-delay timers for one-shot reminders and daily medications.

use super::{delay_until, parse_clock_time};
use chrono::{Local, NaiveDateTime};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Re-arm interval for medication reminders.
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Callback invoked when a timer fires: `(message, interrupt)`.
///
/// Implementations append the message to the transcript and speak it.
pub type Announcer = Arc<dyn Fn(String, bool) + Send + Sync>;

/// Local wall clock as a naive timestamp.
fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

type Handles = Mutex<Vec<JoinHandle<()>>>;

fn lock_handles(handles: &Handles) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
    handles.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The message spoken when a medication is due.
#[must_use]
pub fn medication_message(med: &str, time: &str) -> String {
    format!("It's time to take your {med} ({time}).")
}

/// Daily medication timers. [`reschedule`](Self::reschedule) replaces every
/// previously armed timer.
pub struct MedicationTimers {
    runtime: Handle,
    announce: Announcer,
    handles: Handles,
}

impl MedicationTimers {
    pub fn new(runtime: Handle, announce: Announcer) -> Self {
        Self {
            runtime,
            announce,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Cancel all armed timers and arm one per medication time.
    ///
    /// Invalid times are logged and skipped. Returns the number armed.
    pub fn reschedule(&self, schedule: &BTreeMap<String, Vec<String>>) -> usize {
        self.reschedule_at(schedule, local_now())
    }

    fn reschedule_at(
        &self,
        schedule: &BTreeMap<String, Vec<String>>,
        now: NaiveDateTime,
    ) -> usize {
        let mut handles = lock_handles(&self.handles);
        for handle in handles.drain(..) {
            handle.abort();
        }

        for (med, times) in schedule {
            for raw in times {
                let time = match parse_clock_time(raw) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(med, "skipping medication time: {e}");
                        continue;
                    }
                };
                let first = delay_until(now, time);
                let message = medication_message(med, raw.trim());
                let announce = Arc::clone(&self.announce);
                debug!(med, time = %raw, delay_secs = first.as_secs(), "medication armed");
                handles.push(self.runtime.spawn(async move {
                    tokio::time::sleep(first).await;
                    loop {
                        announce(message.clone(), true);
                        tokio::time::sleep(DAY).await;
                    }
                }));
            }
        }
        info!(count = handles.len(), "medication timers scheduled");
        handles.len()
    }

    /// Number of timers currently armed.
    #[must_use]
    pub fn armed(&self) -> usize {
        lock_handles(&self.handles)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Cancel everything.
    pub fn cancel_all(&self) {
        for handle in lock_handles(&self.handles).drain(..) {
            handle.abort();
        }
    }
}

impl Drop for MedicationTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// One-shot reminders ("remind me to ... at HH:MM").
pub struct ReminderTimers {
    runtime: Handle,
    announce: Announcer,
    handles: Handles,
}

impl ReminderTimers {
    pub fn new(runtime: Handle, announce: Announcer) -> Self {
        Self {
            runtime,
            announce,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Announce `"Reminder: {task}"` after `delay`.
    pub fn arm(&self, delay: Duration, task: &str) {
        let message = format!("Reminder: {task}");
        let announce = Arc::clone(&self.announce);
        debug!(task, delay_secs = delay.as_secs(), "reminder armed");
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            announce(message, false);
        });
        let mut handles = lock_handles(&self.handles);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Reminders still waiting to fire.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock_handles(&self.handles)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub fn cancel_all(&self) {
        for handle in lock_handles(&self.handles).drain(..) {
            handle.abort();
        }
    }
}

impl Drop for ReminderTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
