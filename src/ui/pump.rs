//! Fixed-tick drain loop that feeds the presentation surface.

use super::queue::{UiReceiver, UiUpdate};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Default interval between mailbox drains.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// The presentation surface. Only the pump calls into it, from one task.
pub trait Presenter: Send {
    /// Apply one update. Implementations must not block for long.
    fn apply(&mut self, update: UiUpdate);
}

/// Drain the mailbox every `tick` and hand updates to `presenter` in order.
///
/// Runs until `cancel` fires, then performs one last drain so updates pushed
/// just before shutdown (e.g. "Goodbye!") still reach the surface.
pub async fn run_ui_pump<P: Presenter>(
    receiver: UiReceiver,
    mut presenter: P,
    tick: Duration,
    cancel: CancellationToken,
) -> P {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                apply_all(&receiver, &mut presenter);
            }
        }
    }

    apply_all(&receiver, &mut presenter);
    debug!("ui pump stopped");
    presenter
}

/// A panic while applying one update is logged and the rest still apply.
fn apply_all<P: Presenter>(receiver: &UiReceiver, presenter: &mut P) {
    for update in receiver.drain() {
        if catch_unwind(AssertUnwindSafe(|| presenter.apply(update))).is_err() {
            error!("presenter panicked; update skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::queue::{Role, ui_channel};

    #[derive(Default)]
    struct Recording(Vec<UiUpdate>);

    impl Presenter for Recording {
        fn apply(&mut self, update: UiUpdate) {
            self.0.push(update);
        }
    }

    /// Panics on any error popup, records everything else.
    #[derive(Default)]
    struct Fragile(Vec<UiUpdate>);

    impl Presenter for Fragile {
        fn apply(&mut self, update: UiUpdate) {
            if let UiUpdate::ErrorPopup(message) = &update {
                panic!("cannot show popup: {message}");
            }
            self.0.push(update);
        }
    }

    #[tokio::test]
    async fn panicking_update_does_not_stop_the_pump() {
        let (queue, rx) = ui_channel();
        let cancel = CancellationToken::new();

        queue.error_popup("boom");
        queue.status("Still here");
        let handle = tokio::spawn(run_ui_pump(
            rx,
            Fragile::default(),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(40)).await;
        queue.error_popup("again");
        queue.append(Role::Assistant, "after");
        cancel.cancel();

        let presenter = handle.await.expect("pump task");
        assert_eq!(
            presenter.0,
            vec![
                UiUpdate::Status("Still here".into()),
                UiUpdate::Append {
                    role: Role::Assistant,
                    text: "after".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn pump_applies_updates_then_final_drain_on_cancel() {
        let (queue, rx) = ui_channel();
        let cancel = CancellationToken::new();

        queue.append(Role::Assistant, "hello");
        let handle = tokio::spawn(run_ui_pump(
            rx,
            Recording::default(),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(40)).await;
        queue.status("Ready");
        cancel.cancel();

        let presenter = handle.await.expect("pump task");
        assert_eq!(
            presenter.0,
            vec![
                UiUpdate::Append {
                    role: Role::Assistant,
                    text: "hello".into()
                },
                UiUpdate::Status("Ready".into()),
            ]
        );
    }
}
