//! UI updates rendered as host events.

use crate::host::contract::EventEnvelope;
use crate::ui::{Presenter, Role, UiUpdate};
use tokio::sync::broadcast;

/// [`Presenter`] that forwards every update to the host as an event.
pub struct HostEventPresenter {
    event_tx: broadcast::Sender<EventEnvelope>,
}

impl HostEventPresenter {
    #[must_use]
    pub fn new(event_tx: broadcast::Sender<EventEnvelope>) -> Self {
        Self { event_tx }
    }
}

/// Event name and payload for one update.
#[must_use]
pub fn ui_event(update: &UiUpdate) -> (&'static str, serde_json::Value) {
    match update {
        UiUpdate::Append { role, text } => (
            "ui.append",
            serde_json::json!({"role": role, "text": text}),
        ),
        UiUpdate::Heard(text) => (
            "ui.append",
            serde_json::json!({"role": Role::User, "text": text, "heard": true}),
        ),
        UiUpdate::Status(text) => ("ui.status", serde_json::json!({"text": text})),
        UiUpdate::ListenButton(state) => (
            "ui.listen_button",
            serde_json::json!({"state": state, "label": state.label()}),
        ),
        UiUpdate::ErrorPopup(message) => {
            ("ui.error_popup", serde_json::json!({"message": message}))
        }
        UiUpdate::InfoPopup(message) => {
            ("ui.info_popup", serde_json::json!({"message": message}))
        }
        UiUpdate::Appearance {
            user_name,
            theme,
            font_size,
        } => (
            "ui.appearance",
            serde_json::json!({
                "user_name": user_name,
                "theme": theme.as_str(),
                "font_size": font_size,
            }),
        ),
    }
}

impl Presenter for HostEventPresenter {
    fn apply(&mut self, update: UiUpdate) {
        let (event, payload) = ui_event(&update);
        // No subscriber means no host attached yet.
        let _ = self.event_tx.send(EventEnvelope::fresh(event, payload));
    }
}
