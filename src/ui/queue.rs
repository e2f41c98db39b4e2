//! Thread-safe mailbox between background work and the presentation surface.
//!
//! Background tasks (speech recognition, HTTP calls, speech output) never
//! touch the presenter directly. They push [`UiUpdate`]s into a [`UiQueue`];
//! the presenter drains the mailbox on a fixed tick (see [`super::pump`]).

use crate::config::Theme;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use serde::Serialize;
use tracing::trace;

/// Who a transcript line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Emergency,
}

/// State of the push-to-talk control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenState {
    Idle,
    Listening,
}

impl ListenState {
    /// Label shown on the microphone button.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "🎤 Start Listening",
            Self::Listening => "🔴 Listening...",
        }
    }
}

/// A single change to apply to the presentation surface.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    /// Append a line to the transcript.
    Append { role: Role, text: String },
    /// Append a user line recognized from speech rather than typed.
    Heard(String),
    /// Replace the status bar text.
    Status(String),
    /// Update the microphone button.
    ListenButton(ListenState),
    /// Show a modal error.
    ErrorPopup(String),
    /// Show a modal notice.
    InfoPopup(String),
    /// Re-style after a settings change.
    Appearance {
        user_name: String,
        theme: Theme,
        font_size: u32,
    },
}

/// Producer handle for the UI mailbox. Cheap to clone; never blocks.
#[derive(Debug, Clone)]
pub struct UiQueue {
    tx: Sender<UiUpdate>,
}

/// Consumer side of the UI mailbox, owned by the presentation loop.
#[derive(Debug)]
pub struct UiReceiver {
    rx: Receiver<UiUpdate>,
}

/// Create an unbounded mailbox.
#[must_use]
pub fn ui_channel() -> (UiQueue, UiReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (UiQueue { tx }, UiReceiver { rx })
}

impl UiQueue {
    /// Push an update. Dropped silently if the presenter has gone away.
    pub fn push(&self, update: UiUpdate) {
        if self.tx.send(update).is_err() {
            trace!("ui receiver dropped; update discarded");
        }
    }

    pub fn append(&self, role: Role, text: impl Into<String>) {
        self.push(UiUpdate::Append {
            role,
            text: text.into(),
        });
    }

    pub fn heard(&self, text: impl Into<String>) {
        self.push(UiUpdate::Heard(text.into()));
    }

    pub fn status(&self, text: impl Into<String>) {
        self.push(UiUpdate::Status(text.into()));
    }

    pub fn listen_button(&self, state: ListenState) {
        self.push(UiUpdate::ListenButton(state));
    }

    pub fn error_popup(&self, message: impl Into<String>) {
        self.push(UiUpdate::ErrorPopup(message.into()));
    }

    pub fn info_popup(&self, message: impl Into<String>) {
        self.push(UiUpdate::InfoPopup(message.into()));
    }
}

impl UiReceiver {
    /// Take everything currently queued, in push order, without blocking.
    #[must_use]
    pub fn drain(&self) -> Vec<UiUpdate> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(update) => out.push(update),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        out
    }

    /// Number of updates waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}
