//! Plain terminal presenter used by `aura chat`.

use super::pump::Presenter;
use super::queue::{Role, UiUpdate};
use crate::transcript::{Transcript, format_line};
use std::io::Write;

/// Writes transcript lines, status changes and popups to a text sink.
pub struct TerminalPresenter<W: Write + Send> {
    out: W,
    transcript: Transcript,
    last_status: String,
}

impl TerminalPresenter<std::io::Stdout> {
    /// Presenter writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            transcript: Transcript::new(),
            last_status: String::new(),
        }
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        // A closed terminal is not worth crashing the assistant over.
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> Presenter for TerminalPresenter<W> {
    fn apply(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::Append { role, text } => {
                // Typed input is already visible on the terminal.
                let line = format_line(role, &text);
                self.transcript.push(role, text);
                if role != Role::User {
                    self.write(&line);
                }
            }
            UiUpdate::Heard(text) => {
                let line = format_line(Role::User, &text);
                self.transcript.push(Role::User, text);
                self.write(&line);
            }
            UiUpdate::Status(text) => {
                if text != self.last_status {
                    self.write(&format!("[{text}]\n"));
                    self.last_status = text;
                }
            }
            UiUpdate::ListenButton(state) => self.write(&format!("[{}]\n", state.label())),
            UiUpdate::ErrorPopup(message) => self.write(&format!("Error: {message}\n")),
            UiUpdate::InfoPopup(message) => self.write(&format!("Info: {message}\n")),
            UiUpdate::Appearance { user_name, .. } => {
                self.write(&format!("Hello, {user_name}\n"));
            }
        }
    }
}
