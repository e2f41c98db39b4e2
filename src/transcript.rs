//! Chat transcript formatting and history.

use crate::ui::queue::Role;

/// Render one transcript entry the way the conversation view shows it,
/// including the trailing blank line.
#[must_use]
pub fn format_line(role: Role, text: &str) -> String {
    match role {
        Role::User => format!("You: {text}\n\n"),
        Role::Assistant => format!("AURA: {text}\n\n"),
        Role::System => format!("System: {text}\n\n"),
        Role::Emergency => format!("!!! EMERGENCY: {text}\n\n"),
    }
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub role: Role,
    pub text: String,
}

/// Append-only conversation history.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) {
        self.entries.push(Entry {
            role,
            text: text.into(),
        });
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Full transcript as displayed.
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| format_line(e.role, &e.text))
            .collect()
    }
}
