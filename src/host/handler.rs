//! Host command handler backed by the running [`Assistant`].

use crate::assistant::Assistant;
use crate::error::{AuraError, Result};
use crate::host::channel::{HostCommandHandler, QuickAction};
use crate::router::Intent;
use tracing::info;

/// Routes host commands into the assistant.
#[derive(Clone)]
pub struct AssistantHostHandler {
    assistant: Assistant,
}

impl AssistantHostHandler {
    #[must_use]
    pub fn new(assistant: Assistant) -> Self {
        Self { assistant }
    }
}

impl std::fmt::Debug for AssistantHostHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantHostHandler")
            .field("status", &self.assistant.status())
            .finish()
    }
}

impl HostCommandHandler for AssistantHostHandler {
    fn send_text(&self, text: &str) -> Result<()> {
        info!("conversation.send_text requested");
        self.assistant.submit_text(text);
        Ok(())
    }

    fn toggle_listening(&self) -> Result<bool> {
        Ok(self.assistant.toggle_listening())
    }

    fn run_action(&self, action: QuickAction) -> Result<()> {
        info!(action = action.as_str(), "quick action requested");
        let intent = match action {
            QuickAction::Weather => Intent::Weather,
            QuickAction::News => Intent::News,
            QuickAction::PlayMusic => Intent::PlayMusic,
            QuickAction::Medications => Intent::Medication,
            QuickAction::Emergency => Intent::Emergency,
        };
        self.assistant.trigger(intent);
        Ok(())
    }

    fn query_runtime_status(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self.assistant.status())
            .map_err(|e| AuraError::Host(format!("failed to encode status: {e}")))
    }

    fn request_runtime_stop(&self) -> Result<()> {
        info!("runtime.stop requested");
        self.assistant.close();
        Ok(())
    }

    fn query_config_get(&self, key: Option<&str>) -> Result<serde_json::Value> {
        let key = key.unwrap_or("").trim();
        self.assistant
            .config_value(key)
            .ok_or_else(|| AuraError::Config(format!("unknown config key `{key}`")))
    }

    fn request_config_patch(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        info!(key, "config.patch requested");
        self.assistant.patch_config(key, value.clone())
    }

    fn save_settings(&self, changes: &serde_json::Value) -> Result<()> {
        info!("settings.save requested");
        self.assistant.update_settings(changes)
    }
}
