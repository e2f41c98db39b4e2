//! The settings form and how it is folded into the configuration.

use crate::config::{
    AuraConfig, DEFAULT_CITY, DEFAULT_USER_NAME, EmergencyContact, FONT_SIZE_RANGE, Theme,
    VOICE_RATE_RANGE,
};
use crate::error::{AuraError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SAVED_MESSAGE: &str = "Settings saved and applied.";

/// One medication row: a name and comma-separated times.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MedicationRow {
    pub name: String,
    pub times: String,
}

/// Raw values as entered in the settings dialog.
///
/// Slider values arrive as floats; text fields arrive untrimmed. Every field
/// is required when deserializing; use [`merged_with`](Self::merged_with)
/// for partial updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsForm {
    pub user_name: String,
    pub city: String,
    pub theme: String,
    pub font_size: f64,
    pub voice_rate: f64,
    pub voice_volume: f64,
    pub openweathermap_key: String,
    pub newsapi_key: String,
    pub openai_key: String,
    pub contacts: Vec<EmergencyContact>,
    pub medications: Vec<MedicationRow>,
    /// Music file paths, one per line.
    pub music: String,
}

impl SettingsForm {
    /// Pre-fill the form from the current configuration.
    #[must_use]
    pub fn from_config(config: &AuraConfig) -> Self {
        Self {
            user_name: config.user_name.clone(),
            city: config.city.clone(),
            theme: config.theme.as_str().to_owned(),
            font_size: f64::from(config.font_size),
            voice_rate: f64::from(config.voice_rate),
            voice_volume: f64::from(config.voice_volume),
            openweathermap_key: config.api_keys.openweathermap.clone(),
            newsapi_key: config.api_keys.newsapi.clone(),
            openai_key: config.api_keys.openai.clone(),
            contacts: config.emergency_contacts.clone(),
            medications: config
                .medication_schedule
                .iter()
                .map(|(name, times)| MedicationRow {
                    name: name.clone(),
                    times: times.join(", "),
                })
                .collect(),
            music: config.favorites.music.join("\n"),
        }
    }

    /// Overlay the fields present in `patch` onto this form. Fields the
    /// patch leaves out keep their current values.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Config`] if `patch` is not an object or a field
    /// has the wrong type.
    pub fn merged_with(&self, patch: &serde_json::Value) -> Result<Self> {
        let Some(fields) = patch.as_object() else {
            return Err(AuraError::Config("settings must be a JSON object".to_owned()));
        };
        let mut base = serde_json::to_value(self).map_err(|e| AuraError::Config(e.to_string()))?;
        if let Some(map) = base.as_object_mut() {
            for (key, value) in fields {
                map.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(base)
            .map_err(|e| AuraError::Config(format!("invalid settings: {e}")))
    }

    /// Write the form into `config`, normalizing every field.
    pub fn apply_to(&self, config: &mut AuraConfig) {
        config.user_name = non_blank_or(&self.user_name, DEFAULT_USER_NAME);
        config.city = non_blank_or(&self.city, DEFAULT_CITY);
        config.theme = Theme::parse(self.theme.trim()).unwrap_or_default();
        config.font_size = clamp_slider(self.font_size, FONT_SIZE_RANGE);
        config.voice_rate = clamp_slider(self.voice_rate, VOICE_RATE_RANGE);
        config.voice_volume = if self.voice_volume.is_finite() {
            self.voice_volume.clamp(0.0, 1.0) as f32
        } else {
            1.0
        };

        config.api_keys.openweathermap = self.openweathermap_key.trim().to_owned();
        config.api_keys.newsapi = self.newsapi_key.trim().to_owned();
        config.api_keys.openai = self.openai_key.trim().to_owned();

        config.emergency_contacts = self
            .contacts
            .iter()
            .map(|c| EmergencyContact {
                name: c.name.trim().to_owned(),
                phone: c.phone.trim().to_owned(),
                relation: c.relation.trim().to_owned(),
            })
            .filter(|c| !c.name.is_empty() && !c.phone.is_empty())
            .collect();

        config.medication_schedule = self
            .medications
            .iter()
            .filter_map(|row| {
                let name = row.name.trim();
                let times: Vec<String> = row
                    .times
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_owned)
                    .collect();
                (!name.is_empty() && !times.is_empty()).then(|| (name.to_owned(), times))
            })
            .collect::<BTreeMap<_, _>>();

        config.favorites.music = self
            .music
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_owned)
            .collect();
    }
}

fn non_blank_or(value: &str, default: &str) -> String {
    let v = value.trim();
    if v.is_empty() { default } else { v }.to_owned()
}

/// Truncate a slider value and clamp it into `(min, max)`.
fn clamp_slider(value: f64, (min, max): (u32, u32)) -> u32 {
    if !value.is_finite() {
        return min;
    }
    (value.trunc().max(0.0) as u32).clamp(min, max)
}
