//! Current conditions from OpenWeatherMap.

use super::http::check_status;
use crate::error::{AuraError, Result};
use serde::Deserialize;
use tracing::{debug, warn};

/// OpenWeatherMap current-weather endpoint.
pub const DEFAULT_WEATHER_URL: &str = "http://api.openweathermap.org/data/2.5/weather";

pub const NO_KEY_MESSAGE: &str = "Weather API key not configured. Please add it in Settings.";

/// The parts of a weather response the assistant reports.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub city: String,
    pub description: String,
    pub temp: f64,
    pub feels_like: Option<f64>,
}

impl WeatherReport {
    /// One-line spoken summary.
    #[must_use]
    pub fn sentence(&self) -> String {
        let desc = capitalize(&self.description);
        match self.feels_like {
            Some(feels) => format!(
                "The weather in {} is {desc}, {}°C (feels like {feels}°C).",
                self.city, self.temp
            ),
            None => format!("The weather in {} is {desc}, {}°C.", self.city, self.temp),
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    main: ApiMain,
    #[serde(default)]
    weather: Vec<ApiCondition>,
}

#[derive(Deserialize)]
struct ApiMain {
    temp: f64,
    feels_like: Option<f64>,
}

#[derive(Deserialize)]
struct ApiCondition {
    description: String,
}

/// Client for the current-weather endpoint.
#[derive(Debug, Clone)]
pub struct WeatherService {
    client: reqwest::Client,
    url: String,
}

impl WeatherService {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_url(client, DEFAULT_WEATHER_URL)
    }

    pub fn with_url(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Fetch current conditions for `city` in metric units.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Http`] on transport or status failures and when
    /// the response does not carry a condition description.
    pub async fn fetch(&self, city: &str, api_key: &str) -> Result<WeatherReport> {
        debug!(city, "fetching weather");
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .send()
            .await?;
        let body: ApiResponse = check_status(response).await?.json().await?;

        let description = body
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| AuraError::Http("weather response has no conditions".into()))?;

        Ok(WeatherReport {
            city: city.to_owned(),
            description,
            temp: body.main.temp,
            feels_like: body.main.feels_like,
        })
    }

    /// The message the assistant shows and speaks for a weather request.
    pub async fn report(&self, city: &str, api_key: &str) -> String {
        if api_key.trim().is_empty() {
            return NO_KEY_MESSAGE.to_owned();
        }
        match self.fetch(city, api_key.trim()).await {
            Ok(report) => report.sentence(),
            Err(e) => {
                warn!("weather lookup failed: {e}");
                format!("Could not fetch weather: {e}")
            }
        }
    }
}

/// Upper-case the first character, lower-case the rest.
fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.as_str().to_lowercase().chars())
            .collect(),
        None => String::new(),
    }
}
