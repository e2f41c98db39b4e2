//! Top headlines from NewsAPI.

use super::http::check_status;
use crate::error::Result;
use serde::Deserialize;
use tracing::{debug, warn};

/// NewsAPI top-headlines endpoint.
pub const DEFAULT_NEWS_URL: &str = "https://newsapi.org/v2/top-headlines";

/// Headlines requested per call.
pub const PAGE_SIZE: u32 = 3;

pub const NO_KEY_MESSAGE: &str = "News API key not configured. Please add it in Settings.";
pub const NO_HEADLINES_MESSAGE: &str = "No headlines available right now.";

/// What a news request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsOutcome {
    /// Numbered headline list, ready to display.
    Headlines(String),
    /// Anything else: missing key, empty result or failure.
    Message(String),
}

impl NewsOutcome {
    /// Text for the transcript.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Headlines(t) | Self::Message(t) => t,
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Deserialize)]
struct Article {
    title: Option<String>,
}

/// Client for the headlines endpoint.
#[derive(Debug, Clone)]
pub struct NewsService {
    client: reqwest::Client,
    url: String,
}

impl NewsService {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_url(client, DEFAULT_NEWS_URL)
    }

    pub fn with_url(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Fetch US top-headline titles. Missing titles become "No title".
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuraError::Http`] on transport, status or decode
    /// failures.
    pub async fn fetch(&self, api_key: &str) -> Result<Vec<String>> {
        debug!("fetching headlines");
        let page_size = PAGE_SIZE.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("country", "us"),
                ("apiKey", api_key),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await?;
        let body: ApiResponse = check_status(response).await?.json().await?;
        Ok(body
            .articles
            .into_iter()
            .map(|a| a.title.unwrap_or_else(|| "No title".to_owned()))
            .collect())
    }

    /// Headlines or the message explaining why there are none.
    pub async fn report(&self, api_key: &str) -> NewsOutcome {
        if api_key.trim().is_empty() {
            return NewsOutcome::Message(NO_KEY_MESSAGE.to_owned());
        }
        match self.fetch(api_key.trim()).await {
            Ok(titles) if titles.is_empty() => {
                NewsOutcome::Message(NO_HEADLINES_MESSAGE.to_owned())
            }
            Ok(titles) => NewsOutcome::Headlines(format_headlines(&titles)),
            Err(e) => {
                warn!("news lookup failed: {e}");
                NewsOutcome::Message(format!("Could not fetch news: {e}"))
            }
        }
    }
}

/// `"Top headlines:\n1. a\n2. b"`.
#[must_use]
pub fn format_headlines(titles: &[String]) -> String {
    let mut out = String::from("Top headlines:");
    for (i, title) in titles.iter().enumerate() {
        out.push_str(&format!("\n{}. {title}", i + 1));
    }
    out
}
