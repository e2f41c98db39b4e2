//! Online lookups and small local helpers behind the command handlers.
//!
//! Every network service shares one [`reqwest::Client`] built by
//! [`http::build_client`]. Endpoints default to the public APIs and can be
//! pointed elsewhere through [`Endpoints`].

pub mod browser;
pub mod encyclopedia;
pub mod http;
pub mod jokes;
pub mod llm;
pub mod news;
pub mod weather;

pub use browser::{SystemOpener, UrlOpener};
pub use encyclopedia::Encyclopedia;
pub use llm::LlmClient;
pub use news::{NewsOutcome, NewsService};
pub use weather::WeatherService;

use crate::config::LlmConfig;
use crate::error::Result;

/// Base URLs of the remote services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub weather: String,
    pub news: String,
    pub wikipedia: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            weather: weather::DEFAULT_WEATHER_URL.to_owned(),
            news: news::DEFAULT_NEWS_URL.to_owned(),
            wikipedia: encyclopedia::DEFAULT_WIKIPEDIA_URL.to_owned(),
        }
    }
}

impl Endpoints {
    /// All services under one mock server root (`/weather`, `/news`,
    /// `/wiki`).
    #[must_use]
    pub fn under(root: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            weather: format!("{root}/weather"),
            news: format!("{root}/news"),
            wikipedia: format!("{root}/wiki"),
        }
    }
}

/// The remote services the assistant uses.
#[derive(Debug, Clone)]
pub struct Services {
    pub weather: WeatherService,
    pub news: NewsService,
    pub encyclopedia: Encyclopedia,
    pub llm: LlmClient,
}

impl Services {
    /// Build every service on a fresh shared client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(endpoints: &Endpoints, llm: LlmConfig) -> Result<Self> {
        let client = http::build_client()?;
        Ok(Self {
            weather: WeatherService::with_url(client.clone(), endpoints.weather.clone()),
            news: NewsService::with_url(client.clone(), endpoints.news.clone()),
            encyclopedia: Encyclopedia::with_base_url(client.clone(), endpoints.wikipedia.clone()),
            llm: LlmClient::new(client, llm),
        })
    }
}
