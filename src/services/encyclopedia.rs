//! Short answers from the Wikipedia page-summary API.

use super::http::check_status;
use crate::error::{AuraError, Result};
use serde::Deserialize;
use tracing::debug;

/// Wikipedia REST base URL.
pub const DEFAULT_WIKIPEDIA_URL: &str = "https://en.wikipedia.org/api/rest_v1";

/// Sentences kept from a page summary.
pub const SUMMARY_SENTENCES: usize = 2;

#[derive(Deserialize)]
struct PageSummary {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    extract: String,
}

/// Client for page summaries.
#[derive(Debug, Clone)]
pub struct Encyclopedia {
    client: reqwest::Client,
    base_url: String,
}

impl Encyclopedia {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_WIKIPEDIA_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Look up `query` as an exact page title and return the first two
    /// sentences of its summary.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Http`] when the page does not exist, is a
    /// disambiguation page, has no extract, or the request fails.
    pub async fn summary(&self, query: &str) -> Result<String> {
        let title = page_title(query);
        if title.is_empty() {
            return Err(AuraError::Http("empty encyclopedia query".into()));
        }
        let url = format!(
            "{}/page/summary/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&title)
        );
        debug!(%url, "encyclopedia lookup");

        let response = self.client.get(&url).send().await?;
        let page: PageSummary = check_status(response).await?.json().await?;

        if page.kind == "disambiguation" {
            return Err(AuraError::Http(format!(
                "\"{query}\" may refer to several pages"
            )));
        }
        let text = first_sentences(&page.extract, SUMMARY_SENTENCES);
        if text.is_empty() {
            return Err(AuraError::Http(format!("no summary for \"{query}\"")));
        }
        Ok(text)
    }
}

/// Page titles use underscores for spaces.
fn page_title(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Keep the first `n` sentences of `text`.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace or the end of
/// the text.
#[must_use]
pub fn first_sentences(text: &str, n: usize) -> String {
    let text = text.trim();
    if n == 0 {
        return String::new();
    }
    let mut seen = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
            if at_boundary {
                seen += 1;
                if seen == n {
                    return text[..idx + c.len_utf8()].to_owned();
                }
            }
        }
    }
    text.to_owned()
}
