//! Top headlines from NewsAPI.

use super::ToolError;
use reqwest::StatusCode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

pub const NEWSAPI_URL: &str = "https://newsapi.org/v2/top-headlines";

/// Number of articles requested per call.
const PAGE_SIZE: &str = "3";

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NewsCategory {
    Business,
    Entertainment,
    General,
    Health,
    Science,
    Sports,
    Technology,
}

impl fmt::Display for NewsCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NewsCategory::Business => "business",
            NewsCategory::Entertainment => "entertainment",
            NewsCategory::General => "general",
            NewsCategory::Health => "health",
            NewsCategory::Science => "science",
            NewsCategory::Sports => "sports",
            NewsCategory::Technology => "technology",
        };
        write!(f, "{}", name)
    }
}

#[derive(Deserialize, Debug)]
pub struct NewsResponse {
    pub status: String,
    pub code: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub articles: Vec<Article>,
}

#[derive(Deserialize, Debug)]
pub struct Article {
    pub title: Option<String>,
    pub source: Option<ArticleSource>,
    pub description: Option<String>,
    pub url: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ArticleSource {
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct NewsClient {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl NewsClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key,
            endpoint: NEWSAPI_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Fetches the latest headlines for a country, optionally narrowed by
    /// keywords and category.
    pub async fn top_headlines(
        &self,
        country: &str,
        query: Option<&str>,
        category: Option<NewsCategory>,
    ) -> Result<String, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ToolError::NotConfigured("news"))?;

        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let mut params = vec![
            ("country", country.to_string()),
            ("apiKey", api_key.to_string()),
            ("pageSize", PAGE_SIZE.to_string()),
        ];
        if let Some(q) = query {
            params.push(("q", q.to_string()));
        }
        if let Some(c) = category {
            params.push(("category", c.to_string()));
        }

        let description = describe_request(country, query, category);
        info!(request = %description, "Fetching news");

        let response = self
            .http
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::UNAUTHORIZED => {
                    error!("NewsAPI API key invalid or missing.");
                    ToolError::Unauthorized("News service authentication failed.".to_string())
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    warn!("NewsAPI rate limit hit.");
                    ToolError::RateLimited("News service rate limit exceeded.".to_string())
                }
                _ => {
                    error!(%status, "HTTP error fetching news");
                    ToolError::Unavailable("News service unavailable.".to_string())
                }
            });
        }

        let data: NewsResponse = response
            .json()
            .await
            .map_err(|e| ToolError::InvalidResponse(e.to_string()))?;

        if data.status != "ok" {
            error!(code = ?data.code, message = ?data.message, "NewsAPI error");
            return Err(ToolError::Unavailable(format!(
                "News service error: {}",
                data.message.as_deref().unwrap_or("Unknown error")
            )));
        }

        info!(articles = data.articles.len(), "News fetched successfully");
        Ok(format_headlines(&description, &data.articles))
    }
}

fn describe_request(country: &str, query: Option<&str>, category: Option<NewsCategory>) -> String {
    let mut description = format!("top headlines for country '{}'", country);
    if let Some(q) = query {
        description.push_str(&format!(" matching query '{}'", q));
    }
    if let Some(c) = category {
        description.push_str(&format!(" in category '{}'", c));
    }
    description
}

/// Renders articles as a numbered list. Articles without a URL are skipped
/// but keep their position in the numbering.
pub fn format_headlines(description: &str, articles: &[Article]) -> String {
    if articles.is_empty() {
        return format!("No news articles found for {}.", description);
    }

    let mut lines = vec![format!(
        "Found {} news articles ({}):",
        articles.len(),
        description
    )];
    for (i, article) in articles.iter().enumerate() {
        let Some(url) = &article.url else { continue };
        let title = article.title.as_deref().unwrap_or("No Title");
        let source = article
            .source
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .unwrap_or("Unknown Source");
        let desc = article
            .description
            .as_deref()
            .unwrap_or("No description available.");
        lines.push(format!(
            "{}. \"{}\" ({})\n   Desc: {}\n   URL: {}",
            i + 1,
            title,
            source,
            desc,
            url
        ));
    }
    lines.join("\n")
}
