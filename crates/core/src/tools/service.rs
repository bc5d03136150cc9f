//! MCP tool server exposing the relay's data tools to the agent.

use super::{
    news::{NewsCategory, NewsClient},
    weather::WeatherClient,
};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

/// Arguments for the `get_weather` tool.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct WeatherArgs {
    /// The name of the city to fetch weather for.
    pub city: String,
    /// Optional 2-letter ISO 3166 country code for the city.
    #[schemars(description = "Optional 2-letter ISO 3166 country code, e.g. 'GB'")]
    pub country_code: Option<String>,
}

/// Arguments for the `get_latest_news` tool.
#[derive(Deserialize, JsonSchema, Debug)]
pub struct NewsArgs {
    /// The 2-letter ISO 3166-1 code of the country (e.g., us, gb, de).
    pub country: String,
    /// Optional keywords or phrase to search for.
    pub query: Option<String>,
    /// Optional category to narrow the headlines.
    pub category: Option<NewsCategory>,
}

pub struct RelayToolService {
    weather: WeatherClient,
    news: NewsClient,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for RelayToolService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl RelayToolService {
    pub fn new(weather: WeatherClient, news: NewsClient) -> Self {
        Self {
            weather,
            news,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Get the current weather for a city.")]
    pub async fn get_weather(&self, args: Parameters<WeatherArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'get_weather'");
        self.weather
            .current(&args.0.city, args.0.country_code.as_deref())
            .await
            .map_err(|e| e.to_string())
    }

    #[tool(description = "Get the latest news headlines for a country, optionally filtered by keywords and category.")]
    pub async fn get_latest_news(&self, args: Parameters<NewsArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'get_latest_news'");
        self.news
            .top_headlines(&args.0.country, args.0.query.as_deref(), args.0.category)
            .await
            .map_err(|e| e.to_string())
    }
}
