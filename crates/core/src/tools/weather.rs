//! Current weather from the OpenWeatherMap API.

use super::ToolError;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{error, info, warn};

pub const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Deserialize, Debug)]
pub struct WeatherResponse {
    pub name: String,
    pub sys: WeatherSys,
    pub main: WeatherMain,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
    pub wind: WeatherWind,
}

#[derive(Deserialize, Debug)]
pub struct WeatherSys {
    pub country: String,
}

#[derive(Deserialize, Debug)]
pub struct WeatherMain {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
}

#[derive(Deserialize, Debug)]
pub struct WeatherCondition {
    pub description: String,
}

#[derive(Deserialize, Debug)]
pub struct WeatherWind {
    pub speed: f64,
}

#[derive(Clone)]
pub struct WeatherClient {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl WeatherClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key,
            endpoint: OPENWEATHER_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Fetches the current weather for `city` and returns a readable summary.
    pub async fn current(&self, city: &str, country_code: Option<&str>) -> Result<String, ToolError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ToolError::NotConfigured("weather"))?;

        let query = match country_code.map(str::trim) {
            Some(code) if !code.is_empty() => format!("{},{}", city, code),
            _ => city.to_string(),
        };
        info!(query = %query, "Fetching weather");

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("q", query.as_str()), ("appid", api_key), ("units", "metric")])
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::NOT_FOUND => {
                    warn!(query = %query, "City not found for weather");
                    ToolError::NotFound(format!("City '{}' not found.", query))
                }
                StatusCode::UNAUTHORIZED => {
                    error!("OpenWeatherMap API key invalid or missing.");
                    ToolError::Unauthorized("Weather service authentication failed.".to_string())
                }
                _ => {
                    error!(%status, query = %query, "HTTP error fetching weather");
                    ToolError::Unavailable("Weather service unavailable.".to_string())
                }
            });
        }

        let data: WeatherResponse = response
            .json()
            .await
            .map_err(|e| ToolError::InvalidResponse(e.to_string()))?;
        let report = format_weather(&data)?;
        info!(location = %data.name, "Weather fetched successfully");
        Ok(report)
    }
}

/// Renders a weather payload as the multi-line summary given to the agent.
pub fn format_weather(data: &WeatherResponse) -> Result<String, ToolError> {
    let description = data
        .weather
        .first()
        .map(|w| capitalize(&w.description))
        .ok_or_else(|| ToolError::InvalidResponse("missing weather description".to_string()))?;

    Ok(format!(
        "Current weather in {}, {}:\n- Condition: {}\n- Temperature: {:.1}°C (Feels like: {:.1}°C)\n- Humidity: {}%\n- Wind Speed: {:.2} m/s",
        data.name,
        data.sys.country,
        description,
        data.main.temp,
        data.main.feels_like,
        data.main.humidity,
        data.wind.speed
    ))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Query, http::StatusCode as AxumStatus, routing::get};
    use serde_json::json;
    use std::collections::HashMap;

    fn sample() -> serde_json::Value {
        json!({
            "name": "Paris",
            "sys": { "country": "FR" },
            "main": { "temp": 18.26, "feels_like": 17.9, "humidity": 64 },
            "weather": [{ "description": "scattered clouds" }],
            "wind": { "speed": 3.6 }
        })
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/weather", addr)
    }

    #[test]
    fn test_format_weather() {
        let data: WeatherResponse = serde_json::from_value(sample()).unwrap();
        let report = format_weather(&data).unwrap();
        assert_eq!(
            report,
            "Current weather in Paris, FR:\n- Condition: Scattered clouds\n- Temperature: 18.3°C (Feels like: 17.9°C)\n- Humidity: 64%\n- Wind Speed: 3.60 m/s"
        );
    }

    #[test]
    fn test_format_weather_without_conditions_is_invalid() {
        let mut payload = sample();
        payload["weather"] = json!([]);
        let data: WeatherResponse = serde_json::from_value(payload).unwrap();
        assert!(matches!(
            format_weather(&data),
            Err(ToolError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_not_configured() {
        let client = WeatherClient::new(reqwest::Client::new(), None);
        let err = client.current("Paris", None).await.unwrap_err();
        assert!(matches!(err, ToolError::NotConfigured("weather")));
    }

    #[tokio::test]
    async fn test_fetches_with_city_and_country_query() {
        let app = Router::new().route(
            "/weather",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("q").map(String::as_str), Some("Paris,FR"));
                assert_eq!(params.get("units").map(String::as_str), Some("metric"));
                assert_eq!(params.get("appid").map(String::as_str), Some("key"));
                Json(sample())
            }),
        );
        let endpoint = serve(app).await;
        let client =
            WeatherClient::new(reqwest::Client::new(), Some("key".into())).with_endpoint(endpoint);

        let report = client.current("Paris", Some("FR")).await.unwrap();
        assert!(report.starts_with("Current weather in Paris, FR:"));
    }

    #[tokio::test]
    async fn test_maps_http_statuses() {
        let app = Router::new().route(
            "/weather",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                match params.get("q").map(String::as_str) {
                    Some("Atlantis") => AxumStatus::NOT_FOUND,
                    Some("Locked") => AxumStatus::UNAUTHORIZED,
                    _ => AxumStatus::BAD_GATEWAY,
                }
            }),
        );
        let endpoint = serve(app).await;
        let client =
            WeatherClient::new(reqwest::Client::new(), Some("key".into())).with_endpoint(endpoint);

        let not_found = client.current("Atlantis", None).await.unwrap_err();
        assert!(matches!(not_found, ToolError::NotFound(ref m) if m.contains("Atlantis")));
        let unauthorized = client.current("Locked", None).await.unwrap_err();
        assert!(matches!(unauthorized, ToolError::Unauthorized(_)));
        let unavailable = client.current("Paris", None).await.unwrap_err();
        assert!(matches!(unavailable, ToolError::Unavailable(_)));
    }
}
