//! Current weather lookup for notification enrichment.
//!
//! Strictly best-effort: any failure collapses into a placeholder report
//! so a weather API hiccup never delays a booking notification.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use creneau_core::config::WeatherConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub temperature: Option<i32>,
    pub description: String,
    pub humidity: Option<i32>,
}

impl WeatherReport {
    pub fn unavailable() -> Self {
        Self {
            temperature: None,
            description: "Non disponible".to_string(),
            humidity: None,
        }
    }
}

pub struct WeatherService {
    client: Client,
    config: WeatherConfig,
}

impl WeatherService {
    pub fn new(config: WeatherConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Current conditions for the configured city.
    pub async fn current(&self) -> WeatherReport {
        if self.config.api_key.is_empty() {
            return WeatherReport::unavailable();
        }

        let url = format!(
            "http://api.weatherapi.com/v1/current.json?key={}&q={}&lang=fr",
            self.config.api_key, self.config.city
        );

        match self.fetch(&url).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Weather lookup failed: {}", e);
                WeatherReport::unavailable()
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<WeatherReport, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let data: Value = resp.json().await.map_err(|e| e.to_string())?;

        let current = data
            .get("current")
            .ok_or_else(|| "missing 'current' in response".to_string())?;
        let temperature = current
            .get("temp_c")
            .and_then(|v| v.as_f64())
            .map(|t| t.round() as i32);
        let description = current
            .get("condition")
            .and_then(|c| c.get("text"))
            .and_then(|v| v.as_str())
            .unwrap_or("Non disponible")
            .to_string();
        let humidity = current
            .get("humidity")
            .and_then(|v| v.as_i64())
            .map(|h| h as i32);

        Ok(WeatherReport {
            temperature,
            description,
            humidity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_placeholder() {
        let report = WeatherReport::unavailable();
        assert_eq!(report.temperature, None);
        assert_eq!(report.description, "Non disponible");
        assert_eq!(report.humidity, None);
    }

    #[tokio::test]
    async fn test_missing_api_key_short_circuits() {
        let service = WeatherService::new(WeatherConfig::default());
        assert_eq!(service.current().await, WeatherReport::unavailable());
    }
}
