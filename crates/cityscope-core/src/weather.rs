// crates/cityscope-core/src/weather.rs

//! Current weather by coordinates. Stateless: every call goes to the provider.

use crate::error::{CityError, Result};
use crate::model::{Location, Weather};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct MainRaw {
    temp: f64,
    humidity: i32,
}

#[derive(Debug, Deserialize)]
struct ConditionRaw {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WindRaw {
    speed: f64,
}

/// OpenWeatherMap `/weather` response, reduced to what we show.
#[derive(Debug, Deserialize)]
struct WeatherRaw {
    main: MainRaw,
    #[serde(default)]
    weather: Vec<ConditionRaw>,
    wind: WindRaw,
}

/// Decode an OpenWeatherMap body for the point `at`.
pub fn decode_weather(bytes: &[u8], at: Location) -> Result<Weather> {
    let raw: WeatherRaw = serde_json::from_slice(bytes)?;
    let condition = raw.weather.first();

    Ok(Weather {
        city_id: format!("{}_{}", at.latitude, at.longitude),
        temperature: raw.main.temp,
        description: condition.map(|c| c.description.clone()).unwrap_or_default(),
        humidity: raw.main.humidity,
        wind_speed: raw.wind.speed,
        icon: condition.map(|c| c.icon.clone()).unwrap_or_default(),
        timestamp: now_millis(),
    })
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, at: Location) -> Result<Weather>;
}

/// Front door for weather lookups.
#[derive(Clone)]
pub struct WeatherRepository {
    provider: Arc<dyn WeatherProvider>,
}

impl WeatherRepository {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    #[cfg(feature = "http")]
    pub fn from_config(config: &crate::config::WeatherConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpWeatherClient::new(config)?)))
    }

    pub async fn get_weather(&self, latitude: f64, longitude: f64) -> Result<Weather> {
        let at = Location::new(latitude, longitude);
        if !at.is_valid() {
            return Err(CityError::InvalidData(format!(
                "invalid coordinates {latitude}, {longitude}"
            )));
        }
        let weather = self.provider.current(at).await?;
        debug!(city_id = %weather.city_id, temperature = weather.temperature, "weather fetched");
        Ok(weather)
    }
}

#[cfg(feature = "http")]
pub use self::http::HttpWeatherClient;

#[cfg(feature = "http")]
mod http {
    use super::{decode_weather, WeatherProvider};
    use crate::config::WeatherConfig;
    use crate::error::{CityError, Result};
    use crate::model::{Location, Weather};
    use async_trait::async_trait;

    #[derive(Debug, Clone)]
    pub struct HttpWeatherClient {
        client: reqwest::Client,
        endpoint: String,
        api_key: String,
    }

    impl HttpWeatherClient {
        pub fn new(config: &WeatherConfig) -> Result<Self> {
            let client = config.timeouts.client_builder().build()?;
            Ok(Self {
                client,
                endpoint: format!("{}/weather", config.base_url.trim_end_matches('/')),
                api_key: config.api_key.clone(),
            })
        }
    }

    #[async_trait]
    impl WeatherProvider for HttpWeatherClient {
        async fn current(&self, at: Location) -> Result<Weather> {
            let response = self
                .client
                .get(&self.endpoint)
                .query(&[
                    ("lat", at.latitude.to_string()),
                    ("lon", at.longitude.to_string()),
                    ("appid", self.api_key.clone()),
                    ("units", "metric".to_string()),
                ])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(CityError::Status(status.as_u16()));
            }
            let body = response.bytes().await?;
            if body.is_empty() {
                return Err(CityError::EmptyBody);
            }
            decode_weather(&body, at)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "coord": {"lon": -0.13, "lat": 51.51},
        "weather": [{"id": 300, "main": "Drizzle", "description": "light intensity drizzle", "icon": "09d"}],
        "main": {"temp": 7.17, "pressure": 1012, "humidity": 81},
        "wind": {"speed": 4.1, "deg": 80},
        "name": "London"
    }"#;

    struct Canned;

    #[async_trait]
    impl WeatherProvider for Canned {
        async fn current(&self, at: Location) -> Result<Weather> {
            decode_weather(BODY.as_bytes(), at)
        }
    }

    #[test]
    fn decodes_openweathermap_body() {
        let w = decode_weather(BODY.as_bytes(), Location::new(51.51, -0.13)).unwrap();
        assert_eq!(w.city_id, "51.51_-0.13");
        assert_eq!(w.temperature, 7.17);
        assert_eq!(w.description, "light intensity drizzle");
        assert_eq!(w.humidity, 81);
        assert_eq!(w.wind_speed, 4.1);
        assert_eq!(w.icon, "09d");
        assert!(w.timestamp > 0);
    }

    #[test]
    fn missing_condition_yields_blank_fields() {
        let body = r#"{"main": {"temp": 1.0, "humidity": 2}, "weather": [], "wind": {"speed": 0.5}}"#;
        let w = decode_weather(body.as_bytes(), Location::new(0.0, 0.0)).unwrap();
        assert_eq!(w.description, "");
        assert_eq!(w.icon, "");
    }

    #[tokio::test]
    async fn repository_rejects_bad_coordinates() {
        let repo = WeatherRepository::new(Arc::new(Canned));
        assert!(matches!(
            repo.get_weather(95.0, 0.0).await,
            Err(CityError::InvalidData(_))
        ));
        assert_eq!(repo.get_weather(51.51, -0.13).await.unwrap().humidity, 81);
    }
}
