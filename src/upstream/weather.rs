//! Current conditions from `OpenWeatherMap`

use std::fmt::Write;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{endpoint, require_key};
use crate::config::RelayConfig;
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    name: String,
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
    #[serde(default)]
    wind: Option<Wind>,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    feels_like: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
}

/// Weather lookup client
pub struct WeatherClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl WeatherClient {
    /// Create a weather client from relay configuration
    ///
    /// # Errors
    ///
    /// Returns error if the `OpenWeatherMap` key is missing
    pub fn from_config(client: reqwest::Client, config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            client,
            api_key: require_key(config.api_keys.openweather.as_ref(), "OpenWeatherMap")?,
            base_url: config.upstreams.openweather.clone(),
        })
    }

    /// One-sentence description of current conditions in `city`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown cities, or a downstream error
    pub async fn current(&self, city: &str) -> Result<String> {
        let response = self
            .client
            .get(endpoint(&self.base_url, "weather"))
            .query(&[
                ("q", city),
                ("appid", self.api_key.expose_secret()),
                ("units", "imperial"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("city {city}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "weather API error");
            return Err(Error::DownstreamCallFailed(format!(
                "weather API error {status}"
            )));
        }

        let current: CurrentWeather = response.json().await?;
        tracing::debug!(city = %current.name, temp = current.main.temp, "weather received");
        Ok(describe(&current))
    }
}

fn describe(w: &CurrentWeather) -> String {
    let conditions = w
        .weather
        .first()
        .map_or("clear conditions", |c| c.description.as_str());

    let mut sentence = format!(
        "It's {:.0}°F in {} with {conditions}, feeling like {:.0}°F at {}% humidity",
        w.main.temp, w.name, w.main.feels_like, w.main.humidity
    );
    if let Some(wind) = w.wind.as_ref().filter(|wind| wind.speed >= 1.0) {
        let _ = write!(sentence, " and {:.0} mph winds", wind.speed);
    }
    sentence.push('.');
    sentence
}
