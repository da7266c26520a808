//! Weather fetching over Open-Meteo, cache-first.

use crate::sessions::KeyedLocks;
use crate::store::{cache_key, CacheDomain, Store};
use crate::types::{DailyForecast, WeatherReport};
use chrono::NaiveDate;
use roam_common::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Weather service: result cache in front of the Open-Meteo forecast API.
pub struct WeatherService {
    client: reqwest::Client,
    base_url: String,
    store: Arc<dyn Store>,
    flights: Arc<KeyedLocks>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current: OpenMeteoCurrent,
    #[serde(default)]
    daily: Option<OpenMeteoDaily>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoCurrent {
    temperature_2m: f64,
    weather_code: i64,
    #[serde(default)]
    apparent_temperature: Option<f64>,
    #[serde(default)]
    relative_humidity_2m: Option<i64>,
    #[serde(default)]
    wind_speed_10m: Option<f64>,
    #[serde(default)]
    precipitation_probability: Option<i64>,
    #[serde(default)]
    surface_pressure: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct OpenMeteoDaily {
    #[serde(default)]
    time: Vec<NaiveDate>,
    #[serde(default)]
    temperature_2m_max: Vec<f64>,
    #[serde(default)]
    temperature_2m_min: Vec<f64>,
    #[serde(default)]
    weather_code: Vec<i64>,
    #[serde(default)]
    precipitation_probability_max: Vec<i64>,
}

impl WeatherService {
    pub fn new(base_url: &str, store: Arc<dyn Store>, flights: Arc<KeyedLocks>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            flights,
        }
    }

    /// Weather for a coordinate: cached when fresh, fetched otherwise.
    pub async fn get(&self, lat: f64, lon: f64) -> Result<WeatherReport> {
        if let Some(report) = self.cached(lat, lon).await {
            tracing::info!(lat, lon, "Weather cache hit");
            return Ok(report);
        }

        // Single-flight: serialize concurrent misses for this key, then
        // re-check the cache before paying for a provider call.
        let key = cache_key(CacheDomain::Weather, lat, lon);
        let _guard = self.flights.acquire(&key).await;

        if let Some(report) = self.cached(lat, lon).await {
            tracing::debug!(lat, lon, "Weather filled by concurrent fetch");
            return Ok(report);
        }

        tracing::info!(lat, lon, "Weather cache miss, calling Open-Meteo");
        let report = self.fetch(lat, lon).await?;

        match serde_json::to_value(&report) {
            Ok(payload) => {
                if let Err(e) = self
                    .store
                    .cache_put(CacheDomain::Weather, lat, lon, &payload)
                    .await
                {
                    // A failed write is just a miss on the next read.
                    tracing::warn!("Weather cache write failed: {}", e);
                }
            }
            Err(e) => tracing::warn!("Weather report not serializable for cache: {}", e),
        }

        Ok(report)
    }

    async fn cached(&self, lat: f64, lon: f64) -> Option<WeatherReport> {
        let payload = match self.store.cache_get(CacheDomain::Weather, lat, lon).await {
            Ok(payload) => payload?,
            Err(e) => {
                tracing::warn!("Weather cache read failed: {}", e);
                return None;
            }
        };
        serde_json::from_value(payload).ok()
    }

    async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherReport> {
        let url = format!("{}/v1/forecast", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation_probability,weather_code,surface_pressure,wind_speed_10m"
                        .to_string(),
                ),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,precipitation_probability_max,weather_code"
                        .to_string(),
                ),
                ("timezone", "auto".to_string()),
                ("forecast_days", "7".to_string()),
            ])
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::fetch("weather", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(
                "weather",
                format!("open-meteo returned {}", status.as_u16()),
            ));
        }

        let raw: OpenMeteoResponse = response
            .json()
            .await
            .map_err(|e| Error::fetch("weather", format!("malformed response: {e}")))?;

        Ok(build_report(raw))
    }
}

fn build_report(raw: OpenMeteoResponse) -> WeatherReport {
    let current = raw.current;
    let mut daily_forecast = Vec::new();

    if let Some(daily) = raw.daily {
        let days = daily
            .time
            .len()
            .min(daily.temperature_2m_max.len())
            .min(daily.temperature_2m_min.len())
            .min(daily.weather_code.len())
            .min(7);
        for i in 0..days {
            daily_forecast.push(DailyForecast {
                date: daily.time[i],
                max_temp: daily.temperature_2m_max[i],
                min_temp: daily.temperature_2m_min[i],
                condition: condition_text(daily.weather_code[i]),
                rain_probability: daily
                    .precipitation_probability_max
                    .get(i)
                    .copied()
                    .unwrap_or(0),
            });
        }
    }

    WeatherReport {
        temperature: current.temperature_2m,
        condition: condition_text(current.weather_code),
        feels_like: current.apparent_temperature,
        humidity: current.relative_humidity_2m,
        wind_speed: current.wind_speed_10m,
        rain_probability: current.precipitation_probability,
        pressure: current.surface_pressure,
        daily_forecast,
    }
}

/// Map WMO weather codes to readable text.
fn condition_text(code: i64) -> String {
    match code {
        0 => "Clear sky",
        1..=3 => "Mainly clear, partly cloudy",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        61 | 63 | 65 => "Rain",
        71 | 73 | 75 => "Snow fall",
        95 | 96 | 99 => "Thunderstorm",
        _ => "Overcast",
    }
    .to_string()
}
