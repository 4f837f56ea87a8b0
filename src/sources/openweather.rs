/*
 *  sources/openweather.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *  OpenWeatherMap current conditions
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::watch;

use crate::deutils::{deserialize_opt_numeric_f64, deserialize_string_from_anything};
use crate::error::SourceError;
use crate::httpclient::{build_client, get_json, join_url, Timeouts};
use crate::ratelimit::RateLimiter;
use crate::snapshot::{CurrentWeather, Snapshot, SourceKind};
use super::SourceClient;

pub const OWM_BASE_URL: &str = "https://api.openweathermap.org";
/// Free tier allows 60 calls/min across all keys; once a minute is plenty.
pub const OWM_FLOOR_SECS: f64 = 60.0;

const MPS_TO_MPH: f64 = 2.23694;

#[inline]
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - 273.15
}

#[inline]
pub fn kelvin_to_fahrenheit(kelvin: f64) -> f64 {
    kelvin_to_celsius(kelvin) * 9.0 / 5.0 + 32.0
}

#[inline]
pub fn meters_per_second_to_mph(mps: f64) -> f64 {
    mps * MPS_TO_MPH
}

// --- wire schema (standard units: Kelvin, m/s) ---

#[derive(Debug, Clone, Deserialize)]
pub struct OwmResponse {
    /// 200 on success; may arrive as a string or a number.
    #[serde(default, deserialize_with = "deserialize_string_from_anything")]
    pub cod: String,
    #[serde(default)]
    pub message: Option<String>,
    pub main: Option<OwmMain>,
    #[serde(default)]
    pub weather: Vec<OwmCondition>,
    pub wind: Option<OwmWind>,
    #[serde(default)]
    pub visibility: Option<f64>,
    pub sys: Option<OwmSys>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwmMain {
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwmCondition {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwmWind {
    pub speed: f64,
    pub deg: f64,
    /// Often absent in calm air.
    #[serde(default, deserialize_with = "deserialize_opt_numeric_f64")]
    pub gust: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwmSys {
    pub sunrise: i64,
    pub sunset: i64,
}

/// Convert to display units. A missing gust reads as the sustained speed.
pub fn to_current(resp: OwmResponse) -> Result<CurrentWeather, SourceError> {
    if !resp.cod.is_empty() && resp.cod != "200" {
        return Err(SourceError::MissingData(format!(
            "cod {}: {}",
            resp.cod,
            resp.message.unwrap_or_default()
        )));
    }
    let main = resp.main.ok_or_else(|| SourceError::MissingData("main".to_string()))?;
    let wind = resp.wind.ok_or_else(|| SourceError::MissingData("wind".to_string()))?;
    let sys = resp.sys.ok_or_else(|| SourceError::MissingData("sys".to_string()))?;

    let wind_speed = meters_per_second_to_mph(wind.speed);
    let wind_gust = wind.gust.map(meters_per_second_to_mph).unwrap_or(wind_speed);

    Ok(CurrentWeather {
        temperature: kelvin_to_fahrenheit(main.temp),
        feels_like: kelvin_to_fahrenheit(main.feels_like),
        pressure_hpa: main.pressure,
        humidity: main.humidity,
        description: resp
            .weather
            .into_iter()
            .next()
            .map(|c| c.description)
            .unwrap_or_default(),
        wind_speed,
        wind_gust,
        wind_direction: wind.deg,
        visibility_m: resp.visibility.unwrap_or(0.0),
        sunrise: sys.sunrise,
        sunset: sys.sunset,
        updated_at: None,
    })
}

#[derive(Debug)]
pub struct OpenWeatherMap {
    client: Client,
    base_url: String,
    lat: f64,
    lon: f64,
    api_key: String,
    limiter: RateLimiter,
    tx: watch::Sender<CurrentWeather>,
}

impl OpenWeatherMap {
    pub fn new(lat: f64, lon: f64, api_key: &str, update_minutes: f64) -> Result<Self, SourceError> {
        Self::with_base_url(OWM_BASE_URL, lat, lon, api_key, update_minutes)
    }

    pub fn with_base_url(
        base_url: &str,
        lat: f64,
        lon: f64,
        api_key: &str,
        update_minutes: f64,
    ) -> Result<Self, SourceError> {
        let (tx, _rx) = watch::channel(CurrentWeather::default());
        Ok(Self {
            client: build_client(Timeouts::default())?,
            base_url: base_url.to_string(),
            lat,
            lon,
            api_key: api_key.to_string(),
            limiter: RateLimiter::from_minutes(update_minutes, OWM_FLOOR_SECS),
            tx,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<CurrentWeather> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> CurrentWeather {
        self.tx.borrow().clone()
    }
}

#[async_trait]
impl SourceClient for OpenWeatherMap {
    type Reading = CurrentWeather;

    fn kind(&self) -> SourceKind {
        SourceKind::OpenWeather
    }

    fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    async fn fetch(&self) -> Result<CurrentWeather, SourceError> {
        let url = join_url(&self.base_url, "data/2.5/weather");
        let params = [
            ("lat", self.lat.to_string()),
            ("lon", self.lon.to_string()),
            ("appid", self.api_key.clone()),
        ];
        let resp: OwmResponse = get_json(&self.client, &url, &params).await?;
        to_current(resp)
    }

    fn publish(&self, reading: CurrentWeather, at: DateTime<Utc>) {
        self.tx.send_replace(CurrentWeather { updated_at: Some(at), ..reading });
    }

    fn attach(&self, snapshot: Snapshot) -> Snapshot {
        snapshot.with_weather(self.subscribe())
    }
}
