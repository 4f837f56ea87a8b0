/*
 *  sources/noaa.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *  National Weather Service (api.weather.gov) forecast pipeline:
 *  points -> forecast -> hourly forecast
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
use log::debug;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::watch;

use crate::error::SourceError;
use crate::forecast::ForecastPeriod;
use crate::httpclient::{build_client, get_json, join_url, Timeouts};
use crate::ratelimit::RateLimiter;
use crate::snapshot::{ForecastState, Snapshot, SourceKind};
use super::SourceClient;

pub const NOAA_BASE_URL: &str = "https://api.weather.gov";
pub const NOAA_DEFAULT_COOLDOWN_SECS: f64 = 60.0;
pub const NOAA_FLOOR_SECS: f64 = 60.0;

const NO_QUERY: &[(&str, &str)] = &[];

#[derive(Debug, Clone, Deserialize)]
pub struct PointsResponse {
    pub properties: PointsProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsProperties {
    pub forecast: Option<String>,
    pub forecast_hourly: Option<String>,
    #[serde(default)]
    pub relative_location: Option<RelativeLocation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelativeLocation {
    pub properties: RelativeLocationProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelativeLocationProperties {
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    pub properties: ForecastProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastProperties {
    /// Required; a body without it must not blank the last good forecast.
    pub periods: Vec<ForecastPeriod>,
}

/// Grid forecast for one point. Three GETs per refresh; any stage failing
/// drops the whole attempt.
#[derive(Debug)]
pub struct NoaaForecast {
    client: Client,
    base_url: String,
    lat: f64,
    lon: f64,
    state: String,
    limiter: RateLimiter,
    tx: watch::Sender<ForecastState>,
}

impl NoaaForecast {
    pub fn new(lat: f64, lon: f64, state: &str, cooldown_secs: f64) -> Result<Self, SourceError> {
        Self::with_base_url(NOAA_BASE_URL, lat, lon, state, cooldown_secs)
    }

    pub fn with_base_url(
        base_url: &str,
        lat: f64,
        lon: f64,
        state: &str,
        cooldown_secs: f64,
    ) -> Result<Self, SourceError> {
        let initial = ForecastState { area: state.to_string(), ..ForecastState::default() };
        let (tx, _rx) = watch::channel(initial);
        Ok(Self {
            client: build_client(Timeouts::default())?,
            base_url: base_url.to_string(),
            lat,
            lon,
            state: state.to_string(),
            limiter: RateLimiter::new(cooldown_secs, NOAA_FLOOR_SECS),
            tx,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ForecastState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> ForecastState {
        self.tx.borrow().clone()
    }

    /// api.weather.gov redirects anything past four decimals.
    fn points_url(&self) -> String {
        join_url(&self.base_url, &format!("points/{:.4},{:.4}", self.lat, self.lon))
    }

    async fn fetch_points(&self) -> Result<PointsProperties, SourceError> {
        let points: PointsResponse = get_json(&self.client, &self.points_url(), NO_QUERY).await?;
        Ok(points.properties)
    }

    async fn fetch_periods(&self, url: &str) -> Result<Vec<ForecastPeriod>, SourceError> {
        let forecast: ForecastResponse = get_json(&self.client, url, NO_QUERY).await?;
        Ok(forecast.properties.periods)
    }
}

#[async_trait]
impl SourceClient for NoaaForecast {
    type Reading = ForecastState;

    fn kind(&self) -> SourceKind {
        SourceKind::Noaa
    }

    fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    async fn fetch(&self) -> Result<ForecastState, SourceError> {
        let points = self.fetch_points().await?;
        let forecast_url = points
            .forecast
            .ok_or_else(|| SourceError::MissingData("properties.forecast".to_string()))?;
        let hourly_url = points
            .forecast_hourly
            .ok_or_else(|| SourceError::MissingData("properties.forecastHourly".to_string()))?;
        debug!("{}: grid resolved, forecast {}", self.kind(), forecast_url);

        let periods = self.fetch_periods(&forecast_url).await?;
        debug!("{}: {} forecast periods", self.kind(), periods.len());

        let hourly_periods = self.fetch_periods(&hourly_url).await?;
        if hourly_periods.is_empty() {
            return Err(SourceError::MissingData("hourly periods".to_string()));
        }
        debug!("{}: {} hourly periods", self.kind(), hourly_periods.len());

        let area = if self.state.is_empty() {
            points
                .relative_location
                .map(|loc| loc.properties.state)
                .unwrap_or_default()
        } else {
            self.state.clone()
        };
        let (short_forecast, detailed_forecast) = periods
            .first()
            .map(|p| (p.short_forecast.clone(), p.detailed_forecast.clone()))
            .unwrap_or_default();

        Ok(ForecastState {
            area,
            short_forecast,
            detailed_forecast,
            periods,
            hourly_periods,
            updated_at: None,
        })
    }

    fn publish(&self, reading: ForecastState, at: DateTime<Utc>) {
        self.tx.send_replace(ForecastState { updated_at: Some(at), ..reading });
    }

    fn attach(&self, snapshot: Snapshot) -> Snapshot {
        snapshot.with_forecast(self.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::RefreshOutcome;
    use chrono::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn periods_body(start: DateTime<Utc>, temps: &[f64]) -> serde_json::Value {
        let periods: Vec<_> = temps
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let s = start + Duration::hours(i as i64);
                serde_json::json!({
                    "number": i + 1,
                    "name": "",
                    "startTime": s.to_rfc3339(),
                    "endTime": (s + Duration::hours(1)).to_rfc3339(),
                    "isDaytime": true,
                    "temperature": t,
                    "temperatureUnit": "F",
                    "probabilityOfPrecipitation": { "unitCode": "wmoUnit:percent", "value": 20 },
                    "relativeHumidity": { "unitCode": "wmoUnit:percent", "value": 55 },
                    "windSpeed": "10 mph",
                    "windDirection": "NW",
                    "shortForecast": "Partly Sunny",
                    "detailedForecast": "Partly sunny, with a high near 70."
                })
            })
            .collect();
        serde_json::json!({ "properties": { "periods": periods } })
    }

    async fn mount_points(server: &MockServer) {
        let uri = server.uri();
        Mock::given(method("GET"))
            .and(path("/points/38.8894,-77.0352"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {
                    "gridId": "LWX",
                    "forecast": format!("{uri}/gridpoints/LWX/97,71/forecast"),
                    "forecastHourly": format!("{uri}/gridpoints/LWX/97,71/forecast/hourly"),
                    "relativeLocation": { "properties": { "city": "Washington", "state": "DC" } }
                }
            })))
            .mount(server)
            .await;
    }

    /// Good forecast stages served once each; later mocks take over.
    async fn mount_pipeline_once(server: &MockServer) {
        mount_points(server).await;
        let now = Utc::now();
        Mock::given(method("GET"))
            .and(path("/gridpoints/LWX/97,71/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(periods_body(now, &[70.0, 55.0])))
            .up_to_n_times(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gridpoints/LWX/97,71/forecast/hourly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(periods_body(now, &[60.0, 62.0])))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }

    async fn mount_pipeline(server: &MockServer, hourly_status: u16) {
        mount_points(server).await;
        let now = Utc::now();
        Mock::given(method("GET"))
            .and(path("/gridpoints/LWX/97,71/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(periods_body(now, &[70.0, 55.0])))
            .mount(server)
            .await;
        let hourly = if hourly_status == 200 {
            ResponseTemplate::new(200).set_body_json(periods_body(now - Duration::minutes(10), &[60.0, 62.0, 64.0]))
        } else {
            ResponseTemplate::new(hourly_status)
        };
        Mock::given(method("GET"))
            .and(path("/gridpoints/LWX/97,71/forecast/hourly"))
            .respond_with(hourly)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_pipeline_publishes_all_stages() {
        let server = MockServer::start().await;
        mount_pipeline(&server, 200).await;

        let noaa = NoaaForecast::with_base_url(&server.uri(), 38.8894, -77.0352, "", 60.0).unwrap();
        assert!(noaa.refresh(0.0).await.is_updated());

        let s = noaa.state();
        assert_eq!(s.area, "DC");
        assert_eq!(s.periods.len(), 2);
        assert_eq!(s.hourly_periods.len(), 3);
        assert_eq!(s.short_forecast, "Partly Sunny");
        assert!(s.updated_at.is_some());

        let d = s.derive(&Utc::now());
        assert_eq!(d.hourly_temperatures, vec![60.0, 62.0, 64.0]);
        assert_eq!(d.hourly_rain_chances, vec![20.0, 20.0, 20.0]);
        let t = d.instantaneous_temperature.unwrap();
        assert!((60.0..=62.0).contains(&t));
    }

    #[tokio::test]
    async fn test_failed_stage_publishes_nothing() {
        let server = MockServer::start().await;
        mount_pipeline(&server, 503).await;

        let noaa = NoaaForecast::with_base_url(&server.uri(), 38.8894, -77.0352, "VA", 60.0).unwrap();
        let before = noaa.state();
        let outcome = noaa.refresh(0.0).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(SourceError::Status { status: 503, .. })));
        assert_eq!(noaa.state(), before);
        assert_eq!(noaa.state().area, "VA");
        assert!(matches!(noaa.refresh(30.0).await, RefreshOutcome::Skipped));
    }

    #[tokio::test]
    async fn test_points_without_forecast_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": { "gridId": "LWX" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let noaa = NoaaForecast::with_base_url(&server.uri(), 38.8894, -77.0352, "VA", 60.0).unwrap();
        assert!(matches!(noaa.refresh(0.0).await, RefreshOutcome::Failed(SourceError::MissingData(_))));
    }

    #[tokio::test]
    async fn test_body_without_periods_keeps_last_forecast() {
        let server = MockServer::start().await;
        mount_pipeline_once(&server).await;
        for stage in ["/gridpoints/LWX/97,71/forecast", "/gridpoints/LWX/97,71/forecast/hourly"] {
            Mock::given(method("GET"))
                .and(path(stage))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "properties": {} })))
                .mount(&server)
                .await;
        }

        let noaa = NoaaForecast::with_base_url(&server.uri(), 38.8894, -77.0352, "VA", 60.0).unwrap();
        assert!(noaa.refresh(0.0).await.is_updated());
        let before = noaa.state();
        assert_eq!(before.periods.len(), 2);

        let outcome = noaa.refresh(60.0).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(SourceError::Parse(_))));
        assert_eq!(noaa.state(), before);
    }

    #[tokio::test]
    async fn test_empty_hourly_list_is_missing_data() {
        let server = MockServer::start().await;
        mount_points(&server).await;
        Mock::given(method("GET"))
            .and(path("/gridpoints/LWX/97,71/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(periods_body(Utc::now(), &[70.0])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gridpoints/LWX/97,71/forecast/hourly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(periods_body(Utc::now(), &[])))
            .mount(&server)
            .await;

        let noaa = NoaaForecast::with_base_url(&server.uri(), 38.8894, -77.0352, "VA", 60.0).unwrap();
        let outcome = noaa.refresh(0.0).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(SourceError::MissingData(_))));
        assert!(noaa.state().updated_at.is_none());
    }

    #[test]
    fn test_cooldown_floor() {
        let noaa = NoaaForecast::with_base_url("http://localhost", 0.0, 0.0, "", 5.0).unwrap();
        assert_eq!(noaa.rate_limiter().min_interval_secs(), NOAA_FLOOR_SECS);
    }
}
