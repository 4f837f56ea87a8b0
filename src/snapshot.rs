/*
 *  snapshot.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *  Latest known value of every source, as the renderer sees it
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
//! Each source owns a `watch::Sender` for its record and replaces the whole
//! record on a good fetch. Readers clone out of the receiver, so one read
//! never mixes fields from two fetches.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::watch;

use crate::forecast::{self, DerivedForecast, ForecastPeriod};

/// Identifies a source in logs and status maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    Cex,
    Blockchain,
    OpenWeather,
    Noaa,
}

impl SourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Cex => "cex.io",
            SourceKind::Blockchain => "blockchain.info",
            SourceKind::OpenWeather => "openweathermap",
            SourceKind::Noaa => "noaa",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signed two-decimal difference, "+10.00" / "-10.00".
pub fn format_delta(previous: f64, current: f64) -> String {
    format!("{:+.2}", current - previous)
}

/// BTC/USD midpoint from CEX.io.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerState {
    pub price: f64,
    /// Price before the last distinct tick.
    pub previous_price: f64,
    /// Provider's 24h change, e.g. "1.25%"; "-0%" until the first fetch.
    pub pct_change: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TickerState {
    pub fn initial() -> Self {
        Self { pct_change: "-0%".to_string(), ..Self::default() }
    }

    pub fn delta_display(&self) -> String {
        format_delta(self.previous_price, self.price)
    }
}

/// BTC/USD last trade from blockchain.info.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotState {
    pub price: f64,
    pub previous_price: f64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SpotState {
    pub fn delta_display(&self) -> String {
        format_delta(self.previous_price, self.price)
    }

    /// Change against the previous fetch; `None` until two prices exist.
    pub fn pct_change(&self) -> Option<f64> {
        (self.previous_price != 0.0).then(|| (self.price - self.previous_price) / self.previous_price * 100.0)
    }
}

/// Current conditions in display units (°F, mph).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub feels_like: f64,
    pub pressure_hpa: f64,
    pub humidity: f64,
    pub description: String,
    pub wind_speed: f64,
    pub wind_gust: f64,
    pub wind_direction: f64,
    pub visibility_m: f64,
    /// Epoch seconds.
    pub sunrise: i64,
    pub sunset: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CurrentWeather {
    pub fn sunrise_local(&self) -> Option<DateTime<Local>> {
        epoch_to_local(self.sunrise)
    }

    pub fn sunset_local(&self) -> Option<DateTime<Local>> {
        epoch_to_local(self.sunset)
    }

    /// 16-point compass label for the wind bearing.
    pub fn wind_compass(&self) -> &'static str {
        const POINTS: [&str; 16] = [
            "N",  "NNE", "NE", "ENE", "E",  "ESE",
            "SE", "SSE", "S",  "SSW", "SW", "WSW",
            "W",  "WNW", "NW", "NNW"];
        let d16 = ((self.wind_direction.rem_euclid(360.0) / 22.5) + 0.5) as usize % 16;
        POINTS[d16]
    }
}

fn epoch_to_local(secs: i64) -> Option<DateTime<Local>> {
    if secs == 0 {
        return None;
    }
    Local.timestamp_opt(secs, 0).single()
}

/// Raw NOAA periods; derived values are computed per read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastState {
    /// Two-letter state code from config, used as a label.
    pub area: String,
    pub short_forecast: String,
    pub detailed_forecast: String,
    pub periods: Vec<ForecastPeriod>,
    pub hourly_periods: Vec<ForecastPeriod>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ForecastState {
    pub fn derive<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DerivedForecast {
        forecast::derive(&self.hourly_periods, now)
    }
}

/// What the last real attempt of a source did. Cooldown skips are not
/// attempts and leave this alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LastOutcome {
    #[default]
    Never,
    Updated,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceStatus {
    pub last_outcome: LastOutcome,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

/// Read side handed to the renderer. Cheap to clone; every accessor returns
/// an owned copy of one whole record.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    cex: Option<watch::Receiver<TickerState>>,
    blockchain: Option<watch::Receiver<SpotState>>,
    weather: Option<watch::Receiver<CurrentWeather>>,
    forecast: Option<watch::Receiver<ForecastState>>,
    status: BTreeMap<SourceKind, watch::Receiver<SourceStatus>>,
}

impl Snapshot {
    pub fn with_cex(mut self, rx: watch::Receiver<TickerState>) -> Self {
        self.cex = Some(rx);
        self
    }

    pub fn with_blockchain(mut self, rx: watch::Receiver<SpotState>) -> Self {
        self.blockchain = Some(rx);
        self
    }

    pub fn with_weather(mut self, rx: watch::Receiver<CurrentWeather>) -> Self {
        self.weather = Some(rx);
        self
    }

    pub fn with_forecast(mut self, rx: watch::Receiver<ForecastState>) -> Self {
        self.forecast = Some(rx);
        self
    }

    pub(crate) fn add_status(&mut self, kind: SourceKind, rx: watch::Receiver<SourceStatus>) {
        self.status.insert(kind, rx);
    }

    /// `None` when the source is not configured.
    pub fn cex(&self) -> Option<TickerState> {
        self.cex.as_ref().map(|rx| rx.borrow().clone())
    }

    pub fn blockchain(&self) -> Option<SpotState> {
        self.blockchain.as_ref().map(|rx| rx.borrow().clone())
    }

    pub fn weather(&self) -> Option<CurrentWeather> {
        self.weather.as_ref().map(|rx| rx.borrow().clone())
    }

    pub fn forecast(&self) -> Option<ForecastState> {
        self.forecast.as_ref().map(|rx| rx.borrow().clone())
    }

    /// Forecast series and interpolation at `now`.
    pub fn derived_forecast<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DerivedForecast> {
        self.forecast
            .as_ref()
            .map(|rx| rx.borrow().derive(now))
    }

    pub fn status(&self, kind: SourceKind) -> Option<SourceStatus> {
        self.status.get(&kind).map(|rx| rx.borrow().clone())
    }

    pub fn sources(&self) -> impl Iterator<Item = SourceKind> + '_ {
        self.status.keys().copied()
    }
}
