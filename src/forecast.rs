/*
 *  forecast.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *  Forecast periods as served by api.weather.gov and the values derived
 *  from them: active periods, hourly series, sub-hour interpolation
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

use chrono::{DateTime, FixedOffset, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Hourly series are cut to one day.
pub const HOURLY_SERIES_LEN: usize = 24;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// `{ "unitCode": "wmoUnit:percent", "value": 40 }` - value is often null.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(default)]
    pub value: Option<f64>,
}

/// One forecast interval, general (day/night) or hourly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPeriod {
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub name: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    #[serde(default)]
    pub is_daytime: bool,
    pub temperature: f64,
    #[serde(default = "default_temperature_unit")]
    pub temperature_unit: String,
    #[serde(default)]
    pub probability_of_precipitation: Measurement,
    #[serde(default)]
    pub relative_humidity: Measurement,
    #[serde(default)]
    pub wind_speed: String,
    #[serde(default)]
    pub wind_direction: String,
    #[serde(default)]
    pub short_forecast: String,
    #[serde(default)]
    pub detailed_forecast: String,
}

fn default_temperature_unit() -> String {
    "F".to_string()
}

impl ForecastPeriod {
    /// Null precipitation probability reads as 0%.
    pub fn rain_chance(&self) -> f64 {
        self.probability_of_precipitation.value.unwrap_or(0.0)
    }

    pub fn humidity(&self) -> Option<f64> {
        self.relative_humidity.value
    }

    pub fn is_active_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        self.end_time.with_timezone(&Utc) > now.with_timezone(&Utc)
    }
}

/// Values computed from the raw periods at one instant. Never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedForecast {
    pub active_periods: Vec<ForecastPeriod>,
    pub hourly_temperatures: Vec<f64>,
    pub hourly_rain_chances: Vec<f64>,
    /// `None` with fewer than two active periods.
    pub instantaneous_temperature: Option<f64>,
}

impl DerivedForecast {
    pub fn current_period(&self) -> Option<&ForecastPeriod> {
        self.active_periods.first()
    }

    /// Interpolated temperature, else the current period's, else `None`.
    pub fn display_temperature(&self) -> Option<f64> {
        self.instantaneous_temperature
            .or_else(|| self.current_period().map(|p| p.temperature))
    }
}

/// Periods whose end is strictly after `now`, input order kept.
pub fn active_periods<Tz: TimeZone>(periods: &[ForecastPeriod], now: &DateTime<Tz>) -> Vec<ForecastPeriod> {
    periods
        .iter()
        .filter(|p| p.is_active_at(now))
        .cloned()
        .collect()
}

pub fn current_period<'a, Tz: TimeZone>(periods: &'a [ForecastPeriod], now: &DateTime<Tz>) -> Option<&'a ForecastPeriod> {
    periods.iter().find(|p| p.is_active_at(now))
}

pub fn hourly_temperatures(active: &[ForecastPeriod]) -> Vec<f64> {
    active.iter().take(HOURLY_SERIES_LEN).map(|p| p.temperature).collect()
}

pub fn hourly_rain_chances(active: &[ForecastPeriod]) -> Vec<f64> {
    active.iter().take(HOURLY_SERIES_LEN).map(|p| p.rain_chance()).collect()
}

/// Fraction of the current hour elapsed, sub-second precision, in [0, 1).
pub fn hour_progress<T: Timelike>(t: &T) -> f64 {
    let seconds = (t.minute() * 60 + t.second()) as f64;
    // leap-second nanos run past 1e9; keep progress below one
    let fraction = (t.nanosecond().min(999_999_999)) as f64 / 1e9;
    (seconds + fraction) / SECONDS_PER_HOUR
}

#[inline]
pub fn interpolate(t1: f64, t2: f64, progress: f64) -> f64 {
    t1 + (t2 - t1) * progress
}

/// Linear blend between the first two active periods.
pub fn instantaneous_temperature<Tz: TimeZone>(periods: &[ForecastPeriod], now: &DateTime<Tz>) -> Option<f64> {
    let mut active = periods.iter().filter(|p| p.is_active_at(now));
    let t1 = active.next()?.temperature;
    let t2 = active.next()?.temperature;
    Some(interpolate(t1, t2, hour_progress(now)))
}

pub fn derive<Tz: TimeZone>(periods: &[ForecastPeriod], now: &DateTime<Tz>) -> DerivedForecast {
    let active = active_periods(periods, now);
    let hourly_temperatures = hourly_temperatures(&active);
    let hourly_rain_chances = hourly_rain_chances(&active);
    let instantaneous_temperature = instantaneous_temperature(&active, now);
    DerivedForecast {
        active_periods: active,
        hourly_temperatures,
        hourly_rain_chances,
        instantaneous_temperature,
    }
}
