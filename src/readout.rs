/*
 *  readout.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *  Text renderer for the snapshot: clock face, tickers, conditions and
 *  forecast, one line each
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

use chrono::{DateTime, TimeZone};
use std::fmt::Display;

use crate::forecast::DerivedForecast;
use crate::snapshot::{CurrentWeather, ForecastState, Snapshot, SpotState, TickerState};

const PENDING: &str = "--";

/// 12-hour `HH:MM:SS` and the hundredths `00..99` drawn beside it.
pub fn clock_face<Tz: TimeZone>(now: &DateTime<Tz>) -> (String, String)
where
    Tz::Offset: Display,
{
    let hms = now.format("%I:%M:%S").to_string();
    let hundredths = (now.timestamp_subsec_millis() / 10).min(99);
    (hms, format!("{:02}", hundredths))
}

pub fn clock_line<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let (hms, hundredths) = clock_face(now);
    format!("{hms} {hundredths}")
}

pub fn cex_line(t: &TickerState) -> String {
    if t.updated_at.is_none() {
        return format!("CEX BTC {PENDING}");
    }
    format!("CEX BTC {:.2} {} ({})", t.price, t.delta_display(), t.pct_change)
}

pub fn blockchain_line(s: &SpotState) -> String {
    if s.updated_at.is_none() {
        return format!("BCI BTC {PENDING}");
    }
    match s.pct_change() {
        Some(pct) => format!("BCI BTC {:.2} {} ({:+.2}%)", s.price, s.delta_display(), pct),
        None => format!("BCI BTC {:.2}", s.price),
    }
}

pub fn weather_line(w: &CurrentWeather) -> String {
    if w.updated_at.is_none() {
        return format!("Now {PENDING}");
    }
    format!(
        "Now {:.0}°F feels {:.0}°F {} | {:.0}% RH | {} {:.0} mph g{:.0}",
        w.temperature,
        w.feels_like,
        w.description,
        w.humidity,
        w.wind_compass(),
        w.wind_speed,
        w.wind_gust
    )
}

pub fn sun_line(w: &CurrentWeather) -> Option<String> {
    let rise = w.sunrise_local()?;
    let set = w.sunset_local()?;
    Some(format!("Sun {} - {}", rise.format("%l:%M %p").to_string().trim(), set.format("%l:%M %p").to_string().trim()))
}

/// Instantaneous temperature when two hourly periods bracket `now`,
/// otherwise the current period's own value.
pub fn forecast_line(f: &ForecastState, derived: &DerivedForecast) -> String {
    let temp = derived
        .display_temperature()
        .map(|t| format!("{t:.0}°F"))
        .unwrap_or_else(|| PENDING.to_string());
    let rain = derived
        .current_period()
        .map(|p| format!(" {:.0}% rain", p.rain_chance()))
        .unwrap_or_default();
    let area = if f.area.is_empty() { "NWS" } else { f.area.as_str() };
    if f.short_forecast.is_empty() {
        format!("{area} {temp}{rain}")
    } else {
        format!("{area} {temp}{rain} {}", f.short_forecast)
    }
}

/// Every line for one frame, clock first, configured sources after.
pub fn render<Tz: TimeZone>(snapshot: &Snapshot, now: &DateTime<Tz>) -> Vec<String>
where
    Tz::Offset: Display,
{
    let mut lines = vec![clock_line(now)];
    if let Some(t) = snapshot.cex() {
        lines.push(cex_line(&t));
    }
    if let Some(s) = snapshot.blockchain() {
        lines.push(blockchain_line(&s));
    }
    if let Some(w) = snapshot.weather() {
        lines.push(weather_line(&w));
        lines.extend(sun_line(&w));
    }
    if let Some(f) = snapshot.forecast() {
        let derived = f.derive(now);
        lines.push(forecast_line(&f, &derived));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::tests::period;
    use chrono::{Duration, FixedOffset, NaiveDate, Utc};
    use tokio::sync::watch;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> DateTime<FixedOffset> {
        NaiveDate::from_ymd_opt(2024, 4, 23)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
            .and_local_timezone(FixedOffset::west_opt(4 * 3600).unwrap())
            .unwrap()
    }

    #[test]
    fn test_clock_is_twelve_hour_with_hundredths() {
        assert_eq!(clock_face(&at(13, 5, 9, 70)), ("01:05:09".to_string(), "07".to_string()));
        assert_eq!(clock_line(&at(0, 0, 0, 999)), "12:00:00 99");
        assert_eq!(clock_line(&at(11, 59, 59, 0)), "11:59:59 00");
    }

    #[test]
    fn test_ticker_lines() {
        let mut t = TickerState { price: 90.0, previous_price: 100.0, pct_change: "-1.2%".into(), updated_at: None };
        assert_eq!(cex_line(&t), "CEX BTC --");
        t.updated_at = Some(Utc::now());
        assert_eq!(cex_line(&t), "CEX BTC 90.00 -10.00 (-1.2%)");

        let s = SpotState { price: 110.0, previous_price: 100.0, updated_at: Some(Utc::now()) };
        assert_eq!(blockchain_line(&s), "BCI BTC 110.00 +10.00 (+10.00%)");
        let first = SpotState { price: 110.0, previous_price: 0.0, updated_at: Some(Utc::now()) };
        assert_eq!(blockchain_line(&first), "BCI BTC 110.00");
    }

    #[test]
    fn test_weather_line() {
        let w = CurrentWeather {
            temperature: 68.4,
            feels_like: 66.6,
            humidity: 42.0,
            description: "clear sky".into(),
            wind_speed: 8.9,
            wind_gust: 12.2,
            wind_direction: 225.0,
            updated_at: Some(Utc::now()),
            ..CurrentWeather::default()
        };
        assert_eq!(weather_line(&w), "Now 68°F feels 67°F clear sky | 42% RH | SW 9 mph g12");
        assert!(sun_line(&w).is_none());
    }

    #[test]
    fn test_forecast_line_prefers_instantaneous() {
        let now = at(10, 30, 0, 0);
        let start = at(10, 0, 0, 0);
        let hourly = vec![
            period(start, 1, 60.0, Some(10.0)),
            period(start + Duration::hours(1), 1, 70.0, Some(30.0)),
        ];
        let f = ForecastState {
            area: "VA".into(),
            short_forecast: "Sunny".into(),
            hourly_periods: hourly,
            ..ForecastState::default()
        };
        assert_eq!(forecast_line(&f, &f.derive(&now)), "VA 65°F 10% rain Sunny");

        // one active period left: fall back to its temperature
        let late = at(11, 15, 0, 0);
        assert_eq!(forecast_line(&f, &f.derive(&late)), "VA 70°F 30% rain Sunny");

        let empty = ForecastState::default();
        assert_eq!(forecast_line(&empty, &empty.derive(&now)), "NWS --");
    }

    #[test]
    fn test_render_lists_configured_sources_only() {
        let (_tx, rx) = watch::channel(TickerState::initial());
        let snap = Snapshot::default().with_cex(rx);
        let lines = render(&snap, &at(9, 0, 0, 0));
        assert_eq!(lines, vec!["09:00:00 00".to_string(), "CEX BTC --".to_string()]);
    }
}
