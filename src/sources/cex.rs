/*
 *  sources/cex.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *  CEX.io BTC/USD ticker
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

use crate::deutils::{deserialize_numeric_f64, deserialize_string_from_anything};
use crate::error::SourceError;
use crate::httpclient::{build_client, get_json, join_url, Timeouts};
use crate::ratelimit::RateLimiter;
use crate::snapshot::{Snapshot, SourceKind, TickerState};
use super::SourceClient;

pub const CEX_BASE_URL: &str = "https://cex.io";
pub const CEX_FLOOR_SECS: f64 = 1.0;

const NO_QUERY: &[(&str, &str)] = &[];

/// The fields of `/api/ticker/{sym}/{quote}` we use.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CexQuote {
    #[serde(deserialize_with = "deserialize_numeric_f64")]
    pub bid: f64,
    #[serde(deserialize_with = "deserialize_numeric_f64")]
    pub ask: f64,
    #[serde(deserialize_with = "deserialize_string_from_anything")]
    pub price_change_percentage: String,
}

impl CexQuote {
    pub fn midpoint(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// Fold a new quote into the previous record. A tick at the same price
/// keeps the older `previous_price`, so the shown delta does not collapse
/// to zero on a duplicate.
pub fn next_state(old: &TickerState, quote: &CexQuote, at: DateTime<Utc>) -> TickerState {
    let price = quote.midpoint();
    let previous_price = if price == old.price { old.previous_price } else { old.price };
    TickerState {
        price,
        previous_price,
        pct_change: format!("{}%", quote.price_change_percentage),
        updated_at: Some(at),
    }
}

#[derive(Debug)]
pub struct CexTicker {
    client: Client,
    base_url: String,
    symbol: String,
    quote: String,
    limiter: RateLimiter,
    tx: watch::Sender<TickerState>,
}

impl CexTicker {
    pub fn new(update_minutes: f64) -> Result<Self, SourceError> {
        Self::with_base_url(CEX_BASE_URL, update_minutes)
    }

    pub fn with_base_url(base_url: &str, update_minutes: f64) -> Result<Self, SourceError> {
        let (tx, _rx) = watch::channel(TickerState::initial());
        Ok(Self {
            client: build_client(Timeouts::default())?,
            base_url: base_url.to_string(),
            symbol: "BTC".to_string(),
            quote: "USD".to_string(),
            limiter: RateLimiter::from_minutes(update_minutes, CEX_FLOOR_SECS),
            tx,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<TickerState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> TickerState {
        self.tx.borrow().clone()
    }

    fn url(&self) -> String {
        join_url(&self.base_url, &format!("api/ticker/{}/{}", self.symbol, self.quote))
    }
}

#[async_trait]
impl SourceClient for CexTicker {
    type Reading = CexQuote;

    fn kind(&self) -> SourceKind {
        SourceKind::Cex
    }

    fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    async fn fetch(&self) -> Result<CexQuote, SourceError> {
        let quote: CexQuote = get_json(&self.client, &self.url(), NO_QUERY).await?;
        if !(quote.bid.is_finite() && quote.ask.is_finite()) {
            return Err(SourceError::MissingData("bid/ask".to_string()));
        }
        Ok(quote)
    }

    fn publish(&self, reading: CexQuote, at: DateTime<Utc>) {
        self.tx.send_modify(|state| *state = next_state(state, &reading, at));
    }

    fn attach(&self, snapshot: Snapshot) -> Snapshot {
        snapshot.with_cex(self.subscribe())
    }
}
