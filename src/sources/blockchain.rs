/*
 *  sources/blockchain.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *  blockchain.info BTC spot ticker
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
use std::collections::HashMap;
use tokio::sync::watch;

use crate::deutils::deserialize_numeric_f64;
use crate::error::SourceError;
use crate::httpclient::{build_client, get_json, join_url, Timeouts};
use crate::ratelimit::RateLimiter;
use crate::snapshot::{Snapshot, SourceKind, SpotState};
use super::SourceClient;

pub const BLOCKCHAIN_BASE_URL: &str = "https://blockchain.info";
/// blockchain.info asks for no more than one call a minute.
pub const BLOCKCHAIN_FLOOR_SECS: f64 = 60.0;

const NO_QUERY: &[(&str, &str)] = &[];

#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyRate {
    #[serde(deserialize_with = "deserialize_numeric_f64")]
    pub last: f64,
}

/// `/ticker` is keyed by currency code: `{"USD": {...}, "EUR": {...}}`.
pub type TickerTable = HashMap<String, CurrencyRate>;

#[derive(Debug)]
pub struct BlockchainTicker {
    client: Client,
    base_url: String,
    currency: String,
    limiter: RateLimiter,
    tx: watch::Sender<SpotState>,
}

impl BlockchainTicker {
    pub fn new(update_minutes: f64) -> Result<Self, SourceError> {
        Self::with_base_url(BLOCKCHAIN_BASE_URL, update_minutes)
    }

    pub fn with_base_url(base_url: &str, update_minutes: f64) -> Result<Self, SourceError> {
        let (tx, _rx) = watch::channel(SpotState::default());
        Ok(Self {
            client: build_client(Timeouts::default())?,
            base_url: base_url.to_string(),
            currency: "USD".to_string(),
            limiter: RateLimiter::from_minutes(update_minutes, BLOCKCHAIN_FLOOR_SECS),
            tx,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<SpotState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> SpotState {
        self.tx.borrow().clone()
    }
}

#[async_trait]
impl SourceClient for BlockchainTicker {
    type Reading = f64;

    fn kind(&self) -> SourceKind {
        SourceKind::Blockchain
    }

    fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    async fn fetch(&self) -> Result<f64, SourceError> {
        let url = join_url(&self.base_url, "ticker");
        let table: TickerTable = get_json(&self.client, &url, NO_QUERY).await?;
        table
            .get(&self.currency)
            .map(|rate| rate.last)
            .filter(|last| last.is_finite())
            .ok_or_else(|| SourceError::MissingData(format!("{}.last", self.currency)))
    }

    fn publish(&self, price: f64, at: DateTime<Utc>) {
        self.tx.send_modify(|state| {
            *state = SpotState {
                price,
                previous_price: state.price,
                updated_at: Some(at),
            }
        });
    }

    fn attach(&self, snapshot: Snapshot) -> Snapshot {
        snapshot.with_blockchain(self.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::RefreshOutcome;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ticker_body(last: f64) -> serde_json::Value {
        serde_json::json!({
            "USD": { "15m": last, "last": last, "buy": last, "sell": last, "symbol": "$" },
            "EUR": { "15m": 1.0, "last": 1.0, "buy": 1.0, "sell": 1.0, "symbol": "€" }
        })
    }

    #[test]
    fn test_cooldown_floor() {
        let t = BlockchainTicker::with_base_url("http://localhost", 0.1).unwrap();
        assert_eq!(t.rate_limiter().min_interval_secs(), 60.0);
    }

    #[tokio::test]
    async fn test_previous_price_tracks_last_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ticker"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticker_body(64000.0)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ticker"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ticker_body(64100.0)))
            .mount(&server)
            .await;

        let t = BlockchainTicker::with_base_url(&server.uri(), 1.0).unwrap();
        assert!(t.refresh(0.0).await.is_updated());
        assert_eq!(t.state().price, 64000.0);
        assert_eq!(t.state().previous_price, 0.0);

        assert!(t.refresh(60.0).await.is_updated());
        let s = t.state();
        assert_eq!((s.price, s.previous_price), (64100.0, 64000.0));
        assert_eq!(s.delta_display(), "+100.00");
    }

    #[tokio::test]
    async fn test_missing_currency_is_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "EUR": { "last": 1.0, "symbol": "€" }
            })))
            .mount(&server)
            .await;

        let t = BlockchainTicker::with_base_url(&server.uri(), 1.0).unwrap();
        let outcome = t.refresh(0.0).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(SourceError::MissingData(_))));
        assert_eq!(t.state(), SpotState::default());
    }
}
