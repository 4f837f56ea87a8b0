/*
 *  sources/mod.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *  Rate limited data sources: market tickers, current weather and the
 *  NWS forecast pipeline
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

pub mod blockchain;
pub mod cex;
pub mod noaa;
pub mod openweather;

pub use blockchain::BlockchainTicker;
pub use cex::CexTicker;
pub use noaa::NoaaForecast;
pub use openweather::OpenWeatherMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::SourceError;
use crate::ratelimit::RateLimiter;
use crate::snapshot::{Snapshot, SourceKind};

/// Ceiling on one whole refresh attempt, every HTTP stage included.
pub const DEFAULT_ATTEMPT_DEADLINE: Duration = Duration::from_secs(30);

/// Result of offering a refresh to a source.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Cooldown still running; no I/O happened.
    Skipped,
    Updated,
    /// Attempt abandoned; the published state is unchanged.
    Failed(SourceError),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshOutcome::Updated)
    }
}

/// One provider. Implementors supply `fetch` and `publish`; `refresh` wires
/// them behind the cooldown gate.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Parsed response, before it is folded into the published state.
    type Reading: Send;

    fn kind(&self) -> SourceKind;

    fn rate_limiter(&self) -> &RateLimiter;

    fn deadline(&self) -> Duration {
        DEFAULT_ATTEMPT_DEADLINE
    }

    /// Network I/O plus parsing. Must not touch published state.
    async fn fetch(&self) -> Result<Self::Reading, SourceError>;

    /// Replace the published record in one step.
    fn publish(&self, reading: Self::Reading, at: DateTime<Utc>);

    /// Hand the snapshot a receiver for this source's published record.
    fn attach(&self, snapshot: Snapshot) -> Snapshot;

    /// Gate, fetch, publish. The cooldown is stamped before the fetch, so a
    /// failing provider is not retried until the window passes.
    async fn refresh(&self, now: f64) -> RefreshOutcome {
        if !self.rate_limiter().try_acquire(now) {
            return RefreshOutcome::Skipped;
        }
        let deadline = self.deadline();
        match tokio::time::timeout(deadline, self.fetch()).await {
            Ok(Ok(reading)) => {
                self.publish(reading, Utc::now());
                RefreshOutcome::Updated
            }
            Ok(Err(e)) => RefreshOutcome::Failed(e),
            Err(_) => RefreshOutcome::Failed(SourceError::Timeout(deadline)),
        }
    }
}
