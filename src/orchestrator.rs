/*
 *  orchestrator.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *  One long-lived refresh worker per source, woken by display ticks
 *  or by its own cooldown timer
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

use chrono::Utc;
use log::{debug, info, trace, warn};
use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::SourceError;
use crate::ratelimit::epoch_secs;
use crate::snapshot::{LastOutcome, Snapshot, SourceKind, SourceStatus};
use crate::sources::{
    BlockchainTicker, CexTicker, NoaaForecast, OpenWeatherMap, RefreshOutcome, SourceClient,
};

/// Spread worker start-up so the providers are not all hit in the same instant.
const STARTUP_JITTER_MS: u64 = 500;
/// Added to the cooldown so the timer lands just after the gate reopens.
const TIMER_SLACK: Duration = Duration::from_millis(50);

struct Worker {
    kind: SourceKind,
    handle: JoinHandle<()>,
}

/// Owns every configured source. `tick` only publishes a timestamp; all
/// network work happens on the workers.
pub struct RefreshOrchestrator {
    tick_tx: watch::Sender<f64>,
    stop_tx: watch::Sender<bool>,
    snapshot: Snapshot,
    workers: Vec<Worker>,
}

impl RefreshOrchestrator {
    pub fn new() -> Self {
        let (tick_tx, _) = watch::channel(f64::NEG_INFINITY);
        let (stop_tx, _) = watch::channel(false);
        Self {
            tick_tx,
            stop_tx,
            snapshot: Snapshot::default(),
            workers: Vec::new(),
        }
    }

    /// Build and start every source with a section in `cfg`.
    /// Must be called from within a tokio runtime.
    pub fn from_config(cfg: &Config) -> Result<Self, SourceError> {
        let mut orch = Self::new();
        if let Some(cex) = cfg.cex.as_ref() {
            orch.add_source(CexTicker::new(cex.update_minutes())?);
        }
        if let Some(bci) = cfg.blockchain.as_ref() {
            orch.add_source(BlockchainTicker::new(bci.update_minutes())?);
        }
        if let Some(owm) = cfg.openweathermap.as_ref() {
            orch.add_source(OpenWeatherMap::new(
                owm.lat.unwrap_or_default(),
                owm.lon.unwrap_or_default(),
                owm.api_key.as_deref().unwrap_or_default(),
                owm.update_minutes(),
            )?);
        }
        if let Some(noaa) = cfg.noaa.as_ref() {
            orch.add_source(NoaaForecast::new(
                noaa.lat.unwrap_or_default(),
                noaa.lon.unwrap_or_default(),
                noaa.state.as_deref().unwrap_or_default(),
                noaa.cooldown_secs(),
            )?);
        }
        Ok(orch)
    }

    /// Hand `client` to a new worker task.
    pub fn add_source<S>(&mut self, client: S)
    where
        S: SourceClient + 'static,
    {
        let kind = client.kind();
        let (status_tx, status_rx) = watch::channel(SourceStatus::default());

        let snapshot = std::mem::take(&mut self.snapshot);
        self.snapshot = client.attach(snapshot);
        self.snapshot.add_status(kind, status_rx);

        let ticks = self.tick_tx.subscribe();
        let stop = self.stop_tx.subscribe();
        let handle = tokio::spawn(run_worker(client, ticks, stop, status_tx));
        info!("{}: refresh worker started", kind);
        self.workers.push(Worker { kind, handle });
    }

    /// Offer a refresh to every source. Never waits on the network; ticks
    /// that arrive while a worker is busy collapse into the latest one.
    pub fn tick(&self, now: f64) {
        self.tick_tx.send_replace(now);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.clone()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Stop every worker, abandoning in-flight attempts, and wait for them.
    pub async fn shutdown(mut self) {
        self.stop_tx.send_replace(true);
        for worker in std::mem::take(&mut self.workers) {
            if let Err(e) = worker.handle.await {
                warn!("{}: worker ended abnormally: {}", worker.kind, e);
            }
        }
        info!("refresh workers stopped");
    }
}

impl Default for RefreshOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RefreshOrchestrator {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            debug!("orchestrator dropped, signalling {} workers", self.workers.len());
        }
        self.stop_tx.send_replace(true);
    }
}

/// Wait for a tick, the cooldown timer, or stop. Returns the attempt time,
/// `None` when the worker should exit.
async fn next_wake(
    ticks: &mut watch::Receiver<f64>,
    stop: &mut watch::Receiver<bool>,
    sleep_for: Duration,
) -> Option<f64> {
    tokio::select! {
        _ = stop.changed() => None,
        changed = ticks.changed() => match changed {
            Ok(()) => Some(*ticks.borrow_and_update()),
            Err(_) => None,
        },
        _ = tokio::time::sleep(sleep_for) => Some(epoch_secs()),
    }
}

fn cooldown_sleep<S: SourceClient>(client: &S) -> Duration {
    let limiter = client.rate_limiter();
    let secs = limiter.remaining(epoch_secs()).min(limiter.min_interval_secs());
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO) + TIMER_SLACK
}

async fn run_worker<S: SourceClient>(
    client: S,
    mut ticks: watch::Receiver<f64>,
    mut stop: watch::Receiver<bool>,
    status: watch::Sender<SourceStatus>,
) {
    let kind = client.kind();
    let mut sleep_for = Duration::from_millis(rand::rng().random_range(0..=STARTUP_JITTER_MS));

    while !*stop.borrow() {
        let Some(now) = next_wake(&mut ticks, &mut stop, sleep_for).await else {
            break;
        };
        let outcome = tokio::select! {
            _ = stop.changed() => break,
            outcome = client.refresh(now) => outcome,
        };
        record_outcome(kind, &status, outcome);
        sleep_for = cooldown_sleep(&client);
    }
    debug!("{}: refresh worker exiting", kind);
}

fn record_outcome(kind: SourceKind, status: &watch::Sender<SourceStatus>, outcome: RefreshOutcome) {
    let at = Utc::now();
    match outcome {
        RefreshOutcome::Skipped => {
            trace!("{}: cooldown active, skipped", kind);
        }
        RefreshOutcome::Updated => {
            info!("{}: updated", kind);
            status.send_modify(|s| {
                s.last_outcome = LastOutcome::Updated;
                s.last_attempt = Some(at);
                s.last_success = Some(at);
                s.consecutive_failures = 0;
            });
        }
        RefreshOutcome::Failed(e) => {
            warn!("{}: refresh failed: {}", kind, e);
            status.send_modify(|s| {
                s.last_outcome = LastOutcome::Failed(e.to_string());
                s.last_attempt = Some(at);
                s.consecutive_failures = s.consecutive_failures.saturating_add(1);
            });
        }
    }
}
