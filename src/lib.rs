/*
 *  lib.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
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

pub mod config;
pub mod deutils;
pub mod error;
pub mod forecast;
pub mod httpclient;
pub mod orchestrator;
pub mod pacer;
pub mod ratelimit;
pub mod readout;
pub mod snapshot;
pub mod sources;

pub use error::SourceError;
pub use orchestrator::RefreshOrchestrator;
pub use ratelimit::{epoch_secs, RateLimiter};
pub use snapshot::{Snapshot, SourceKind};
pub use sources::{RefreshOutcome, SourceClient};
