/*
 *  error.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error types shared by the data sources
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

use thiserror::Error;

/// Why a refresh attempt was abandoned.
///
/// Every variant is handled the same way by the caller: the attempt is
/// dropped, the last good state is kept, and the cooldown stays stamped.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection, TLS or body read failure.
    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The attempt ran past its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Body was not the JSON shape we expect.
    #[error("JSON deserialization error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Body parsed but a required value is absent or unusable.
    #[error("missing data: {0}")]
    MissingData(String),
}

impl SourceError {
    /// Transport-class failures (network, status, deadline) as opposed to
    /// responses that arrived but could not be understood.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SourceError::Transport(_) | SourceError::Status { .. } | SourceError::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_classes() {
        let e = SourceError::Status { url: "http://x".into(), status: 503 };
        assert!(e.is_transport());
        assert_eq!(e.to_string(), "HTTP 503 from http://x");

        assert!(SourceError::Timeout(Duration::from_secs(5)).is_transport());
        assert!(!SourceError::MissingData("USD".into()).is_transport());

        let bad: Result<u32, _> = serde_json::from_str("{");
        let e: SourceError = bad.unwrap_err().into();
        assert!(!e.is_transport());
    }
}
