/*
 *  httpclient.rs
 *
 *  ambidash - always-on glance board
 *  (c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use log::debug;
use reqwest::{Client, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::SourceError;

pub const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

/// Connect and whole-request deadlines for one HTTP call.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(3),
            request: Duration::from_secs(10),
        }
    }
}

/// Client with the headers every provider gets. api.weather.gov rejects
/// requests without a User-Agent.
pub fn build_client(timeouts: Timeouts) -> Result<Client, SourceError> {
    let mut headers = header::HeaderMap::new();
    headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
    headers.insert("Accept", header::HeaderValue::from_static("application/json"));
    headers.insert("Connection", header::HeaderValue::from_static("close"));

    let client = Client::builder()
        .connect_timeout(timeouts.connect)
        .default_headers(headers)
        .timeout(timeouts.request)
        .build()?;
    Ok(client)
}

/// GET `url` and decode the body as `T`.
///
/// Non-2xx maps to [`SourceError::Status`]; a body that does not fit `T`
/// maps to [`SourceError::Parse`].
pub async fn get_json<T, Q>(client: &Client, url: &str, query: &Q) -> Result<T, SourceError>
where
    T: DeserializeOwned,
    Q: Serialize + ?Sized,
{
    let response = client.get(url).query(query).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    debug!("GET {} -> {} bytes", url, body.len());
    let parsed = serde_json::from_str::<T>(&body)?;
    Ok(parsed)
}

/// Join a base URL and a path without doubling the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
