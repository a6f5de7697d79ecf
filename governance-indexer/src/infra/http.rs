// This file is part of midnight-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use indexer_common::retry::{Disposition, Retryable, parse_retry_after};
use reqwest::{RequestBuilder, StatusCode, header::RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// `User-Agent` of all outbound requests.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Error of a single HTTP exchange, classified for retrying.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("cannot send request")]
    Transport(#[source] reqwest::Error),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("server error {0}")]
    Server(StatusCode),

    #[error("client error {status}: {body}")]
    Client { status: StatusCode, body: String },

    #[error("cannot decode response body")]
    Decode(#[source] reqwest::Error),

    #[error("giving up after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<HttpError>,
    },
}

impl HttpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HttpError::Client { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

impl Retryable for HttpError {
    fn disposition(&self) -> Disposition {
        match self {
            HttpError::Transport(error) if !error.is_builder() => {
                Disposition::Transient { retry_after: None }
            }

            HttpError::RateLimited { retry_after } => Disposition::Transient {
                retry_after: *retry_after,
            },

            HttpError::Server(_) => Disposition::Transient { retry_after: None },

            _ => Disposition::Permanent,
        }
    }

    fn exhausted(self, attempts: u32) -> Self {
        HttpError::Exhausted {
            attempts,
            source: Box::new(self),
        }
    }
}

/// Send the given request and decode a successful JSON response body.
pub async fn send_json<T>(request: RequestBuilder) -> Result<T, HttpError>
where
    T: DeserializeOwned,
{
    let response = request.send().await.map_err(HttpError::Transport)?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        return Err(HttpError::RateLimited { retry_after });
    }

    if status.is_server_error() {
        return Err(HttpError::Server(status));
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HttpError::Client { status, body });
    }

    response.json::<T>().await.map_err(HttpError::Decode)
}
