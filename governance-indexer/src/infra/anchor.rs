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

use crate::{
    domain::anchor::AnchorResolver,
    infra::http::{self, HttpError, USER_AGENT},
};
use fastrace::trace;
use indexer_common::retry::RetryPolicy;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const IPFS_SCHEME: &str = "ipfs://";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP gateway prefix for `ipfs://` URIs, e.g. `https://ipfs.io/ipfs`.
    pub ipfs_gateway: String,

    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// [AnchorResolver] implementation fetching documents via HTTP(S), translating `ipfs://` URIs to
/// the configured gateway.
#[derive(Debug, Clone)]
pub struct HttpAnchorResolver {
    http: reqwest::Client,
    ipfs_gateway: String,
    retry_policy: RetryPolicy,
}

impl HttpAnchorResolver {
    pub fn new(config: Config, retry_policy: RetryPolicy) -> Result<Self, AnchorError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(AnchorError::Client)?;

        Ok(Self {
            http,
            ipfs_gateway: config.ipfs_gateway.trim_end_matches('/').to_owned(),
            retry_policy,
        })
    }

    /// Translate the given anchor URL into an HTTP(S) URL.
    pub fn resolve_url(&self, url: &str) -> Result<String, AnchorError> {
        let url = url.trim();

        if let Some(path) = url.strip_prefix(IPFS_SCHEME) {
            let path = path.strip_prefix("ipfs/").unwrap_or(path);
            return Ok(format!("{}/{path}", self.ipfs_gateway));
        }

        if url.starts_with("https://") || url.starts_with("http://") {
            Ok(url.to_owned())
        } else {
            Err(AnchorError::UnsupportedUrl(url.to_owned()))
        }
    }
}

impl AnchorResolver for HttpAnchorResolver {
    type Error = AnchorError;

    #[trace]
    async fn fetch(&self, url: &str) -> Result<Value, Self::Error> {
        let url = self.resolve_url(url)?;

        let document = self
            .retry_policy
            .run(|| http::send_json::<Value>(self.http.get(&url)))
            .await?;

        Ok(document)
    }
}

#[derive(Debug, Error)]
pub enum AnchorError {
    #[error("cannot create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("unsupported anchor URL {0}")]
    UnsupportedUrl(String),

    #[error("cannot fetch anchor document")]
    Http(#[from] HttpError),
}
