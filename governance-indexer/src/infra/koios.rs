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

mod response;

use crate::{
    domain::{
        VoterClass, VoterMetadata, VotingSummary,
        anchor::parse_drep_metadata,
        ledger::{
            CertificateUpdate, ExternalProposal, ExternalVote, LedgerIndex, VoteFilter, VoterInfo,
        },
    },
    infra::{
        http::{self, HttpError, USER_AGENT},
        koios::response::{
            DrepInfoRow, DrepListRow, DrepMetadataRow, DrepUpdateRow, EpochInfoRow, PoolInfoRow,
            PowerRow, ProposalRow, TipRow, VoteRow, VotingSummaryRow,
        },
    },
};
use blockfrost::{BlockfrostAPI, BlockfrostError};
use fastrace::trace;
use futures::TryStreamExt;
use indexer_common::{
    retry::{Disposition, RetryPolicy, Retryable},
    stream::{flatten_chunks, offset_pages},
};
use log::{debug, warn};
use reqwest::{
    Url,
    header::{AUTHORIZATION, HeaderMap, HeaderValue, InvalidHeaderValue},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

type Params = Vec<(&'static str, String)>;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL, e.g. `https://api.koios.rest/api/v1`.
    pub url: String,

    /// Optional bearer token for higher rate limits.
    pub api_key: Option<SecretString>,

    pub page_size: usize,

    /// Maximum number of DRep ids per batch request.
    pub voter_info_batch_size: usize,

    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default)]
    pub genesis: GenesisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockfrostConfig {
    pub project_id: SecretString,
}

/// Shelley genesis parameters, used to convert block times into epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GenesisConfig {
    pub shelley_start_epoch: u32,

    /// Unix timestamp in seconds of the start of the first Shelley epoch.
    pub shelley_start_time: i64,

    #[serde(with = "humantime_serde")]
    pub epoch_length: Duration,
}

impl GenesisConfig {
    pub fn epoch_of(&self, block_time: i64) -> u32 {
        let elapsed = (block_time - self.shelley_start_time).max(0);
        self.shelley_start_epoch + (elapsed / self.epoch_length_secs()) as u32
    }

    pub fn epoch_start(&self, epoch: u32) -> i64 {
        let epochs = epoch.saturating_sub(self.shelley_start_epoch) as i64;
        self.shelley_start_time + epochs * self.epoch_length_secs()
    }

    fn epoch_length_secs(&self) -> i64 {
        (self.epoch_length.as_secs() as i64).max(1)
    }
}

/// Mainnet.
impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            shelley_start_epoch: 208,
            shelley_start_time: 1_596_059_091,
            epoch_length: Duration::from_secs(432_000),
        }
    }
}

/// [LedgerIndex] implementation based on the Koios REST API. SPO display metadata is taken from
/// Blockfrost if configured.
#[derive(Clone)]
pub struct KoiosClient {
    http: reqwest::Client,
    base_url: String,
    page_size: usize,
    voter_info_batch_size: usize,
    genesis: GenesisConfig,
    retry_policy: RetryPolicy,
    blockfrost: Option<BlockfrostAPI>,
}

impl KoiosClient {
    pub fn new(
        config: Config,
        blockfrost_config: Option<BlockfrostConfig>,
        retry_policy: RetryPolicy,
    ) -> Result<Self, KoiosError> {
        let Config {
            url,
            api_key,
            page_size,
            voter_info_batch_size,
            timeout,
            genesis,
        } = config;

        Url::parse(&url).map_err(|error| KoiosError::Url(error.to_string()))?;

        let mut headers = HeaderMap::new();
        if let Some(api_key) = api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(KoiosError::Client)?;

        let blockfrost = blockfrost_config.map(|config| {
            BlockfrostAPI::new(config.project_id.expose_secret(), Default::default())
        });

        Ok(Self {
            http,
            base_url: url.trim_end_matches('/').to_owned(),
            page_size: page_size.max(1),
            voter_info_batch_size: voter_info_batch_size.max(1),
            genesis,
            retry_policy,
            blockfrost,
        })
    }

    fn url(&self, path: &str, params: &[(&'static str, String)]) -> Result<Url, KoiosError> {
        Url::parse_with_params(&format!("{}/{path}", self.base_url), params)
            .map_err(|error| KoiosError::Url(error.to_string()))
    }

    async fn get<T>(&self, path: &str, params: &[(&'static str, String)]) -> Result<T, KoiosError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(path, params)?;
        debug!(url:%; "GET");

        let response = self
            .retry_policy
            .run(|| http::send_json(self.http.get(url.clone())))
            .await?;

        Ok(response)
    }

    async fn post<T, B>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
        body: &B,
    ) -> Result<T, KoiosError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let url = self.url(path, params)?;
        debug!(url:%; "POST");

        let response = self
            .retry_policy
            .run(|| http::send_json(self.http.post(url.clone()).json(body)))
            .await?;

        Ok(response)
    }

    /// Fetch all rows of the given endpoint page by page.
    async fn get_all<T>(&self, path: &str, params: Params) -> Result<Vec<T>, KoiosError>
    where
        T: DeserializeOwned + Send,
    {
        let page_size = self.page_size;

        let pages = offset_pages(page_size, |offset| {
            let mut params = params.clone();
            params.push(("offset", offset.to_string()));
            params.push(("limit", page_size.to_string()));

            async move { self.get::<Vec<T>>(path, &params).await }
        });

        flatten_chunks(pages).try_collect().await
    }

    async fn get_blockfrost_pool_metadata(
        &self,
        blockfrost: &BlockfrostAPI,
        pool_id: &str,
    ) -> Result<VoterMetadata, KoiosError> {
        let metadata = self
            .retry_policy
            .run(|| async move {
                blockfrost
                    .pools_metadata(pool_id)
                    .await
                    .map_err(KoiosError::from)
            })
            .await?;

        Ok(VoterMetadata {
            name: metadata.name,
            ticker: metadata.ticker,
            payment_address: None,
            icon_url: None,
        })
    }

    async fn get_koios_pool_metadata(
        &self,
        pool_id: &str,
    ) -> Result<Option<VoterMetadata>, KoiosError> {
        let rows = self
            .post::<Vec<PoolInfoRow>, _>(
                "pool_info",
                &[],
                &json!({ "_pool_bech32_ids": [pool_id] }),
            )
            .await?;

        Ok(rows
            .into_iter()
            .find(|row| row.pool_id_bech32 == pool_id)
            .map(VoterMetadata::from))
    }
}

impl LedgerIndex for KoiosClient {
    type Error = KoiosError;

    #[trace]
    async fn get_current_epoch(&self) -> Result<u32, Self::Error> {
        let tip = self.get::<Vec<TipRow>>("tip", &[]).await?;
        tip.first().map(|tip| tip.epoch_no).ok_or(KoiosError::NoTip)
    }

    #[trace]
    async fn list_proposals(&self) -> Result<Vec<ExternalProposal>, Self::Error> {
        let params = vec![("order", "proposed_epoch.asc,proposal_id.asc".to_owned())];

        let rows = self.get_all::<ProposalRow>("proposal_list", params).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[trace]
    async fn get_proposal(
        &self,
        proposal_id: &str,
    ) -> Result<Option<ExternalProposal>, Self::Error> {
        let params = [("proposal_id", format!("eq.{proposal_id}"))];

        let rows = self.get::<Vec<ProposalRow>>("proposal_list", &params).await?;
        Ok(rows.into_iter().next().map(Into::into))
    }

    #[trace]
    async fn list_votes(&self, filter: &VoteFilter) -> Result<Vec<ExternalVote>, Self::Error> {
        let mut params = vec![("order", "block_time.asc,vote_tx_hash.asc".to_owned())];
        if let Some(proposal_id) = &filter.proposal_id {
            params.push(("proposal_id", format!("eq.{proposal_id}")));
        }
        if let Some(min_epoch) = filter.min_epoch {
            params.push(("epoch_no", format!("gte.{min_epoch}")));
        }

        let rows = self.get_all::<VoteRow>("vote_list", params).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[trace]
    async fn get_proposal_voting_summary(
        &self,
        proposal_id: &str,
    ) -> Result<Option<VotingSummary>, Self::Error> {
        let params = [("_proposal_id", proposal_id.to_owned())];

        let rows = self
            .get::<Vec<VotingSummaryRow>>("proposal_voting_summary", &params)
            .await?;
        Ok(rows.into_iter().next().map(Into::into))
    }

    #[trace]
    async fn get_voter_power(
        &self,
        class: VoterClass,
        voter_id: &str,
        epoch: u32,
    ) -> Result<Option<u64>, Self::Error> {
        let (path, params) = match class {
            VoterClass::DRep => (
                "drep_voting_power_history",
                [("_drep_id", voter_id.to_owned()), ("_epoch_no", epoch.to_string())],
            ),
            VoterClass::Spo => (
                "pool_voting_power_history",
                [("_pool_bech32", voter_id.to_owned()), ("_epoch_no", epoch.to_string())],
            ),
            VoterClass::Cc => return Ok(None),
        };

        let rows = self.get::<Vec<PowerRow>>(path, &params).await?;
        Ok(rows.into_iter().next().and_then(|row| row.amount))
    }

    #[trace]
    async fn get_voter_info(&self, drep_ids: &[String]) -> Result<Vec<VoterInfo>, Self::Error> {
        let mut infos = Vec::with_capacity(drep_ids.len());

        for body in drep_info_bodies(drep_ids, self.voter_info_batch_size) {
            let rows = self
                .post::<Vec<DrepInfoRow>, _>("drep_info", &[], &body)
                .await?;

            infos.extend(rows.into_iter().map(|row| VoterInfo {
                voter_id: row.drep_id,
                active: row.active,
                amount: row.amount.unwrap_or_default(),
            }));
        }

        Ok(infos)
    }

    #[trace]
    async fn get_total_voting_power(
        &self,
        class: VoterClass,
        epoch: u32,
    ) -> Result<u64, Self::Error> {
        let params = [("_epoch_no", epoch.to_string())];

        match class {
            VoterClass::DRep => {
                let rows = self
                    .get::<Vec<PowerRow>>("drep_epoch_summary", &params)
                    .await?;
                Ok(rows
                    .into_iter()
                    .next()
                    .and_then(|row| row.amount)
                    .unwrap_or_default())
            }

            VoterClass::Spo => {
                let rows = self.get::<Vec<EpochInfoRow>>("epoch_info", &params).await?;
                Ok(rows
                    .into_iter()
                    .next()
                    .and_then(|row| row.active_stake)
                    .unwrap_or_default())
            }

            VoterClass::Cc => Ok(0),
        }
    }

    #[trace]
    async fn list_drep_ids(&self) -> Result<Vec<String>, Self::Error> {
        let params = vec![("order", "drep_id.asc".to_owned())];

        let rows = self.get_all::<DrepListRow>("drep_list", params).await?;
        Ok(rows
            .into_iter()
            .filter(|row| row.registered)
            .map(|row| row.drep_id)
            .collect())
    }

    #[trace]
    async fn list_drep_certificate_updates(
        &self,
        from_epoch: u32,
        to_epoch: u32,
    ) -> Result<Vec<CertificateUpdate>, Self::Error> {
        let from = self.genesis.epoch_start(from_epoch);
        let to = self.genesis.epoch_start(to_epoch + 1);
        let params = vec![
            ("and", format!("(block_time.gte.{from},block_time.lt.{to})")),
            ("order", "block_time.asc".to_owned()),
        ];

        let rows = self.get_all::<DrepUpdateRow>("drep_updates", params).await?;
        Ok(rows
            .into_iter()
            .map(|row| CertificateUpdate {
                drep_id: row.drep_id,
                epoch: self.genesis.epoch_of(row.block_time),
            })
            .collect())
    }

    #[trace]
    async fn list_drep_powers(&self, epoch: u32) -> Result<Vec<(String, u64)>, Self::Error> {
        let params = vec![
            ("_epoch_no", epoch.to_string()),
            ("order", "drep_id.asc".to_owned()),
        ];

        let rows = self
            .get_all::<PowerRow>("drep_voting_power_history", params)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| Some((row.drep_id?, row.amount.unwrap_or_default())))
            .collect())
    }

    #[trace]
    async fn get_voter_metadata(
        &self,
        class: VoterClass,
        voter_id: &str,
    ) -> Result<Option<VoterMetadata>, Self::Error> {
        match class {
            VoterClass::DRep => {
                let rows = self
                    .post::<Vec<DrepMetadataRow>, _>(
                        "drep_metadata",
                        &[],
                        &json!({ "_drep_ids": [voter_id] }),
                    )
                    .await?;

                Ok(rows
                    .into_iter()
                    .find(|row| row.drep_id == voter_id)
                    .and_then(|row| row.meta_json)
                    .map(|document| parse_drep_metadata(&document)))
            }

            VoterClass::Spo => {
                if let Some(blockfrost) = &self.blockfrost {
                    match self.get_blockfrost_pool_metadata(blockfrost, voter_id).await {
                        Ok(metadata) => return Ok(Some(metadata)),
                        Err(error) => warn!(
                            error:%, pool_id = voter_id;
                            "cannot get pool metadata from Blockfrost"
                        ),
                    }
                }

                self.get_koios_pool_metadata(voter_id).await
            }

            VoterClass::Cc => Ok(None),
        }
    }
}

#[derive(Debug, Error)]
pub enum KoiosError {
    #[error("cannot create HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(String),

    #[error("cannot create authorization header")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),

    #[error("Koios request failed")]
    Http(#[from] HttpError),

    #[error("chain tip not available")]
    NoTip,

    #[error("Blockfrost request failed")]
    Blockfrost(#[from] BlockfrostError),

    #[error("giving up after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<KoiosError>,
    },
}

/// Only Blockfrost calls are retried at this level; Koios requests are retried per HTTP exchange.
impl Retryable for KoiosError {
    fn disposition(&self) -> Disposition {
        match self {
            KoiosError::Http(error) => error.disposition(),

            KoiosError::Blockfrost(BlockfrostError::Reqwest { reason, .. })
                if !reason.is_builder() =>
            {
                Disposition::Transient { retry_after: None }
            }

            KoiosError::Blockfrost(BlockfrostError::Response { reason, .. })
                if reason.status_code == 429 || reason.status_code >= 500 =>
            {
                Disposition::Transient { retry_after: None }
            }

            _ => Disposition::Permanent,
        }
    }

    fn exhausted(self, attempts: u32) -> Self {
        KoiosError::Exhausted {
            attempts,
            source: Box::new(self),
        }
    }
}

/// Request bodies for `drep_info`, each with at most `batch_size` ids.
fn drep_info_bodies(drep_ids: &[String], batch_size: usize) -> Vec<Value> {
    drep_ids
        .chunks(batch_size.max(1))
        .map(|chunk| json!({ "_drep_ids": chunk }))
        .collect()
}
