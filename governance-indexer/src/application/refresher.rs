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
    application::Indexer,
    domain::{anchor::AnchorResolver, clock::Clock, ledger::LedgerIndex, storage::Storage},
};
use anyhow::Context;
use fastrace::trace;
use log::{info, warn};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Deserialize)]
pub struct VoterRefreshConfig {
    pub enabled: bool,

    /// How often a page of voters is refreshed.
    #[serde(with = "humantime_serde")]
    pub period: Duration,

    /// Number of voters refreshed per period.
    pub page_size: u32,

    /// Maximum number of voters refreshed per second; zero disables throttling.
    pub max_rps: u32,
}

impl<L, S, A, C> Indexer<L, S, A, C>
where
    L: LedgerIndex,
    S: Storage,
    A: AnchorResolver,
    C: Clock,
{
    /// Refresh the next page of voters after the persisted cursor, wrapping around to the first
    /// voter at the end. Returns the number of refreshed voters.
    #[trace]
    pub(crate) async fn refresh_voters(
        &self,
        config: &VoterRefreshConfig,
    ) -> anyhow::Result<usize> {
        let current_epoch = self.current_epoch().await?;
        let limit = config.page_size.max(1);

        let cursor = self
            .storage
            .get_voter_refresh_cursor()
            .await
            .context("get voter refresh cursor")?;

        let mut keys = self
            .storage
            .get_voter_keys_after(cursor.as_ref(), limit)
            .await
            .context("get voter keys")?;

        if keys.is_empty() && cursor.is_some() {
            keys = self
                .storage
                .get_voter_keys_after(None, limit)
                .await
                .context("get voter keys")?;
        }

        if keys.is_empty() {
            return Ok(0);
        }

        let delay =
            (config.max_rps > 0).then(|| Duration::from_millis(1_000 / config.max_rps as u64));

        let mut refreshed = 0;
        for key in &keys {
            match self.refresh_voter(key, current_epoch).await {
                Ok(_) => refreshed += 1,
                Err(error) => {
                    let error = format!("{error:#}");
                    warn!(voter:% = key, error; "cannot refresh voter");
                }
            }

            if let Some(delay) = delay {
                sleep(delay).await;
            }
        }

        let cursor = keys.last();
        self.storage
            .set_voter_refresh_cursor(cursor)
            .await
            .context("set voter refresh cursor")?;

        info!(refreshed, cursor:? = cursor; "voter refresh completed");

        Ok(refreshed)
    }
}
