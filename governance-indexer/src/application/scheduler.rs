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
    application::{Indexer, IngestMode, context::SyncContext},
    domain::{
        anchor::AnchorResolver,
        clock::Clock,
        ledger::{LedgerIndex, VoteFilter},
        storage::Storage,
    },
};
use anyhow::Context;
use fastrace::trace;
use log::{info, warn};
use serde::Deserialize;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,

    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

/// Outcome of a batch sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<SyncFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub proposal_id: String,
    pub message: String,
}

/// Makes sure at most one batch sync runs at a time.
#[derive(Debug, Clone, Default)]
pub struct OverlapGuard(Arc<AtomicBool>);

impl OverlapGuard {
    pub fn try_acquire(&self) -> Option<OverlapPermit> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| OverlapPermit(self.0.clone()))
    }
}

/// Releases the [OverlapGuard] when dropped.
#[derive(Debug)]
pub struct OverlapPermit(Arc<AtomicBool>);

impl Drop for OverlapPermit {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<L, S, A, C> Indexer<L, S, A, C>
where
    L: LedgerIndex,
    S: Storage,
    A: AnchorResolver,
    C: Clock,
{
    /// Sync all proposals which are missing locally or still active, one after the other in
    /// ascending submission epoch order. Returns `None` if another run is in progress.
    #[trace]
    pub async fn sync_all_proposals(&self) -> anyhow::Result<Option<SyncSummary>> {
        let Some(_permit) = self.overlap_guard.try_acquire() else {
            warn!("sync already running, skipping");
            self.metrics.scheduler_runs_skipped.increment(1);
            return Ok(None);
        };

        self.metrics.scheduler_runs.increment(1);
        self.run_sync().await.map(Some)
    }

    async fn run_sync(&self) -> anyhow::Result<SyncSummary> {
        let current_epoch = self.current_epoch().await?;

        let external = self
            .ledger
            .list_proposals()
            .await
            .context("list proposals from ledger index")?;
        let statuses = self
            .storage
            .get_proposal_statuses()
            .await
            .context("get proposal statuses")?;

        let mut scoped = external
            .into_iter()
            .filter(|proposal| {
                statuses
                    .get(&proposal.proposal_id)
                    .is_none_or(|status| !status.is_terminal())
            })
            .collect::<Vec<_>>();
        scoped.sort_by(|a, b| {
            (a.epochs.submitted, &a.proposal_id).cmp(&(b.epochs.submitted, &b.proposal_id))
        });
        info!(current_epoch, total = scoped.len(); "starting sync");

        let mut ctx = SyncContext::new(current_epoch);
        if let Some(min_epoch) = scoped.iter().map(|proposal| proposal.epochs.submitted).min() {
            let filter = VoteFilter {
                proposal_id: None,
                min_epoch: Some(min_epoch),
            };

            match self.ledger.list_votes(&filter).await {
                Ok(votes) => ctx.cache_votes(votes),
                Err(error) => warn!(error:%; "cannot prefetch votes, fetching per proposal"),
            }
        }

        let mut summary = SyncSummary {
            total: scoped.len(),
            ..Default::default()
        };

        for external in scoped {
            let proposal_id = external.proposal_id.clone();

            match self
                .sync_proposal(external, &mut ctx, IngestMode::Batch)
                .await
            {
                Ok(_) => {
                    summary.success += 1;
                    self.metrics.proposals_synced.increment(1);
                }

                Err(error) => {
                    let message = format!("{error:#}");
                    warn!(proposal_id, error:% = message; "cannot sync proposal");
                    self.metrics.proposal_sync_failures.increment(1);

                    summary.failed += 1;
                    summary.errors.push(SyncFailure {
                        proposal_id,
                        message,
                    });
                }
            }
        }

        info!(
            total = summary.total,
            success = summary.success,
            failed = summary.failed;
            "sync completed"
        );

        Ok(summary)
    }
}
