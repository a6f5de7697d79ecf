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

mod aggregator;
mod context;
mod ingestor;
mod metrics;
mod reconciler;
mod refresher;
mod registry;
mod scheduler;
mod synchronizer;
#[cfg(test)]
mod testing;
mod trigger;

pub use aggregator::AggregatorConfig;
pub use ingestor::{IngestMode, IngestOptions, IngestStats};
pub use refresher::VoterRefreshConfig;
pub use scheduler::{SchedulerConfig, SyncFailure, SyncSummary};
pub use trigger::{SyncScope, TriggerConfig, TriggerOutcome};

use crate::{
    application::{
        context::SyncContext, metrics::Metrics, scheduler::OverlapGuard, trigger::SyncTrigger,
    },
    domain::{
        Proposal, Voter, VoterClass, VoterKey,
        anchor::AnchorResolver,
        clock::{Clock, SystemClock},
        ledger::LedgerIndex,
        storage::Storage,
    },
};
use anyhow::Context;
use fastrace::trace;
use log::{error, info, warn};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    select,
    signal::unix::Signal,
    task,
    time::{MissedTickBehavior, interval},
};

const MIN_SCHEDULER_INTERVAL: Duration = Duration::from_secs(1);
const MIN_VOTER_REFRESH_PERIOD: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "scheduler")]
    pub scheduler_config: SchedulerConfig,

    #[serde(rename = "trigger")]
    pub trigger_config: TriggerConfig,

    #[serde(rename = "voter_refresh")]
    pub voter_refresh_config: VoterRefreshConfig,

    #[serde(rename = "aggregator")]
    pub aggregator_config: AggregatorConfig,
}

/// Run the batch sync scheduler and the voter refresher until SIGTERM is received. In-progress
/// syncs are abandoned on shutdown; the next run converges.
pub async fn run(
    config: Config,
    ledger: impl LedgerIndex,
    storage: impl Storage,
    anchors: impl AnchorResolver,
    mut sigterm: Signal,
) -> anyhow::Result<()> {
    let indexer = Indexer::new(&config, ledger, storage, anchors, SystemClock);

    let Config {
        scheduler_config,
        voter_refresh_config,
        ..
    } = config;

    if voter_refresh_config.enabled {
        task::spawn({
            let indexer = indexer.clone();

            async move {
                let period = voter_refresh_config.period.max(MIN_VOTER_REFRESH_PERIOD);
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // The first tick completes immediately; skip it to not refresh right on startup.
                ticker.tick().await;

                loop {
                    ticker.tick().await;
                    if let Err(error) = indexer.refresh_voters(&voter_refresh_config).await {
                        error!(error:% = format!("{error:#}"); "voter refresh failed");
                    }
                }
            }
        });
    }

    if !scheduler_config.enabled {
        info!("scheduler disabled");
        sigterm.recv().await;
        warn!("SIGTERM received");
        return Ok(());
    }

    info!(interval:? = scheduler_config.interval; "starting scheduler");
    let mut ticker = interval(scheduler_config.interval.max(MIN_SCHEDULER_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        select! {
            _ = ticker.tick() => {
                let indexer = indexer.clone();

                task::spawn(async move {
                    if let Err(error) = indexer.sync_all_proposals().await {
                        error!(error:% = format!("{error:#}"); "scheduled sync failed");
                    }
                });
            }

            _ = sigterm.recv() => {
                warn!("SIGTERM received");
                return Ok(());
            }
        }
    }
}

/// The governance indexing engine: ingestion operations, batch sync and sync-on-read triggers on
/// top of a [LedgerIndex], a [Storage] and an [AnchorResolver].
#[derive(Clone)]
pub struct Indexer<L, S, A, C = SystemClock> {
    ledger: L,
    storage: S,
    anchors: A,
    aggregator_config: Arc<AggregatorConfig>,
    overlap_guard: OverlapGuard,
    trigger: SyncTrigger<C>,
    clock: C,
    metrics: Metrics,
}

impl<L, S, A, C> Indexer<L, S, A, C>
where
    L: LedgerIndex,
    S: Storage,
    A: AnchorResolver,
    C: Clock,
{
    pub fn new(config: &Config, ledger: L, storage: S, anchors: A, clock: C) -> Self {
        Self {
            ledger,
            storage,
            anchors,
            aggregator_config: Arc::new(config.aggregator_config.clone()),
            overlap_guard: OverlapGuard::default(),
            trigger: SyncTrigger::new(&config.trigger_config, clock.clone()),
            clock,
            metrics: Metrics::default(),
        }
    }

    /// Fetch the proposal with the given CIP-129 identifier from the ledger index and reconcile
    /// it together with its votes and voting power.
    #[trace]
    pub async fn ingest_proposal(&self, proposal_id: &str) -> Result<Proposal, IngestError> {
        let current_epoch = self.current_epoch().await?;

        let external = self
            .ledger
            .get_proposal(proposal_id)
            .await
            .context("get proposal from ledger index")?
            .ok_or_else(|| IngestError::ProposalNotFound(proposal_id.to_owned()))?;

        let mut ctx = SyncContext::new(current_epoch);
        let proposal = self
            .sync_proposal(external, &mut ctx, IngestMode::OnDemand)
            .await?;

        Ok(proposal)
    }

    /// Votes cannot be looked up by transaction hash alone.
    pub async fn ingest_vote(&self, tx_hash: &str) -> Result<(), IngestError> {
        warn!(tx_hash; "ingesting a single vote is not supported");
        Err(IngestError::VoteLookupUnsupported)
    }

    /// Create or refresh the given voter with current metadata and voting power.
    #[trace]
    pub async fn ingest_voter(&self, class: VoterClass, voter_id: &str) -> anyhow::Result<Voter> {
        let current_epoch = self.current_epoch().await?;
        self.refresh_voter(&VoterKey::new(class, voter_id), current_epoch)
            .await
    }

    /// Launch a background overview sync unless one is in flight or cooling down.
    pub fn trigger_overview_sync(&self) -> TriggerOutcome {
        let indexer = self.clone();

        let outcome = self.trigger.launch(SyncScope::Overview, async move {
            if let Err(error) = indexer.sync_overview().await {
                warn!(error:% = format!("{error:#}"); "overview sync failed");
            }
        });

        self.metrics.record_trigger(&outcome);
        outcome
    }

    /// Launch a background detail sync for the proposal with the given CIP-129 identifier or
    /// `txHash#index` reference unless one is in flight or cooling down. Proposals known locally
    /// are scoped by their CIP-129 identifier, whichever way they are referenced.
    pub async fn trigger_proposal_detail_sync(&self, identifier: &str) -> TriggerOutcome {
        let indexer = self.clone();
        let identifier = self.canonical_identifier(identifier.trim()).await;
        let scope = SyncScope::ProposalDetail(identifier.clone());

        let outcome = self.trigger.launch(scope, async move {
            if let Err(error) = indexer.sync_proposal_detail(&identifier).await {
                warn!(identifier, error:% = format!("{error:#}"); "proposal detail sync failed");
            }
        });

        self.metrics.record_trigger(&outcome);
        outcome
    }

    async fn canonical_identifier(&self, identifier: &str) -> String {
        match self.storage.find_proposal(identifier).await {
            Ok(Some(proposal)) => proposal.proposal_id,

            Ok(None) => identifier.to_owned(),

            Err(error) => {
                warn!(identifier, error:%; "cannot find proposal");
                identifier.to_owned()
            }
        }
    }

    async fn current_epoch(&self) -> anyhow::Result<u32> {
        self.ledger
            .get_current_epoch()
            .await
            .context("get current epoch from ledger index")
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("proposal {0} not found")]
    ProposalNotFound(String),

    #[error("looking up a vote by transaction hash is not supported")]
    VoteLookupUnsupported,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
