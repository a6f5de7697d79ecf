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
    application::{Indexer, IngestMode, IngestOptions, context::SyncContext},
    domain::{
        Proposal, ProposalRef,
        anchor::AnchorResolver,
        clock::Clock,
        ledger::{ExternalProposal, LedgerIndex, VoteFilter},
        storage::Storage,
    },
};
use anyhow::Context;
use fastrace::trace;
use log::{debug, info, warn};

impl<L, S, A, C> Indexer<L, S, A, C>
where
    L: LedgerIndex,
    S: Storage,
    A: AnchorResolver,
    C: Clock,
{
    /// Reconcile the given proposal, ingest its votes and store its recomputed voting power.
    #[trace]
    pub(crate) async fn sync_proposal(
        &self,
        external: ExternalProposal,
        ctx: &mut SyncContext,
        mode: IngestMode,
    ) -> anyhow::Result<Proposal> {
        let (proposal, upserted) = self.reconcile(external, ctx.current_epoch).await?;
        let proposal_id = proposal.proposal_id.as_str();

        let options = IngestOptions {
            min_epoch: Some(proposal.epochs.submitted),
            mode,
        };
        let stats = self.ingest_votes(proposal_id, options, ctx).await?;

        let result = self.compute_power(&proposal, ctx).await;
        self.storage
            .save_voting_power(proposal_id, &result.fields)
            .await
            .context("save voting power")?;

        info!(
            proposal_id,
            status:% = proposal.status,
            upserted:?,
            votes_created = stats.votes_created,
            passes = result.passes;
            "proposal synced"
        );

        Ok(Proposal {
            voting_power: result.fields,
            ..proposal
        })
    }

    /// Ingest the proposals of the ledger index not yet stored locally, if the counts differ.
    /// Returns the number of ingested proposals.
    #[trace]
    pub(crate) async fn sync_overview(&self) -> anyhow::Result<usize> {
        let current_epoch = self.current_epoch().await?;

        let external = self
            .ledger
            .list_proposals()
            .await
            .context("list proposals from ledger index")?;
        let local_count = self
            .storage
            .get_proposal_count()
            .await
            .context("get proposal count")?;

        if external.len() as u64 == local_count {
            debug!(count = local_count; "proposals up to date");
            return Ok(0);
        }

        let statuses = self
            .storage
            .get_proposal_statuses()
            .await
            .context("get proposal statuses")?;
        let mut missing = external
            .into_iter()
            .filter(|proposal| !statuses.contains_key(&proposal.proposal_id))
            .collect::<Vec<_>>();
        missing.sort_by(|a, b| {
            (a.epochs.submitted, &a.proposal_id).cmp(&(b.epochs.submitted, &b.proposal_id))
        });

        let mut ctx = SyncContext::new(current_epoch);
        let mut ingested = 0;
        for external in missing {
            let proposal_id = external.proposal_id.clone();

            match self
                .sync_proposal(external, &mut ctx, IngestMode::OnDemand)
                .await
            {
                Ok(_) => ingested += 1,

                Err(error) => {
                    self.metrics.proposal_sync_failures.increment(1);
                    let error = format!("{error:#}");
                    warn!(proposal_id, error; "cannot ingest proposal");
                }
            }
        }

        info!(ingested; "overview synced");
        Ok(ingested)
    }

    /// Bring the votes and voting power of an active proposal in line with the ledger index if
    /// the vote count or the voting summary differ. Proposals unknown locally are ingested.
    #[trace]
    pub(crate) async fn sync_proposal_detail(&self, identifier: &str) -> anyhow::Result<()> {
        let current_epoch = self.current_epoch().await?;
        let mut ctx = SyncContext::new(current_epoch);

        let proposal = self
            .storage
            .find_proposal(identifier)
            .await
            .context("find proposal")?;

        let Some(proposal) = proposal else {
            match self.find_external_proposal(identifier).await? {
                Some(external) => {
                    self.sync_proposal(external, &mut ctx, IngestMode::OnDemand)
                        .await?;
                }

                None => warn!(identifier; "unknown proposal"),
            }

            return Ok(());
        };

        if proposal.status.is_terminal() {
            debug!(identifier, status:% = proposal.status; "proposal completed");
            return Ok(());
        }

        let proposal_id = proposal.proposal_id.as_str();

        let votes = self
            .ledger
            .list_votes(&VoteFilter::for_proposal(proposal_id))
            .await
            .context("list votes from ledger index")?;
        let stored_vote_count = self
            .storage
            .get_vote_count(proposal_id)
            .await
            .context("get vote count")?;

        let summary_matches = match self.ledger.get_proposal_voting_summary(proposal_id).await {
            Ok(summary) => summary.is_none_or(|summary| summary.matches(&proposal.voting_power)),

            Err(error) => {
                warn!(proposal_id, error:%; "cannot get voting summary");
                true
            }
        };

        if votes.len() as u64 == stored_vote_count && summary_matches {
            debug!(proposal_id; "proposal up to date");
            return Ok(());
        }

        let stats = self
            .ingest_external_votes(proposal_id, votes, &mut ctx)
            .await?;
        let result = self.compute_power(&proposal, &mut ctx).await;
        self.storage
            .save_voting_power(proposal_id, &result.fields)
            .await
            .context("save voting power")?;

        info!(
            proposal_id,
            votes_created = stats.votes_created,
            passes = result.passes;
            "proposal detail synced"
        );

        Ok(())
    }

    /// Look up a proposal in the ledger index by CIP-129 identifier or `txHash#index` reference.
    async fn find_external_proposal(
        &self,
        identifier: &str,
    ) -> anyhow::Result<Option<ExternalProposal>> {
        let (tx_hash, cert_index) = match ProposalRef::parse(identifier) {
            Some(ProposalRef::Id(proposal_id)) => {
                return self
                    .ledger
                    .get_proposal(proposal_id)
                    .await
                    .context("get proposal from ledger index");
            }

            Some(ProposalRef::Tx {
                tx_hash,
                cert_index,
            }) => (tx_hash, cert_index),

            None => return Ok(None),
        };

        let proposals = self
            .ledger
            .list_proposals()
            .await
            .context("list proposals from ledger index")?;

        Ok(proposals
            .into_iter()
            .find(|proposal| proposal.tx_hash == tx_hash && proposal.cert_index == cert_index))
    }
}
