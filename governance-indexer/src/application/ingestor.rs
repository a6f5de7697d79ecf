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
    application::{Indexer, context::SyncContext},
    domain::{
        Anchor, OnchainVote, ParseError, VoteChoice, VoterClass, VoterKey,
        anchor::AnchorResolver,
        clock::Clock,
        ledger::{ExternalVote, LedgerIndex, VoteFilter},
        storage::{Storage, Upserted},
    },
};
use anyhow::Context;
use fastrace::trace;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Where votes are taken from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IngestMode {
    /// From the vote catalog prefetched for the current run, falling back to on-demand.
    Batch,

    /// From a server-side filtered fetch for a single proposal.
    #[default]
    OnDemand,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    pub min_epoch: Option<u32>,
    pub mode: IngestMode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub votes_created: u64,
    pub votes_updated: u64,
    pub voters_created: BTreeMap<VoterClass, u64>,
    pub voters_updated: BTreeMap<VoterClass, u64>,
}

impl<L, S, A, C> Indexer<L, S, A, C>
where
    L: LedgerIndex,
    S: Storage,
    A: AnchorResolver,
    C: Clock,
{
    #[trace]
    pub(crate) async fn ingest_votes(
        &self,
        proposal_id: &str,
        options: IngestOptions,
        ctx: &mut SyncContext,
    ) -> anyhow::Result<IngestStats> {
        let cached = match options.mode {
            IngestMode::Batch => ctx.take_votes(proposal_id),
            IngestMode::OnDemand => None,
        };

        let votes = match cached {
            Some(votes) => votes,

            None => {
                let filter = VoteFilter {
                    proposal_id: Some(proposal_id.to_owned()),
                    min_epoch: options.min_epoch,
                };

                self.ledger
                    .list_votes(&filter)
                    .await
                    .context("list votes from ledger index")?
            }
        };

        self.ingest_external_votes(proposal_id, votes, ctx).await
    }

    /// Upsert the given votes of the given proposal, making sure their voters exist. Votes with
    /// an unknown voter role or vote value are skipped.
    pub(crate) async fn ingest_external_votes(
        &self,
        proposal_id: &str,
        votes: Vec<ExternalVote>,
        ctx: &mut SyncContext,
    ) -> anyhow::Result<IngestStats> {
        let mut stats = IngestStats::default();

        for vote in votes {
            let (voter_class, choice) = match parse_vote(&vote) {
                Ok(parsed) => parsed,
                Err(error) => {
                    warn!(proposal_id, tx_hash:% = vote.tx_hash, error:%; "skipping vote");
                    continue;
                }
            };

            let key = VoterKey::new(voter_class, vote.voter_id.as_str());
            let ensured = self
                .ensure_voter(&key, ctx)
                .await
                .with_context(|| format!("ensure voter {key}"))?;
            if ensured.created {
                *stats.voters_created.entry(voter_class).or_default() += 1;
            }
            if ensured.updated {
                *stats.voters_updated.entry(voter_class).or_default() += 1;
            }

            let vote = OnchainVote {
                tx_hash: vote.tx_hash,
                proposal_id: vote.proposal_id,
                voter_class,
                voter_id: vote.voter_id,
                choice,
                voting_power: ensured.voting_power,
                anchor: vote.meta_url.map(|url| Anchor {
                    url,
                    hash: vote.meta_hash,
                }),
                epoch: vote.epoch,
                block_time: vote.block_time,
            };

            let upserted = self
                .storage
                .save_vote(&vote)
                .await
                .with_context(|| format!("save vote {}", vote.tx_hash))?;
            match upserted {
                Upserted::Created => stats.votes_created += 1,
                Upserted::Updated => stats.votes_updated += 1,
            }
        }

        self.metrics.votes_created.increment(stats.votes_created);
        debug!(
            proposal_id,
            votes_created = stats.votes_created,
            votes_updated = stats.votes_updated;
            "votes ingested"
        );

        Ok(stats)
    }
}

fn parse_vote(vote: &ExternalVote) -> Result<(VoterClass, VoteChoice), ParseError> {
    Ok((vote.voter_role.parse()?, vote.vote.parse()?))
}
