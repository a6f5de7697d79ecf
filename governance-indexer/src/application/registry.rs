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
        Voter, VoterClass, VoterKey, anchor::AnchorResolver, clock::Clock, ledger::LedgerIndex,
        storage::Storage,
    },
};
use anyhow::Context;
use fastrace::trace;
use log::{debug, warn};

/// Outcome of making sure a voter exists locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsuredVoter {
    /// Voting power of the voter known locally.
    pub voting_power: u64,
    pub created: bool,
    pub updated: bool,
}

impl<L, S, A, C> Indexer<L, S, A, C>
where
    L: LedgerIndex,
    S: Storage,
    A: AnchorResolver,
    C: Clock,
{
    /// Make sure the given voter exists. An existing voter is returned as is; an absent one is
    /// created and enriched on a best-effort basis.
    pub(crate) async fn ensure_voter(
        &self,
        key: &VoterKey,
        ctx: &mut SyncContext,
    ) -> anyhow::Result<EnsuredVoter> {
        if let Some(voting_power) = ctx.voter_power(key) {
            return Ok(EnsuredVoter {
                voting_power,
                created: false,
                updated: false,
            });
        }

        let existing = self.storage.get_voter(key).await.context("get voter")?;

        let ensured = match existing {
            Some(voter) => EnsuredVoter {
                voting_power: voter.voting_power,
                created: false,
                updated: false,
            },

            None => {
                let voter = Voter::new(key.clone());
                let created = self
                    .storage
                    .create_voter(&voter)
                    .await
                    .context("create voter")?;

                if created {
                    let voter = self.enrich_voter(voter, ctx.current_epoch).await;
                    self.storage.save_voter(&voter).await.context("save voter")?;
                    self.metrics.voters_created.increment(1);
                    debug!(voter:% = key, voting_power = voter.voting_power; "voter created");

                    EnsuredVoter {
                        voting_power: voter.voting_power,
                        created: true,
                        updated: false,
                    }
                } else {
                    // Created concurrently.
                    let voting_power = self
                        .storage
                        .get_voter(key)
                        .await
                        .context("get voter")?
                        .map(|voter| voter.voting_power)
                        .unwrap_or_default();

                    EnsuredVoter {
                        voting_power,
                        created: false,
                        updated: false,
                    }
                }
            }
        };

        ctx.remember_voter(key.clone(), ensured.voting_power);
        Ok(ensured)
    }

    /// Re-fetch metadata and voting power of the given voter, creating it if absent.
    #[trace]
    pub(crate) async fn refresh_voter(
        &self,
        key: &VoterKey,
        current_epoch: u32,
    ) -> anyhow::Result<Voter> {
        let voter = match self.storage.get_voter(key).await.context("get voter")? {
            Some(voter) => voter,

            None => {
                let voter = Voter::new(key.clone());
                if self
                    .storage
                    .create_voter(&voter)
                    .await
                    .context("create voter")?
                {
                    self.metrics.voters_created.increment(1);
                }
                voter
            }
        };

        let voter = self.enrich_voter(voter, current_epoch).await;
        self.storage.save_voter(&voter).await.context("save voter")?;
        self.metrics.voters_refreshed.increment(1);

        Ok(voter)
    }

    /// Fetch display metadata and voting power at the given epoch. Failures are logged and keep
    /// the known values. Committee members have neither.
    async fn enrich_voter(&self, mut voter: Voter, epoch: u32) -> Voter {
        let VoterKey { class, id } = &voter.key;

        if *class != VoterClass::Cc {
            match self.ledger.get_voter_metadata(*class, id).await {
                Ok(Some(metadata)) => voter.metadata = metadata,
                Ok(None) => {}
                Err(error) => warn!(voter:% = voter.key, error:%; "cannot get voter metadata"),
            }

            match self.ledger.get_voter_power(*class, id, epoch).await {
                Ok(Some(voting_power)) => voter.voting_power = voting_power,
                Ok(None) => {}
                Err(error) => warn!(voter:% = voter.key, error:%; "cannot get voter power"),
            }
        }

        voter.refreshed_at = Some(self.clock.unix_time());
        voter
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        application::{
            context::SyncContext,
            testing::{MANUAL_CLOCK_START, MockLedger, indexer},
        },
        domain::{VoterClass, VoterKey, storage::Storage},
    };
    use std::time::Duration;

    #[tokio::test]
    async fn test_ensure_voter() -> anyhow::Result<()> {
        let ledger = MockLedger::new(100);
        ledger.set_voter_power(VoterClass::Spo, "pool1a", 100, 1_000);
        let indexer = indexer(ledger.clone());
        let key = VoterKey::new(VoterClass::Spo, "pool1a");

        let mut ctx = SyncContext::new(100);
        let ensured = indexer.ensure_voter(&key, &mut ctx).await?;
        assert!(ensured.created);
        assert_eq!(ensured.voting_power, 1_000);

        // Existing voters are not refreshed.
        ledger.set_voter_power(VoterClass::Spo, "pool1a", 100, 2_000);
        let mut ctx = SyncContext::new(100);
        let ensured = indexer.ensure_voter(&key, &mut ctx).await?;
        assert!(!ensured.created);
        assert_eq!(ensured.voting_power, 1_000);

        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_voter_degrades() -> anyhow::Result<()> {
        let ledger = MockLedger::new(100);
        ledger.fail_voter_lookups();
        let indexer = indexer(ledger);
        let key = VoterKey::new(VoterClass::DRep, "drep1a");

        let mut ctx = SyncContext::new(100);
        let ensured = indexer.ensure_voter(&key, &mut ctx).await?;
        assert!(ensured.created);
        assert_eq!(ensured.voting_power, 0);

        let voter = indexer.storage.get_voter(&key).await?;
        assert!(voter.is_some_and(|voter| voter.metadata.name.is_none()));

        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_committee_member() -> anyhow::Result<()> {
        let indexer = indexer(MockLedger::new(100));
        let key = VoterKey::new(VoterClass::Cc, "cc_hot1a");

        let mut ctx = SyncContext::new(100);
        let ensured = indexer.ensure_voter(&key, &mut ctx).await?;
        assert!(ensured.created);
        assert_eq!(ensured.voting_power, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_refresh_voter_timestamp() -> anyhow::Result<()> {
        let ledger = MockLedger::new(100);
        ledger.set_voter_power(VoterClass::Spo, "pool1a", 100, 1_000);
        let indexer = indexer(ledger);
        let key = VoterKey::new(VoterClass::Spo, "pool1a");

        let voter = indexer.refresh_voter(&key, 100).await?;
        assert_eq!(voter.refreshed_at, Some(MANUAL_CLOCK_START));

        indexer.clock.advance(Duration::from_secs(3_600));
        indexer.refresh_voter(&key, 100).await?;
        let voter = indexer.storage.get_voter(&key).await?;
        assert_eq!(
            voter.and_then(|voter| voter.refreshed_at),
            Some(MANUAL_CLOCK_START + 3_600)
        );

        Ok(())
    }
}
