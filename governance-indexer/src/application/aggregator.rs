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
        FormulaTransition, GovActionType, Proposal, ProposalStatus, SpoFormula, StakePower,
        VoterClass, VotingPowerFields, VotingPowerResult, VotingSummary,
        anchor::AnchorResolver,
        clock::Clock,
        is_predefined_drep,
        ledger::{LedgerIndex, VoterInfo},
        spo_formula_at,
        storage::Storage,
    },
};
use anyhow::Context;
use fastrace::trace;
use log::{debug, warn};
use serde::Deserialize;
use std::fmt::Display;

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorConfig {
    /// Number of committee seats.
    pub cc_seats: u32,

    /// First epoch from which DRep inactivity is accounted for.
    pub drep_inactivity_start_epoch: u32,

    /// Number of epochs without activity after which a DRep is inactive.
    pub drep_activity_window: u32,

    /// Ordered by effective epoch.
    #[serde(default)]
    pub spo_formula_transitions: Vec<FormulaTransition>,
}

impl<L, S, A, C> Indexer<L, S, A, C>
where
    L: LedgerIndex,
    S: Storage,
    A: AnchorResolver,
    C: Clock,
{
    /// Compute the voting power of the given proposal at its reference epoch. A component which
    /// cannot be fetched is accounted for as zero.
    #[trace]
    pub(crate) async fn compute_power(
        &self,
        proposal: &Proposal,
        ctx: &mut SyncContext,
    ) -> VotingPowerResult {
        let proposal_id = proposal.proposal_id.as_str();
        let reference_epoch = proposal.reference_epoch(ctx.current_epoch);
        let spo_epoch = reference_epoch.saturating_sub(1);

        let summary = match self.ledger.get_proposal_voting_summary(proposal_id).await {
            Ok(Some(summary)) => summary,

            Ok(None) => {
                debug!(proposal_id; "no voting summary");
                VotingSummary::default()
            }

            Err(error) => {
                warn!(proposal_id, error:%; "cannot get voting summary");
                VotingSummary::default()
            }
        };

        let drep_total = or_zero(
            self.ledger
                .get_total_voting_power(VoterClass::DRep, reference_epoch)
                .await,
            proposal_id,
            "DRep total voting power",
        );
        let spo_total = or_zero(
            self.ledger
                .get_total_voting_power(VoterClass::Spo, spo_epoch)
                .await,
            proposal_id,
            "SPO total voting power",
        );
        let drep_inactive = or_zero(
            self.inactive_drep_power(proposal, reference_epoch, ctx)
                .await,
            proposal_id,
            "inactive DRep voting power",
        );

        let fields = VotingPowerFields {
            drep: StakePower {
                total: drep_total,
                inactive: drep_inactive,
                ..summary.drep
            },
            spo: StakePower {
                total: spo_total,
                inactive: 0,
                ..summary.spo
            },
            cc: summary.cc,
        };

        let spo_formula = match proposal.action_type {
            GovActionType::HardForkInitiation => SpoFormula::IncludeNotVoted,
            _ => spo_formula_at(
                &self.aggregator_config.spo_formula_transitions,
                reference_epoch,
            ),
        };

        VotingPowerResult::evaluate(
            proposal.action_type,
            fields,
            reference_epoch,
            self.aggregator_config.cc_seats,
            spo_formula,
        )
    }

    /// Stake delegated to inactive DReps at the given reference epoch. For active proposals the
    /// current activity flags are used, fetched once per sync run; for completed proposals DReps
    /// without votes or certificate updates within the activity window ending at the reference
    /// epoch are inactive.
    async fn inactive_drep_power(
        &self,
        proposal: &Proposal,
        reference_epoch: u32,
        ctx: &mut SyncContext,
    ) -> anyhow::Result<u64> {
        let config = &self.aggregator_config;
        if reference_epoch < config.drep_inactivity_start_epoch {
            return Ok(0);
        }

        if proposal.status == ProposalStatus::Active {
            if ctx.drep_info().is_none() {
                let drep_info = self.current_drep_info().await?;
                ctx.cache_drep_info(drep_info);
            }

            let inactive = ctx
                .drep_info()
                .into_iter()
                .flatten()
                .filter(|info| !info.active)
                .map(|info| info.amount)
                .sum();

            return Ok(inactive);
        }

        let window = config.drep_activity_window.saturating_sub(1);
        let from_epoch = reference_epoch.saturating_sub(window);

        let mut active = self
            .storage
            .get_voter_ids_voted_between(VoterClass::DRep, from_epoch, reference_epoch)
            .await
            .context("get DReps which voted")?;
        let updated = self
            .ledger
            .list_drep_certificate_updates(from_epoch, reference_epoch)
            .await
            .context("list DRep certificate updates")?;
        active.extend(updated.into_iter().map(|update| update.drep_id));

        let inactive = self
            .ledger
            .list_drep_powers(reference_epoch)
            .await
            .context("list DRep voting powers")?
            .into_iter()
            .filter(|(drep_id, _)| !is_predefined_drep(drep_id) && !active.contains(drep_id))
            .map(|(_, amount)| amount)
            .sum();

        Ok(inactive)
    }

    async fn current_drep_info(&self) -> anyhow::Result<Vec<VoterInfo>> {
        let drep_ids = self
            .ledger
            .list_drep_ids()
            .await
            .context("list DRep ids")?
            .into_iter()
            .filter(|drep_id| !is_predefined_drep(drep_id))
            .collect::<Vec<_>>();

        self.ledger
            .get_voter_info(&drep_ids)
            .await
            .context("get DRep info")
    }
}

fn or_zero<E>(result: Result<u64, E>, proposal_id: &str, component: &str) -> u64
where
    E: Display,
{
    result.unwrap_or_else(|error| {
        let error = format!("{error:#}");
        warn!(proposal_id, component, error; "cannot compute voting power component");
        0
    })
}

#[cfg(test)]
mod tests {
    use crate::{
        application::{
            context::SyncContext,
            testing::{MockLedger, external_proposal, external_vote, indexer},
        },
        domain::{
            CommitteeVerdict, CommitteeVotes, ProposalEpochs, ProposalStatus, StakePower,
            VoterClass, VotingSummary, ledger::VoterInfo,
        },
    };

    fn summary() -> VotingSummary {
        VotingSummary {
            drep: StakePower {
                yes: 400,
                no: 200,
                abstain: 100,
                always_no_confidence: 50,
                ..Default::default()
            },
            spo: StakePower {
                yes: 300,
                no: 100,
                ..Default::default()
            },
            cc: CommitteeVotes {
                yes: 5,
                no: 1,
                abstain: 1,
            },
        }
    }

    #[tokio::test]
    async fn test_compute_power_active() -> anyhow::Result<()> {
        let ledger = MockLedger::new(540);
        ledger.add_proposal(external_proposal("gov_action1a", 535));
        ledger.set_summary("gov_action1a", summary());
        ledger.set_total_power(VoterClass::DRep, 540, 1_000);
        ledger.set_total_power(VoterClass::Spo, 539, 1_000);
        ledger.set_drep_ids(["drep1a", "drep1b", "drep_always_abstain"]);
        ledger.set_voter_info(vec![
            VoterInfo {
                voter_id: "drep1a".to_owned(),
                active: true,
                amount: 600,
            },
            VoterInfo {
                voter_id: "drep1b".to_owned(),
                active: false,
                amount: 50,
            },
        ]);
        let indexer = indexer(ledger.clone());

        let proposal = indexer.ingest_proposal("gov_action1a").await?;
        let result = indexer
            .compute_power(&proposal, &mut SyncContext::new(540))
            .await;

        assert_eq!(result.reference_epoch, 540);
        assert_eq!(result.fields.drep.inactive, 50);
        assert_eq!(result.fields.drep.not_voted(), 200);
        assert_eq!(result.drep.denominator, 850);
        assert!((result.drep.yes_pct() - 47.06).abs() < 0.01);
        assert_eq!(result.cc_verdict, CommitteeVerdict::Constitutional);
        assert_eq!(
            ledger.voter_info_requests().last(),
            Some(&vec!["drep1a".to_owned(), "drep1b".to_owned()])
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_drep_info_fetched_once_per_run() -> anyhow::Result<()> {
        let ledger = MockLedger::new(540);
        ledger.add_proposal(external_proposal("gov_action1a", 535));
        ledger.add_proposal(external_proposal("gov_action1b", 536));
        ledger.set_drep_ids(["drep1a", "drep1b"]);
        ledger.set_voter_info(vec![VoterInfo {
            voter_id: "drep1b".to_owned(),
            active: false,
            amount: 50,
        }]);
        let indexer = indexer(ledger.clone());
        let first = indexer.ingest_proposal("gov_action1a").await?;
        let second = indexer.ingest_proposal("gov_action1b").await?;
        let requests = ledger.voter_info_requests().len();

        let mut ctx = SyncContext::new(540);
        let first = indexer.compute_power(&first, &mut ctx).await;
        let second = indexer.compute_power(&second, &mut ctx).await;

        assert_eq!(first.fields.drep.inactive, 50);
        assert_eq!(second.fields.drep.inactive, 50);
        assert_eq!(ledger.voter_info_requests().len(), requests + 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_compute_power_completed_window() -> anyhow::Result<()> {
        let ledger = MockLedger::new(540);
        let mut external = external_proposal("gov_action1a", 520);
        external.epochs = ProposalEpochs {
            submitted: 520,
            ratified: Some(530),
            ..Default::default()
        };
        ledger.add_proposal(external);
        ledger.set_total_power(VoterClass::DRep, 530, 1_000);
        ledger.set_drep_powers(
            530,
            vec![
                ("drep1voted".to_owned(), 100),
                ("drep1updated".to_owned(), 200),
                ("drep1idle".to_owned(), 300),
                ("drep_always_no_confidence".to_owned(), 400),
            ],
        );
        ledger.add_certificate_update("drep1updated", 515);
        ledger.add_certificate_update("drep1idle", 505);
        let mut vote = external_vote("tx1", "gov_action1a", "DRep", "drep1voted", "Yes");
        vote.epoch = 525;
        ledger.add_vote(vote);
        let indexer = indexer(ledger);

        let proposal = indexer.ingest_proposal("gov_action1a").await?;
        assert_eq!(proposal.status, ProposalStatus::Ratified);

        let result = indexer
            .compute_power(&proposal, &mut SyncContext::new(540))
            .await;
        assert_eq!(result.reference_epoch, 530);
        assert_eq!(result.fields.drep.inactive, 300);

        Ok(())
    }

    #[tokio::test]
    async fn test_compute_power_before_inactivity_tracking() -> anyhow::Result<()> {
        let ledger = MockLedger::new(500);
        ledger.add_proposal(external_proposal("gov_action1a", 495));
        ledger.set_drep_ids(["drep1a"]);
        ledger.set_voter_info(vec![VoterInfo {
            voter_id: "drep1a".to_owned(),
            active: false,
            amount: 50,
        }]);
        let indexer = indexer(ledger);

        let proposal = indexer.ingest_proposal("gov_action1a").await?;
        let result = indexer
            .compute_power(&proposal, &mut SyncContext::new(500))
            .await;
        assert_eq!(result.fields.drep.inactive, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_compute_power_degrades() -> anyhow::Result<()> {
        let ledger = MockLedger::new(540);
        ledger.add_proposal(external_proposal("gov_action1a", 535));
        ledger.set_summary("gov_action1a", summary());
        ledger.set_total_power(VoterClass::Spo, 539, 1_000);
        let indexer = indexer(ledger.clone());
        let proposal = indexer.ingest_proposal("gov_action1a").await?;

        ledger.fail_power_lookups();
        let result = indexer
            .compute_power(&proposal, &mut SyncContext::new(540))
            .await;

        assert_eq!(result.fields.drep, StakePower::default());
        assert_eq!(result.fields.spo.total, 0);
        assert_eq!(result.fields.cc, CommitteeVotes::default());
        assert_eq!(result.cc_verdict, CommitteeVerdict::Pending);

        Ok(())
    }

    #[tokio::test]
    async fn test_hard_fork_includes_not_voted() -> anyhow::Result<()> {
        let ledger = MockLedger::new(520);
        let mut external = external_proposal("gov_action1a", 515);
        external.proposal_type = "HardForkInitiation".to_owned();
        ledger.add_proposal(external);
        ledger.set_summary("gov_action1a", summary());
        ledger.set_total_power(VoterClass::Spo, 519, 1_000);
        let indexer = indexer(ledger);

        let proposal = indexer.ingest_proposal("gov_action1a").await?;
        let result = indexer
            .compute_power(&proposal, &mut SyncContext::new(520))
            .await;

        // 600 not voted lovelace count as no.
        assert_eq!(result.spo.denominator, 1_000);
        assert_eq!(result.spo.no, 700);

        Ok(())
    }
}
