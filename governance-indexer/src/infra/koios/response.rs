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

//! Koios response rows. Lovelace amounts are returned either as strings or as numbers.

use crate::domain::{
    CommitteeVotes, ProposalEpochs, StakePower, VoterMetadata, VotingSummary,
    ledger::{ExternalProposal, ExternalVote},
};
use serde::Deserialize;
use serde_json::Value;
use serde_with::{DisplayFromStr, PickFirst, serde_as};

#[derive(Debug, Deserialize)]
pub struct TipRow {
    pub epoch_no: u32,
}

#[derive(Debug, Deserialize)]
pub struct ProposalRow {
    pub proposal_id: String,
    pub proposal_tx_hash: String,
    pub proposal_index: u32,
    pub proposal_type: String,
    pub proposed_epoch: u32,
    pub ratified_epoch: Option<u32>,
    pub enacted_epoch: Option<u32>,
    pub dropped_epoch: Option<u32>,
    pub expired_epoch: Option<u32>,
    pub expiration: Option<u32>,
    pub meta_url: Option<String>,
    pub meta_hash: Option<String>,
    pub meta_json: Option<Value>,
}

impl From<ProposalRow> for ExternalProposal {
    fn from(row: ProposalRow) -> Self {
        Self {
            proposal_id: row.proposal_id,
            tx_hash: row.proposal_tx_hash,
            cert_index: row.proposal_index,
            proposal_type: row.proposal_type,
            epochs: ProposalEpochs {
                submitted: row.proposed_epoch,
                ratified: row.ratified_epoch,
                enacted: row.enacted_epoch,
                expired: row.expired_epoch,
                dropped: row.dropped_epoch,
                expiration: row.expiration,
            },
            meta_url: row.meta_url,
            meta_hash: row.meta_hash,
            meta_json: row.meta_json,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VoteRow {
    pub vote_tx_hash: String,
    pub voter_role: String,
    pub voter_id: String,
    pub proposal_id: String,
    pub epoch_no: u32,
    pub block_time: i64,
    pub vote: String,
    pub meta_url: Option<String>,
    pub meta_hash: Option<String>,
}

impl From<VoteRow> for ExternalVote {
    fn from(row: VoteRow) -> Self {
        Self {
            tx_hash: row.vote_tx_hash,
            proposal_id: row.proposal_id,
            voter_role: row.voter_role,
            voter_id: row.voter_id,
            vote: row.vote,
            epoch: row.epoch_no,
            block_time: row.block_time,
            meta_url: row.meta_url,
            meta_hash: row.meta_hash,
        }
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VotingSummaryRow {
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub drep_active_yes_vote_power: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub drep_active_no_vote_power: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub drep_active_abstain_vote_power: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub drep_always_abstain_vote_power: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub drep_always_no_confidence_vote_power: Option<u64>,

    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub pool_active_yes_vote_power: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub pool_active_no_vote_power: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub pool_active_abstain_vote_power: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub pool_passive_always_abstain_vote_power: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub pool_passive_always_no_confidence_vote_power: Option<u64>,

    pub committee_yes_votes_cast: Option<u32>,
    pub committee_no_votes_cast: Option<u32>,
    pub committee_abstain_votes_cast: Option<u32>,
}

impl From<VotingSummaryRow> for VotingSummary {
    fn from(row: VotingSummaryRow) -> Self {
        let drep = StakePower {
            yes: row.drep_active_yes_vote_power.unwrap_or_default(),
            no: row.drep_active_no_vote_power.unwrap_or_default(),
            abstain: row.drep_active_abstain_vote_power.unwrap_or_default(),
            always_abstain: row.drep_always_abstain_vote_power.unwrap_or_default(),
            always_no_confidence: row.drep_always_no_confidence_vote_power.unwrap_or_default(),
            ..Default::default()
        };

        let spo = StakePower {
            yes: row.pool_active_yes_vote_power.unwrap_or_default(),
            no: row.pool_active_no_vote_power.unwrap_or_default(),
            abstain: row.pool_active_abstain_vote_power.unwrap_or_default(),
            always_abstain: row.pool_passive_always_abstain_vote_power.unwrap_or_default(),
            always_no_confidence: row
                .pool_passive_always_no_confidence_vote_power
                .unwrap_or_default(),
            ..Default::default()
        };

        let cc = CommitteeVotes {
            yes: row.committee_yes_votes_cast.unwrap_or_default(),
            no: row.committee_no_votes_cast.unwrap_or_default(),
            abstain: row.committee_abstain_votes_cast.unwrap_or_default(),
        };

        Self { drep, spo, cc }
    }
}

/// Row of `drep_voting_power_history`, `pool_voting_power_history` and `drep_epoch_summary`.
#[serde_as]
#[derive(Debug, Deserialize)]
pub struct PowerRow {
    #[serde(default)]
    pub drep_id: Option<String>,

    #[serde(default)]
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub amount: Option<u64>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct EpochInfoRow {
    #[serde(default)]
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub active_stake: Option<u64>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct DrepInfoRow {
    pub drep_id: String,

    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub amount: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DrepListRow {
    pub drep_id: String,

    #[serde(default)]
    pub registered: bool,
}

#[derive(Debug, Deserialize)]
pub struct DrepUpdateRow {
    pub drep_id: String,
    pub block_time: i64,
}

#[derive(Debug, Deserialize)]
pub struct DrepMetadataRow {
    pub drep_id: String,
    pub meta_json: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct PoolInfoRow {
    pub pool_id_bech32: String,
    pub reward_addr: Option<String>,
    pub meta_json: Option<PoolMetaJson>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PoolMetaJson {
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub homepage: Option<String>,
}

impl From<PoolInfoRow> for VoterMetadata {
    fn from(row: PoolInfoRow) -> Self {
        let meta_json = row.meta_json.unwrap_or_default();

        Self {
            name: meta_json.name,
            ticker: meta_json.ticker,
            payment_address: row.reward_addr,
            icon_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::{VotingSummary, ledger::ExternalProposal},
        infra::koios::response::{PowerRow, ProposalRow, VotingSummaryRow},
    };
    use serde_json::json;

    #[test]
    fn test_voting_summary_row() {
        let row = serde_json::from_value::<VotingSummaryRow>(json!({
            "proposal_type": "TreasuryWithdrawals",
            "drep_active_yes_vote_power": "400",
            "drep_active_no_vote_power": 200,
            "drep_active_abstain_vote_power": null,
            "drep_always_no_confidence_vote_power": "50",
            "pool_active_yes_vote_power": "7",
            "committee_yes_votes_cast": 5,
            "committee_no_votes_cast": 1,
            "committee_abstain_votes_cast": 1
        }))
        .expect("summary row can be deserialized");

        let summary = VotingSummary::from(row);
        assert_eq!(summary.drep.yes, 400);
        assert_eq!(summary.drep.no, 200);
        assert_eq!(summary.drep.abstain, 0);
        assert_eq!(summary.drep.always_no_confidence, 50);
        assert_eq!(summary.spo.yes, 7);
        assert_eq!(summary.cc.yes, 5);
    }

    #[test]
    fn test_proposal_row() {
        let row = serde_json::from_value::<ProposalRow>(json!({
            "block_time": 1_736_000_000,
            "proposal_id": "gov_action1a",
            "proposal_tx_hash": "abcd",
            "proposal_index": 0,
            "proposal_type": "InfoAction",
            "proposed_epoch": 530,
            "ratified_epoch": null,
            "enacted_epoch": null,
            "dropped_epoch": null,
            "expired_epoch": 537,
            "expiration": 536,
            "meta_url": "ipfs://Qm",
            "meta_hash": "ff",
            "meta_json": null
        }))
        .expect("proposal row can be deserialized");

        let proposal = ExternalProposal::from(row);
        assert_eq!(proposal.cert_index, 0);
        assert_eq!(proposal.epochs.submitted, 530);
        assert_eq!(proposal.epochs.expired, Some(537));
        assert_eq!(proposal.meta_url.as_deref(), Some("ipfs://Qm"));
    }

    #[test]
    fn test_power_row() {
        let row = serde_json::from_value::<PowerRow>(json!({
            "drep_id": "drep1a",
            "epoch_no": 540,
            "amount": "123456789012"
        }))
        .expect("power row can be deserialized");
        assert_eq!(row.amount, Some(123_456_789_012));
    }
}
