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

use crate::domain::{ProposalEpochs, VoterClass, VoterMetadata, VotingSummary};
use serde_json::Value;
use std::error::Error as StdError;

/// Read access to the external ledger-indexing service. Implementations page through results
/// internally and retry transient failures.
#[trait_variant::make(Send)]
pub trait LedgerIndex
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Get the current epoch of the chain tip.
    async fn get_current_epoch(&self) -> Result<u32, Self::Error>;

    /// List all governance proposals.
    async fn list_proposals(&self) -> Result<Vec<ExternalProposal>, Self::Error>;

    /// Get the proposal with the given CIP-129 identifier.
    async fn get_proposal(&self, proposal_id: &str)
    -> Result<Option<ExternalProposal>, Self::Error>;

    /// List votes matching the given filter, in ascending block time order.
    async fn list_votes(&self, filter: &VoteFilter) -> Result<Vec<ExternalVote>, Self::Error>;

    /// Get the voting summary the ledger index computes for the given proposal.
    async fn get_proposal_voting_summary(
        &self,
        proposal_id: &str,
    ) -> Result<Option<VotingSummary>, Self::Error>;

    /// Get the voting power of a DRep or SPO at the given epoch.
    async fn get_voter_power(
        &self,
        class: VoterClass,
        voter_id: &str,
        epoch: u32,
    ) -> Result<Option<u64>, Self::Error>;

    /// Get activity and delegated amount of the given DReps.
    async fn get_voter_info(&self, drep_ids: &[String]) -> Result<Vec<VoterInfo>, Self::Error>;

    /// Get the total stake based voting power of the given class at the given epoch; zero for
    /// the committee.
    async fn get_total_voting_power(&self, class: VoterClass, epoch: u32)
    -> Result<u64, Self::Error>;

    /// List the identifiers of all registered DReps.
    async fn list_drep_ids(&self) -> Result<Vec<String>, Self::Error>;

    /// List DRep certificate updates within the given inclusive epoch range.
    async fn list_drep_certificate_updates(
        &self,
        from_epoch: u32,
        to_epoch: u32,
    ) -> Result<Vec<CertificateUpdate>, Self::Error>;

    /// List the voting power of all DReps at the given epoch.
    async fn list_drep_powers(&self, epoch: u32) -> Result<Vec<(String, u64)>, Self::Error>;

    /// Get display metadata of a DRep or SPO.
    async fn get_voter_metadata(
        &self,
        class: VoterClass,
        voter_id: &str,
    ) -> Result<Option<VoterMetadata>, Self::Error>;
}

/// A proposal as returned by the ledger index.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalProposal {
    pub proposal_id: String,
    pub tx_hash: String,
    pub cert_index: u32,

    /// Governance action type name, e.g. `TreasuryWithdrawals`.
    pub proposal_type: String,

    pub epochs: ProposalEpochs,
    pub meta_url: Option<String>,
    pub meta_hash: Option<String>,

    /// Anchored metadata document as already resolved by the ledger index.
    pub meta_json: Option<Value>,
}

/// A vote as returned by the ledger index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalVote {
    pub tx_hash: String,
    pub proposal_id: String,

    /// Voter role, e.g. `DRep`.
    pub voter_role: String,

    pub voter_id: String,

    /// Vote value, e.g. `Yes`.
    pub vote: String,

    pub epoch: u32,
    pub block_time: i64,
    pub meta_url: Option<String>,
    pub meta_hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteFilter {
    pub proposal_id: Option<String>,
    pub min_epoch: Option<u32>,
}

impl VoteFilter {
    pub fn for_proposal(proposal_id: &str) -> Self {
        Self {
            proposal_id: Some(proposal_id.to_owned()),
            min_epoch: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterInfo {
    pub voter_id: String,
    pub active: bool,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateUpdate {
    pub drep_id: String,
    pub epoch: u32,
}
