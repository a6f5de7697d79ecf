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

use crate::domain::{
    OnchainVote, Proposal, ProposalStatus, Voter, VoterClass, VoterKey, VotingPowerFields,
};
use std::collections::{HashMap, HashSet};

/// Result of an upsert by natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

impl Upserted {
    pub fn from_created(created: bool) -> Self {
        if created {
            Upserted::Created
        } else {
            Upserted::Updated
        }
    }
}

/// Storage abstraction.
#[trait_variant::make(Send)]
pub trait Storage
where
    Self: Clone + Send + Sync + 'static,
{
    /// Get the proposal with the given CIP-129 identifier.
    async fn get_proposal(&self, proposal_id: &str) -> Result<Option<Proposal>, sqlx::Error>;

    /// Find a proposal by its CIP-129 identifier or by its `txHash#index` reference.
    async fn find_proposal(&self, identifier: &str) -> Result<Option<Proposal>, sqlx::Error>;

    /// Get the status of all stored proposals by identifier.
    async fn get_proposal_statuses(&self)
    -> Result<HashMap<String, ProposalStatus>, sqlx::Error>;

    async fn get_proposal_count(&self) -> Result<u64, sqlx::Error>;

    /// Upsert the given proposal by identifier; the voting-power fields of an existing proposal
    /// are left untouched.
    async fn save_proposal(&self, proposal: &Proposal) -> Result<Upserted, sqlx::Error>;

    async fn save_voting_power(
        &self,
        proposal_id: &str,
        voting_power: &VotingPowerFields,
    ) -> Result<(), sqlx::Error>;

    /// Upsert the given vote by transaction hash, proposal, voter class and voter id.
    async fn save_vote(&self, vote: &OnchainVote) -> Result<Upserted, sqlx::Error>;

    async fn get_vote_count(&self, proposal_id: &str) -> Result<u64, sqlx::Error>;

    /// Get the votes for the given proposal in ascending block time order.
    async fn get_votes(&self, proposal_id: &str) -> Result<Vec<OnchainVote>, sqlx::Error>;

    /// Get the ids of the voters of the given class who voted within the given inclusive epoch
    /// range.
    async fn get_voter_ids_voted_between(
        &self,
        class: VoterClass,
        from_epoch: u32,
        to_epoch: u32,
    ) -> Result<HashSet<String>, sqlx::Error>;

    async fn get_voter(&self, key: &VoterKey) -> Result<Option<Voter>, sqlx::Error>;

    /// Insert the given voter unless it already exists; returns whether it was inserted.
    async fn create_voter(&self, voter: &Voter) -> Result<bool, sqlx::Error>;

    /// Update metadata, voting power and refresh time of the given voter.
    async fn save_voter(&self, voter: &Voter) -> Result<(), sqlx::Error>;

    /// Get a page of voter keys ordered by class and id, starting after the given key.
    async fn get_voter_keys_after(
        &self,
        after: Option<&VoterKey>,
        limit: u32,
    ) -> Result<Vec<VoterKey>, sqlx::Error>;

    /// Refresh cursor helpers.
    async fn get_voter_refresh_cursor(&self) -> Result<Option<VoterKey>, sqlx::Error>;
    async fn set_voter_refresh_cursor(&self, key: Option<&VoterKey>) -> Result<(), sqlx::Error>;
}
