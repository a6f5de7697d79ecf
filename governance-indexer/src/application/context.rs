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
    VoterKey,
    ledger::{ExternalVote, VoterInfo},
};
use itertools::Itertools;
use std::collections::HashMap;

/// State owned by a single sync invocation: the epoch the run works against, the vote catalog
/// prefetched for batch ingestion, the voters already resolved and the current DRep activity.
#[derive(Debug, Default)]
pub struct SyncContext {
    pub current_epoch: u32,
    votes: Option<HashMap<String, Vec<ExternalVote>>>,
    voters: HashMap<VoterKey, u64>,
    drep_info: Option<Vec<VoterInfo>>,
}

impl SyncContext {
    pub fn new(current_epoch: u32) -> Self {
        Self {
            current_epoch,
            ..Default::default()
        }
    }

    /// Cache the given votes grouped by proposal, keeping their order.
    pub fn cache_votes(&mut self, votes: Vec<ExternalVote>) {
        let by_proposal = votes
            .into_iter()
            .into_group_map_by(|vote| vote.proposal_id.clone());

        self.votes = Some(by_proposal);
    }

    /// Take the cached votes of the given proposal; `None` if no votes have been cached at all.
    pub fn take_votes(&mut self, proposal_id: &str) -> Option<Vec<ExternalVote>> {
        self.votes
            .as_mut()
            .map(|votes| votes.remove(proposal_id).unwrap_or_default())
    }

    pub fn voter_power(&self, key: &VoterKey) -> Option<u64> {
        self.voters.get(key).copied()
    }

    pub fn remember_voter(&mut self, key: VoterKey, voting_power: u64) {
        self.voters.insert(key, voting_power);
    }

    /// Current activity and voting power of the registered DReps, if already fetched in this run.
    pub fn drep_info(&self) -> Option<&[VoterInfo]> {
        self.drep_info.as_deref()
    }

    pub fn cache_drep_info(&mut self, drep_info: Vec<VoterInfo>) {
        self.drep_info = Some(drep_info);
    }
}
