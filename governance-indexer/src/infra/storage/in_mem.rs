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
    OnchainVote, Proposal, ProposalRef, ProposalStatus, Voter, VoterClass, VoterKey,
    VotingPowerFields,
    storage::{self, Upserted},
};
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ops::Bound,
    sync::Arc,
};

/// Natural key of a vote, leading with the proposal for per-proposal range scans.
type VoteKey = (String, String, VoterClass, String);

/// In-memory storage implementation, e.g. for local runs without Postgres.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<RwLock<State>>,
}

#[derive(Debug, Default)]
struct State {
    proposals: HashMap<String, Proposal>,
    votes: BTreeMap<VoteKey, OnchainVote>,
    voters: BTreeMap<VoterKey, Voter>,
    voter_refresh_cursor: Option<VoterKey>,
}

impl State {
    fn votes(&self, proposal_id: &str) -> impl Iterator<Item = &OnchainVote> {
        self.votes
            .iter()
            .skip_while(move |((id, ..), _)| id.as_str() < proposal_id)
            .take_while(move |((id, ..), _)| id == proposal_id)
            .map(|(_, vote)| vote)
    }
}

impl storage::Storage for InMemoryStorage {
    async fn get_proposal(&self, proposal_id: &str) -> Result<Option<Proposal>, sqlx::Error> {
        Ok(self.state.read().proposals.get(proposal_id).cloned())
    }

    async fn find_proposal(&self, identifier: &str) -> Result<Option<Proposal>, sqlx::Error> {
        let state = self.state.read();

        let proposal = match ProposalRef::parse(identifier) {
            Some(ProposalRef::Id(proposal_id)) => state.proposals.get(proposal_id).cloned(),

            Some(ProposalRef::Tx {
                tx_hash,
                cert_index,
            }) => state
                .proposals
                .values()
                .find(|proposal| proposal.tx_hash == tx_hash && proposal.cert_index == cert_index)
                .cloned(),

            None => None,
        };

        Ok(proposal)
    }

    async fn get_proposal_statuses(
        &self,
    ) -> Result<HashMap<String, ProposalStatus>, sqlx::Error> {
        let statuses = self
            .state
            .read()
            .proposals
            .iter()
            .map(|(id, proposal)| (id.to_owned(), proposal.status))
            .collect();

        Ok(statuses)
    }

    async fn get_proposal_count(&self) -> Result<u64, sqlx::Error> {
        Ok(self.state.read().proposals.len() as u64)
    }

    async fn save_proposal(&self, proposal: &Proposal) -> Result<Upserted, sqlx::Error> {
        let mut state = self.state.write();

        let upserted = match state.proposals.get_mut(&proposal.proposal_id) {
            Some(stored) => {
                *stored = Proposal {
                    voting_power: stored.voting_power,
                    ..proposal.clone()
                };
                Upserted::Updated
            }

            None => {
                let proposal = Proposal {
                    voting_power: VotingPowerFields::default(),
                    ..proposal.clone()
                };
                state
                    .proposals
                    .insert(proposal.proposal_id.clone(), proposal);
                Upserted::Created
            }
        };

        Ok(upserted)
    }

    async fn save_voting_power(
        &self,
        proposal_id: &str,
        voting_power: &VotingPowerFields,
    ) -> Result<(), sqlx::Error> {
        if let Some(proposal) = self.state.write().proposals.get_mut(proposal_id) {
            proposal.voting_power = *voting_power;
        }

        Ok(())
    }

    async fn save_vote(&self, vote: &OnchainVote) -> Result<Upserted, sqlx::Error> {
        let key = (
            vote.proposal_id.clone(),
            vote.tx_hash.clone(),
            vote.voter_class,
            vote.voter_id.clone(),
        );

        let upserted = match self.state.write().votes.insert(key, vote.clone()) {
            Some(_) => Upserted::Updated,
            None => Upserted::Created,
        };

        Ok(upserted)
    }

    async fn get_vote_count(&self, proposal_id: &str) -> Result<u64, sqlx::Error> {
        Ok(self.state.read().votes(proposal_id).count() as u64)
    }

    async fn get_votes(&self, proposal_id: &str) -> Result<Vec<OnchainVote>, sqlx::Error> {
        let mut votes = self
            .state
            .read()
            .votes(proposal_id)
            .cloned()
            .collect::<Vec<_>>();
        votes.sort_by(|a, b| (a.block_time, &a.tx_hash).cmp(&(b.block_time, &b.tx_hash)));

        Ok(votes)
    }

    async fn get_voter_ids_voted_between(
        &self,
        class: VoterClass,
        from_epoch: u32,
        to_epoch: u32,
    ) -> Result<HashSet<String>, sqlx::Error> {
        let voter_ids = self
            .state
            .read()
            .votes
            .values()
            .filter(|vote| {
                vote.voter_class == class && (from_epoch..=to_epoch).contains(&vote.epoch)
            })
            .map(|vote| vote.voter_id.clone())
            .collect();

        Ok(voter_ids)
    }

    async fn get_voter(&self, key: &VoterKey) -> Result<Option<Voter>, sqlx::Error> {
        Ok(self.state.read().voters.get(key).cloned())
    }

    async fn create_voter(&self, voter: &Voter) -> Result<bool, sqlx::Error> {
        let mut state = self.state.write();

        if state.voters.contains_key(&voter.key) {
            return Ok(false);
        }
        state.voters.insert(voter.key.clone(), voter.clone());

        Ok(true)
    }

    async fn save_voter(&self, voter: &Voter) -> Result<(), sqlx::Error> {
        self.state
            .write()
            .voters
            .insert(voter.key.clone(), voter.clone());

        Ok(())
    }

    async fn get_voter_keys_after(
        &self,
        after: Option<&VoterKey>,
        limit: u32,
    ) -> Result<Vec<VoterKey>, sqlx::Error> {
        let state = self.state.read();

        let lower = match after {
            Some(after) => Bound::Excluded(after),
            None => Bound::Unbounded,
        };
        let keys = state
            .voters
            .range::<VoterKey, _>((lower, Bound::Unbounded))
            .take(limit as usize)
            .map(|(key, _)| key.clone())
            .collect();

        Ok(keys)
    }

    async fn get_voter_refresh_cursor(&self) -> Result<Option<VoterKey>, sqlx::Error> {
        Ok(self.state.read().voter_refresh_cursor.clone())
    }

    async fn set_voter_refresh_cursor(&self, key: Option<&VoterKey>) -> Result<(), sqlx::Error> {
        self.state.write().voter_refresh_cursor = key.cloned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::{
            GovActionType, OnchainVote, Proposal, ProposalEpochs, ProposalMetadata,
            ProposalStatus, StakePower, VoteChoice, Voter, VoterClass, VoterKey,
            VotingPowerFields,
            storage::{Storage, Upserted},
        },
        infra::storage::in_mem::InMemoryStorage,
    };
    use assert_matches::assert_matches;

    fn proposal(proposal_id: &str) -> Proposal {
        Proposal {
            proposal_id: proposal_id.to_owned(),
            tx_hash: format!("tx-{proposal_id}"),
            cert_index: 0,
            action_type: GovActionType::InfoAction,
            status: ProposalStatus::Active,
            epochs: ProposalEpochs {
                submitted: 500,
                ..Default::default()
            },
            metadata: ProposalMetadata::untitled(None),
            voting_power: VotingPowerFields::default(),
        }
    }

    fn vote(tx_hash: &str, proposal_id: &str, voter_id: &str, epoch: u32) -> OnchainVote {
        OnchainVote {
            tx_hash: tx_hash.to_owned(),
            proposal_id: proposal_id.to_owned(),
            voter_class: VoterClass::DRep,
            voter_id: voter_id.to_owned(),
            choice: VoteChoice::Yes,
            voting_power: 1_000,
            anchor: None,
            epoch,
            block_time: epoch as i64,
        }
    }

    #[tokio::test]
    async fn test_proposal_idempotence() -> anyhow::Result<()> {
        let storage = InMemoryStorage::default();
        let proposal = proposal("gov_action1a");

        assert_eq!(storage.save_proposal(&proposal).await?, Upserted::Created);
        assert_eq!(storage.save_proposal(&proposal).await?, Upserted::Updated);
        assert_eq!(storage.get_proposal_count().await?, 1);
        assert_matches!(
            storage.get_proposal("gov_action1a").await?,
            Some(stored) if stored == proposal
        );
        assert_matches!(
            storage.find_proposal("tx-gov_action1a#0").await?,
            Some(stored) if stored.proposal_id == "gov_action1a"
        );
        assert!(storage.find_proposal("tx-gov_action1a#1").await?.is_none());
        assert!(storage.find_proposal("tx-gov_action1a#x").await?.is_none());

        // Indexes are compared as numbers, like in the Postgres implementation.
        assert_matches!(
            storage.find_proposal("tx-gov_action1a#00").await?,
            Some(stored) if stored.proposal_id == "gov_action1a"
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_save_proposal_keeps_voting_power() -> anyhow::Result<()> {
        let storage = InMemoryStorage::default();
        let mut proposal = proposal("gov_action1a");
        storage.save_proposal(&proposal).await?;

        let voting_power = VotingPowerFields {
            drep: StakePower {
                total: 10,
                yes: 5,
                ..Default::default()
            },
            ..Default::default()
        };
        storage
            .save_voting_power("gov_action1a", &voting_power)
            .await?;

        proposal.status = ProposalStatus::Expired;
        storage.save_proposal(&proposal).await?;

        assert_matches!(
            storage.get_proposal("gov_action1a").await?,
            Some(stored) if stored.voting_power == voting_power
                && stored.status == ProposalStatus::Expired
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_vote_identity() -> anyhow::Result<()> {
        let storage = InMemoryStorage::default();

        let first = vote("tx1", "gov_action1a", "drep1", 500);
        assert_eq!(storage.save_vote(&first).await?, Upserted::Created);
        assert_eq!(storage.save_vote(&first).await?, Upserted::Updated);
        assert_eq!(storage.get_vote_count("gov_action1a").await?, 1);

        let changed = OnchainVote {
            choice: VoteChoice::No,
            ..vote("tx2", "gov_action1a", "drep1", 501)
        };
        assert_eq!(storage.save_vote(&changed).await?, Upserted::Created);
        storage
            .save_vote(&vote("tx3", "gov_action1b", "drep2", 510))
            .await?;

        assert_eq!(storage.get_vote_count("gov_action1a").await?, 2);
        let votes = storage.get_votes("gov_action1a").await?;
        assert_eq!(
            votes.iter().map(|vote| vote.tx_hash.as_str()).collect::<Vec<_>>(),
            vec!["tx1", "tx2"]
        );

        let voter_ids = storage
            .get_voter_ids_voted_between(VoterClass::DRep, 501, 510)
            .await?;
        assert_eq!(voter_ids.len(), 2);
        let voter_ids = storage
            .get_voter_ids_voted_between(VoterClass::Spo, 0, 1_000)
            .await?;
        assert!(voter_ids.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_voters() -> anyhow::Result<()> {
        let storage = InMemoryStorage::default();

        let keys = [
            VoterKey::new(VoterClass::Spo, "pool1a"),
            VoterKey::new(VoterClass::DRep, "drep1b"),
            VoterKey::new(VoterClass::DRep, "drep1a"),
            VoterKey::new(VoterClass::Cc, "cc_hot1a"),
        ];
        for key in &keys {
            assert!(storage.create_voter(&Voter::new(key.clone())).await?);
        }
        assert!(!storage.create_voter(&Voter::new(keys[0].clone())).await?);

        let page = storage.get_voter_keys_after(None, 2).await?;
        assert_eq!(page, vec![keys[3].clone(), keys[2].clone()]);
        let page = storage.get_voter_keys_after(Some(&keys[2]), 10).await?;
        assert_eq!(page, vec![keys[1].clone(), keys[0].clone()]);

        storage.set_voter_refresh_cursor(Some(&keys[1])).await?;
        assert_eq!(storage.get_voter_refresh_cursor().await?, Some(keys[1].clone()));

        Ok(())
    }
}
