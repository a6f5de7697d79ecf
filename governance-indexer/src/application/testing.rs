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

//! Test doubles for the application layer.

use crate::{
    application::{
        AggregatorConfig, Config, Indexer, SchedulerConfig, TriggerConfig, VoterRefreshConfig,
    },
    domain::{
        FormulaTransition, ProposalEpochs, SpoFormula, VoterClass, VoterMetadata, VotingSummary,
        anchor::AnchorResolver,
        clock::Clock,
        ledger::{
            CertificateUpdate, ExternalProposal, ExternalVote, LedgerIndex, VoteFilter, VoterInfo,
        },
    },
    infra::storage::in_mem::InMemoryStorage,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{sync::Notify, time::Instant};

pub type TestIndexer = Indexer<MockLedger, InMemoryStorage, MockAnchors, ManualClock>;

pub fn config() -> Config {
    Config {
        scheduler_config: SchedulerConfig {
            enabled: true,
            interval: Duration::from_secs(300),
        },
        trigger_config: TriggerConfig {
            overview_cooldown: Duration::from_secs(60),
            detail_cooldown: Duration::from_secs(30),
        },
        voter_refresh_config: VoterRefreshConfig {
            enabled: false,
            period: Duration::from_secs(3_600),
            page_size: 100,
            max_rps: 0,
        },
        aggregator_config: AggregatorConfig {
            cc_seats: 7,
            drep_inactivity_start_epoch: 507,
            drep_activity_window: 20,
            spo_formula_transitions: vec![FormulaTransition {
                effective_epoch: 537,
                formula: SpoFormula::IncludeNotVoted,
            }],
        },
    }
}

pub fn indexer(ledger: MockLedger) -> TestIndexer {
    indexer_with_anchors(ledger, [])
}

pub fn indexer_with_anchors<const N: usize>(
    ledger: MockLedger,
    documents: [(&str, Value); N],
) -> TestIndexer {
    let anchors = MockAnchors {
        documents: Arc::new(
            documents
                .into_iter()
                .map(|(url, document)| (url.to_owned(), document))
                .collect(),
        ),
    };

    Indexer::new(
        &config(),
        ledger,
        InMemoryStorage::default(),
        anchors,
        ManualClock::default(),
    )
}

/// An active `TreasuryWithdrawals` proposal submitted with transaction `tx_<proposal_id>`.
pub fn external_proposal(proposal_id: &str, submitted: u32) -> ExternalProposal {
    ExternalProposal {
        proposal_id: proposal_id.to_owned(),
        tx_hash: format!("tx_{proposal_id}"),
        cert_index: 0,
        proposal_type: "TreasuryWithdrawals".to_owned(),
        epochs: ProposalEpochs {
            submitted,
            expiration: Some(submitted + 6),
            ..Default::default()
        },
        meta_url: None,
        meta_hash: None,
        meta_json: None,
    }
}

pub fn external_vote(
    tx_hash: &str,
    proposal_id: &str,
    voter_role: &str,
    voter_id: &str,
    vote: &str,
) -> ExternalVote {
    ExternalVote {
        tx_hash: tx_hash.to_owned(),
        proposal_id: proposal_id.to_owned(),
        voter_role: voter_role.to_owned(),
        voter_id: voter_id.to_owned(),
        vote: vote.to_owned(),
        epoch: 100,
        block_time: 1_700_000_000,
        meta_url: None,
        meta_hash: None,
    }
}

#[derive(Debug, Error)]
pub enum MockError {
    #[error("mock failure")]
    Failure,

    #[error("not found: {0}")]
    NotFound(String),
}

/// In-memory [LedgerIndex] with call recording and failure injection.
#[derive(Debug, Clone, Default)]
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    current_epoch: u32,
    proposals: Vec<ExternalProposal>,
    votes: Vec<ExternalVote>,
    summaries: HashMap<String, VotingSummary>,
    voter_powers: HashMap<(VoterClass, String, u32), u64>,
    voter_metadata: HashMap<(VoterClass, String), VoterMetadata>,
    total_powers: HashMap<(VoterClass, u32), u64>,
    drep_ids: Vec<String>,
    voter_info: Vec<VoterInfo>,
    certificate_updates: Vec<CertificateUpdate>,
    drep_powers: HashMap<u32, Vec<(String, u64)>>,
    fail_voter_lookups: bool,
    fail_power_lookups: bool,
    list_votes_calls: usize,
    voter_info_requests: Vec<Vec<String>>,
    gate: Option<Gate>,
}

impl MockLedger {
    pub fn new(current_epoch: u32) -> Self {
        let ledger = Self::default();
        ledger.state.lock().current_epoch = current_epoch;
        ledger
    }

    pub fn add_proposal(&self, proposal: ExternalProposal) {
        self.state.lock().proposals.push(proposal);
    }

    pub fn add_vote(&self, vote: ExternalVote) {
        self.state.lock().votes.push(vote);
    }

    pub fn set_summary(&self, proposal_id: &str, summary: VotingSummary) {
        self.state
            .lock()
            .summaries
            .insert(proposal_id.to_owned(), summary);
    }

    pub fn set_voter_power(&self, class: VoterClass, voter_id: &str, epoch: u32, amount: u64) {
        self.state
            .lock()
            .voter_powers
            .insert((class, voter_id.to_owned(), epoch), amount);
    }

    pub fn set_voter_metadata(&self, class: VoterClass, voter_id: &str, metadata: VoterMetadata) {
        self.state
            .lock()
            .voter_metadata
            .insert((class, voter_id.to_owned()), metadata);
    }

    pub fn set_total_power(&self, class: VoterClass, epoch: u32, amount: u64) {
        self.state.lock().total_powers.insert((class, epoch), amount);
    }

    pub fn set_drep_ids<'a>(&self, drep_ids: impl IntoIterator<Item = &'a str>) {
        self.state.lock().drep_ids = drep_ids.into_iter().map(ToOwned::to_owned).collect();
    }

    pub fn set_voter_info(&self, voter_info: Vec<VoterInfo>) {
        self.state.lock().voter_info = voter_info;
    }

    pub fn set_drep_powers(&self, epoch: u32, powers: Vec<(String, u64)>) {
        self.state.lock().drep_powers.insert(epoch, powers);
    }

    pub fn add_certificate_update(&self, drep_id: &str, epoch: u32) {
        self.state.lock().certificate_updates.push(CertificateUpdate {
            drep_id: drep_id.to_owned(),
            epoch,
        });
    }

    /// Let voter metadata and voter power lookups fail.
    pub fn fail_voter_lookups(&self) {
        self.state.lock().fail_voter_lookups = true;
    }

    /// Let all lookups the voting-power aggregation depends on fail.
    pub fn fail_power_lookups(&self) {
        self.state.lock().fail_power_lookups = true;
    }

    pub fn list_votes_calls(&self) -> usize {
        self.state.lock().list_votes_calls
    }

    pub fn voter_info_requests(&self) -> Vec<Vec<String>> {
        self.state.lock().voter_info_requests.clone()
    }

    /// Block the next current epoch lookup until the returned gate is released.
    pub fn gate_next_epoch_lookup(&self) -> Gate {
        let gate = Gate::default();
        self.state.lock().gate = Some(gate.clone());
        gate
    }

    fn check_power_lookup(&self) -> Result<(), MockError> {
        if self.state.lock().fail_power_lookups {
            Err(MockError::Failure)
        } else {
            Ok(())
        }
    }
}

impl LedgerIndex for MockLedger {
    type Error = MockError;

    async fn get_current_epoch(&self) -> Result<u32, Self::Error> {
        let gate = self.state.lock().gate.take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        Ok(self.state.lock().current_epoch)
    }

    async fn list_proposals(&self) -> Result<Vec<ExternalProposal>, Self::Error> {
        Ok(self.state.lock().proposals.clone())
    }

    async fn get_proposal(
        &self,
        proposal_id: &str,
    ) -> Result<Option<ExternalProposal>, Self::Error> {
        let state = self.state.lock();
        Ok(state
            .proposals
            .iter()
            .find(|proposal| proposal.proposal_id == proposal_id)
            .cloned())
    }

    async fn list_votes(&self, filter: &VoteFilter) -> Result<Vec<ExternalVote>, Self::Error> {
        let mut state = self.state.lock();
        state.list_votes_calls += 1;

        let mut votes = state
            .votes
            .iter()
            .filter(|vote| {
                filter
                    .proposal_id
                    .as_ref()
                    .is_none_or(|proposal_id| &vote.proposal_id == proposal_id)
            })
            .filter(|vote| filter.min_epoch.is_none_or(|min_epoch| vote.epoch >= min_epoch))
            .cloned()
            .collect::<Vec<_>>();
        votes.sort_by_key(|vote| vote.block_time);

        Ok(votes)
    }

    async fn get_proposal_voting_summary(
        &self,
        proposal_id: &str,
    ) -> Result<Option<VotingSummary>, Self::Error> {
        self.check_power_lookup()?;
        Ok(self.state.lock().summaries.get(proposal_id).copied())
    }

    async fn get_voter_power(
        &self,
        class: VoterClass,
        voter_id: &str,
        epoch: u32,
    ) -> Result<Option<u64>, Self::Error> {
        let state = self.state.lock();
        if state.fail_voter_lookups {
            return Err(MockError::Failure);
        }

        Ok(state
            .voter_powers
            .get(&(class, voter_id.to_owned(), epoch))
            .copied())
    }

    async fn get_voter_info(&self, drep_ids: &[String]) -> Result<Vec<VoterInfo>, Self::Error> {
        self.check_power_lookup()?;

        let mut state = self.state.lock();
        state.voter_info_requests.push(drep_ids.to_vec());

        Ok(state
            .voter_info
            .iter()
            .filter(|info| drep_ids.contains(&info.voter_id))
            .cloned()
            .collect())
    }

    async fn get_total_voting_power(
        &self,
        class: VoterClass,
        epoch: u32,
    ) -> Result<u64, Self::Error> {
        self.check_power_lookup()?;
        Ok(self
            .state
            .lock()
            .total_powers
            .get(&(class, epoch))
            .copied()
            .unwrap_or_default())
    }

    async fn list_drep_ids(&self) -> Result<Vec<String>, Self::Error> {
        self.check_power_lookup()?;
        Ok(self.state.lock().drep_ids.clone())
    }

    async fn list_drep_certificate_updates(
        &self,
        from_epoch: u32,
        to_epoch: u32,
    ) -> Result<Vec<CertificateUpdate>, Self::Error> {
        self.check_power_lookup()?;
        Ok(self
            .state
            .lock()
            .certificate_updates
            .iter()
            .filter(|update| (from_epoch..=to_epoch).contains(&update.epoch))
            .cloned()
            .collect())
    }

    async fn list_drep_powers(&self, epoch: u32) -> Result<Vec<(String, u64)>, Self::Error> {
        self.check_power_lookup()?;
        Ok(self
            .state
            .lock()
            .drep_powers
            .get(&epoch)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_voter_metadata(
        &self,
        class: VoterClass,
        voter_id: &str,
    ) -> Result<Option<VoterMetadata>, Self::Error> {
        let state = self.state.lock();
        if state.fail_voter_lookups {
            return Err(MockError::Failure);
        }

        Ok(state
            .voter_metadata
            .get(&(class, voter_id.to_owned()))
            .cloned())
    }
}

/// Lets a test wait until a mock call has been entered and then release it.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// [AnchorResolver] serving fixed documents by URL.
#[derive(Debug, Clone, Default)]
pub struct MockAnchors {
    documents: Arc<HashMap<String, Value>>,
}

impl AnchorResolver for MockAnchors {
    type Error = MockError;

    async fn fetch(&self, url: &str) -> Result<Value, Self::Error> {
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| MockError::NotFound(url.to_owned()))
    }
}

/// Unix time a [ManualClock] starts at.
pub const MANUAL_CLOCK_START: i64 = 1_750_000_000;

/// [Clock] which only advances when told to.
#[derive(Debug, Clone)]
pub struct ManualClock(Arc<Mutex<(Instant, i64)>>);

impl ManualClock {
    pub fn advance(&self, duration: Duration) {
        let mut time = self.0.lock();
        time.0 += duration;
        time.1 += duration.as_secs() as i64;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self(Arc::new(Mutex::new((Instant::now(), MANUAL_CLOCK_START))))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.0.lock().0
    }

    fn unix_time(&self) -> i64 {
        self.0.lock().1
    }
}
