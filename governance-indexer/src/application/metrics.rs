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

use crate::application::TriggerOutcome;
use metrics::{Counter, counter};

#[derive(Clone)]
pub struct Metrics {
    pub proposals_synced: Counter,
    pub proposal_sync_failures: Counter,
    pub votes_created: Counter,
    pub voters_created: Counter,
    pub voters_refreshed: Counter,
    pub scheduler_runs: Counter,
    pub scheduler_runs_skipped: Counter,
    triggers_launched: Counter,
    triggers_in_flight: Counter,
    triggers_cooling_down: Counter,
}

impl Metrics {
    pub fn record_trigger(&self, outcome: &TriggerOutcome) {
        match outcome {
            TriggerOutcome::Launched(_) => self.triggers_launched.increment(1),
            TriggerOutcome::InFlight => self.triggers_in_flight.increment(1),
            TriggerOutcome::CoolingDown => self.triggers_cooling_down.increment(1),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            proposals_synced: counter!("governance_indexer_proposals_synced"),
            proposal_sync_failures: counter!("governance_indexer_proposal_sync_failures"),
            votes_created: counter!("governance_indexer_votes_created"),
            voters_created: counter!("governance_indexer_voters_created"),
            voters_refreshed: counter!("governance_indexer_voters_refreshed"),
            scheduler_runs: counter!("governance_indexer_scheduler_runs"),
            scheduler_runs_skipped: counter!("governance_indexer_scheduler_runs_skipped"),
            triggers_launched: counter!("governance_indexer_triggers", "outcome" => "launched"),
            triggers_in_flight: counter!("governance_indexer_triggers", "outcome" => "in_flight"),
            triggers_cooling_down: counter!(
                "governance_indexer_triggers",
                "outcome" => "cooling_down"
            ),
        }
    }
}
