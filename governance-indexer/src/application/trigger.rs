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

use crate::domain::clock::Clock;
use log::debug;
use parking_lot::Mutex;
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::{task::JoinHandle, time::Instant};

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    #[serde(with = "humantime_serde")]
    pub overview_cooldown: Duration,

    #[serde(with = "humantime_serde")]
    pub detail_cooldown: Duration,
}

/// What a sync-on-read covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncScope {
    Overview,

    /// Identified by CIP-129 proposal id or `txHash#index` reference.
    ProposalDetail(String),
}

#[derive(Debug)]
pub enum TriggerOutcome {
    /// A background sync has been launched.
    Launched(JoinHandle<()>),

    /// A sync for the same scope is still running.
    InFlight,

    /// A sync for the same scope has been launched within the cooldown.
    CoolingDown,
}

/// Launches background syncs per scope, at most one at a time per scope and at most one per
/// cooldown.
#[derive(Clone)]
pub struct SyncTrigger<C> {
    clock: C,
    overview_cooldown: Duration,
    detail_cooldown: Duration,
    state: Arc<Mutex<TriggerState>>,
}

#[derive(Default)]
struct TriggerState {
    last_launched: HashMap<SyncScope, Instant>,
    in_flight: HashSet<SyncScope>,
}

impl<C> SyncTrigger<C>
where
    C: Clock,
{
    pub fn new(config: &TriggerConfig, clock: C) -> Self {
        Self {
            clock,
            overview_cooldown: config.overview_cooldown,
            detail_cooldown: config.detail_cooldown,
            state: Default::default(),
        }
    }

    /// Spawn the given sync for the given scope unless a sync for that scope is in flight or
    /// cooling down. Returns immediately.
    pub fn launch<F>(&self, scope: SyncScope, sync: F) -> TriggerOutcome
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cooldown = match scope {
            SyncScope::Overview => self.overview_cooldown,
            SyncScope::ProposalDetail(_) => self.detail_cooldown,
        };

        {
            let mut state = self.state.lock();

            if state.in_flight.contains(&scope) {
                debug!(scope:?; "sync in flight");
                return TriggerOutcome::InFlight;
            }

            let now = self.clock.now();
            let cooling_down = state
                .last_launched
                .get(&scope)
                .is_some_and(|launched_at| now.duration_since(*launched_at) < cooldown);
            if cooling_down {
                debug!(scope:?; "sync cooling down");
                return TriggerOutcome::CoolingDown;
            }

            state.last_launched.insert(scope.clone(), now);
            state.in_flight.insert(scope.clone());
        }

        let guard = InFlightGuard {
            state: self.state.clone(),
            scope,
        };

        let handle = tokio::spawn(async move {
            let _guard = guard;
            sync.await;
        });

        TriggerOutcome::Launched(handle)
    }
}

/// Removes its scope from the in-flight set when dropped, also if the sync panics.
struct InFlightGuard {
    state: Arc<Mutex<TriggerState>>,
    scope: SyncScope,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.state.lock().in_flight.remove(&self.scope);
    }
}
