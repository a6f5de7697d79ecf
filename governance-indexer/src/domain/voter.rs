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

use crate::domain::VoterClass;
use std::fmt;

/// Predefined DRep delegating all its stake to abstaining.
pub const ALWAYS_ABSTAIN_DREP: &str = "drep_always_abstain";

/// Predefined DRep delegating all its stake to no confidence.
pub const ALWAYS_NO_CONFIDENCE_DREP: &str = "drep_always_no_confidence";

pub fn is_predefined_drep(drep_id: &str) -> bool {
    drep_id == ALWAYS_ABSTAIN_DREP || drep_id == ALWAYS_NO_CONFIDENCE_DREP
}

/// Natural key of a voter, ordered by class, then id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoterKey {
    pub class: VoterClass,
    pub id: String,
}

impl VoterKey {
    pub fn new(class: VoterClass, id: impl Into<String>) -> Self {
        Self {
            class,
            id: id.into(),
        }
    }
}

impl fmt::Display for VoterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voter {
    pub key: VoterKey,
    pub metadata: VoterMetadata,

    /// Last known voting power in lovelace; always zero for committee members.
    pub voting_power: u64,

    /// Unix timestamp in seconds of the last metadata and power refresh.
    pub refreshed_at: Option<i64>,
}

impl Voter {
    /// A minimal voter record without metadata and power.
    pub fn new(key: VoterKey) -> Self {
        Self {
            key,
            metadata: VoterMetadata::default(),
            voting_power: 0,
            refreshed_at: None,
        }
    }
}

/// Display metadata of a voter, all optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoterMetadata {
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub payment_address: Option<String>,
    pub icon_url: Option<String>,
}
