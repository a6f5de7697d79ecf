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

use crate::domain::ParseError;
use std::{fmt, str::FromStr};

/// A vote cast on chain, unique by transaction hash, proposal and voter. A voter changing their
/// vote produces another row, so the history of changes is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnchainVote {
    pub tx_hash: String,
    pub proposal_id: String,
    pub voter_class: VoterClass,
    pub voter_id: String,
    pub choice: VoteChoice,

    /// Voting power of the voter known at ingestion time, in lovelace.
    pub voting_power: u64,

    pub anchor: Option<Anchor>,
    pub epoch: u32,

    /// Unix timestamp in seconds.
    pub block_time: i64,
}

/// Off-chain reference, e.g. the rationale of a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub url: String,
    pub hash: Option<String>,
}

/// Governance voter classes. The variant order matches the order of their textual
/// representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VoterClass {
    Cc,
    DRep,
    Spo,
}

impl VoterClass {
    pub const ALL: [VoterClass; 3] = [VoterClass::Cc, VoterClass::DRep, VoterClass::Spo];

    pub fn as_str(&self) -> &'static str {
        match self {
            VoterClass::Cc => "CC",
            VoterClass::DRep => "DREP",
            VoterClass::Spo => "SPO",
        }
    }
}

impl fmt::Display for VoterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses both the stored representation and the voter roles of the ledger index.
impl FromStr for VoterClass {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CC" | "ConstitutionalCommittee" => Ok(VoterClass::Cc),
            "DREP" | "DRep" => Ok(VoterClass::DRep),
            "SPO" => Ok(VoterClass::Spo),
            other => Err(ParseError::new("voter class", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteChoice {
    Yes,
    No,
    Abstain,
}

impl VoteChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteChoice::Yes => "YES",
            VoteChoice::No => "NO",
            VoteChoice::Abstain => "ABSTAIN",
        }
    }
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteChoice {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("yes") {
            Ok(VoteChoice::Yes)
        } else if s.eq_ignore_ascii_case("no") {
            Ok(VoteChoice::No)
        } else if s.eq_ignore_ascii_case("abstain") {
            Ok(VoteChoice::Abstain)
        } else {
            Err(ParseError::new("vote", s))
        }
    }
}
