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

use crate::domain::{ParseError, Threshold, Thresholds, VotingPowerFields};
use std::{fmt, str::FromStr};

/// Title of proposals for which neither inline nor anchored metadata provides one.
pub const DEFAULT_TITLE: &str = "Untitled governance action";

/// A governance proposal as tracked locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    /// CIP-129 identifier, e.g. `gov_action1...`.
    pub proposal_id: String,
    pub tx_hash: String,
    pub cert_index: u32,
    pub action_type: GovActionType,
    pub status: ProposalStatus,
    pub epochs: ProposalEpochs,
    pub metadata: ProposalMetadata,
    pub voting_power: VotingPowerFields,
}

impl Proposal {
    /// The epoch at which voting power is evaluated: the current epoch while active, the
    /// ratification epoch once ratified or enacted, the expiration epoch otherwise.
    pub fn reference_epoch(&self, current_epoch: u32) -> u32 {
        let epochs = &self.epochs;

        let epoch = match self.status {
            ProposalStatus::Active => None,
            ProposalStatus::Ratified | ProposalStatus::Enacted => {
                epochs.ratified.or(epochs.enacted)
            }
            ProposalStatus::Expired | ProposalStatus::Closed => {
                epochs.expired.or(epochs.dropped).or(epochs.expiration)
            }
        };

        epoch.unwrap_or(current_epoch)
    }

    /// The `txHash#index` reference of the submitting transaction.
    pub fn tx_ref(&self) -> String {
        format!("{}#{}", self.tx_hash, self.cert_index)
    }
}

/// Reference to a proposal as given by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalRef<'a> {
    /// CIP-129 identifier.
    Id(&'a str),

    /// `txHash#index` of the submitting transaction.
    Tx { tx_hash: &'a str, cert_index: u32 },
}

impl<'a> ProposalRef<'a> {
    /// Parse the given identifier; `None` for a `txHash#index` reference with an invalid index.
    pub fn parse(identifier: &'a str) -> Option<Self> {
        match identifier.split_once('#') {
            Some((tx_hash, cert_index)) => {
                let cert_index = cert_index.parse().ok()?;
                Some(Self::Tx {
                    tx_hash,
                    cert_index,
                })
            }

            None => Some(Self::Id(identifier)),
        }
    }
}

/// Lifecycle epochs of a proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProposalEpochs {
    pub submitted: u32,
    pub ratified: Option<u32>,
    pub enacted: Option<u32>,
    pub expired: Option<u32>,
    pub dropped: Option<u32>,

    /// Planned expiration epoch.
    pub expiration: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalMetadata {
    pub title: String,
    pub description: Option<String>,
    pub motivation: Option<String>,
    pub rationale: Option<String>,
    pub url: Option<String>,
}

impl ProposalMetadata {
    pub fn untitled(url: Option<String>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_owned(),
            description: None,
            motivation: None,
            rationale: None,
            url,
        }
    }

    pub fn is_untitled(&self) -> bool {
        self.title == DEFAULT_TITLE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GovActionType {
    ParameterChange,
    HardForkInitiation,
    TreasuryWithdrawals,
    NoConfidence,
    NewCommittee,
    NewConstitution,
    InfoAction,
}

impl GovActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GovActionType::ParameterChange => "ParameterChange",
            GovActionType::HardForkInitiation => "HardForkInitiation",
            GovActionType::TreasuryWithdrawals => "TreasuryWithdrawals",
            GovActionType::NoConfidence => "NoConfidence",
            GovActionType::NewCommittee => "NewCommittee",
            GovActionType::NewConstitution => "NewConstitution",
            GovActionType::InfoAction => "InfoAction",
        }
    }

    pub fn is_informational(&self) -> bool {
        matches!(self, GovActionType::InfoAction)
    }

    /// Ratification thresholds per voter class in basis points; `None` means the class does not
    /// take part in ratifying this type of action.
    pub fn thresholds(&self) -> Thresholds {
        let (cc, drep, spo) = match self {
            GovActionType::NoConfidence => (None, Some(6_700), Some(5_100)),
            GovActionType::NewCommittee => (None, Some(6_700), Some(5_100)),
            GovActionType::NewConstitution => (Some(6_700), Some(7_500), None),
            GovActionType::HardForkInitiation => (Some(6_700), Some(6_000), Some(5_100)),
            GovActionType::ParameterChange => (Some(6_700), Some(6_700), None),
            GovActionType::TreasuryWithdrawals => (Some(6_700), Some(6_700), None),
            GovActionType::InfoAction => (None, Some(10_000), Some(10_000)),
        };

        Thresholds {
            cc: cc.map(Threshold),
            drep: drep.map(Threshold),
            spo: spo.map(Threshold),
        }
    }
}

impl fmt::Display for GovActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GovActionType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ParameterChange" => Ok(GovActionType::ParameterChange),
            "HardForkInitiation" => Ok(GovActionType::HardForkInitiation),
            "TreasuryWithdrawals" => Ok(GovActionType::TreasuryWithdrawals),
            "NoConfidence" => Ok(GovActionType::NoConfidence),
            "NewCommittee" | "UpdateCommittee" => Ok(GovActionType::NewCommittee),
            "NewConstitution" => Ok(GovActionType::NewConstitution),
            "InfoAction" => Ok(GovActionType::InfoAction),
            other => Err(ParseError::new("governance action type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProposalStatus {
    Active,
    Ratified,
    Enacted,
    Expired,
    Closed,
}

impl ProposalStatus {
    /// Derive the status from the lifecycle epochs relative to the current epoch. Enactment takes
    /// precedence over ratification which takes precedence over expiration; expired or dropped
    /// info actions are closed rather than expired.
    pub fn derive(epochs: &ProposalEpochs, action_type: GovActionType, current_epoch: u32) -> Self {
        let reached = |epoch: Option<u32>| epoch.is_some_and(|epoch| epoch <= current_epoch);

        if reached(epochs.enacted) {
            ProposalStatus::Enacted
        } else if reached(epochs.ratified) {
            ProposalStatus::Ratified
        } else if reached(epochs.expired) || reached(epochs.dropped) {
            if action_type.is_informational() {
                ProposalStatus::Closed
            } else {
                ProposalStatus::Expired
            }
        } else {
            ProposalStatus::Active
        }
    }

    /// Terminal proposals are no longer re-processed by routine syncs.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Active => "ACTIVE",
            ProposalStatus::Ratified => "RATIFIED",
            ProposalStatus::Enacted => "ENACTED",
            ProposalStatus::Expired => "EXPIRED",
            ProposalStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(ProposalStatus::Active),
            "RATIFIED" => Ok(ProposalStatus::Ratified),
            "ENACTED" => Ok(ProposalStatus::Enacted),
            "EXPIRED" => Ok(ProposalStatus::Expired),
            "CLOSED" => Ok(ProposalStatus::Closed),
            other => Err(ParseError::new("proposal status", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{
        GovActionType, Proposal, ProposalEpochs, ProposalMetadata, ProposalRef, ProposalStatus,
        VotingPowerFields,
    };

    fn epochs(
        ratified: Option<u32>,
        enacted: Option<u32>,
        expired: Option<u32>,
        dropped: Option<u32>,
    ) -> ProposalEpochs {
        ProposalEpochs {
            submitted: 90,
            ratified,
            enacted,
            expired,
            dropped,
            expiration: Some(96),
        }
    }

    #[test]
    fn test_derive_status() {
        let cases = [
            (
                epochs(Some(98), Some(99), None, None),
                GovActionType::ParameterChange,
                ProposalStatus::Enacted,
            ),
            (
                epochs(Some(99), Some(101), None, None),
                GovActionType::ParameterChange,
                ProposalStatus::Ratified,
            ),
            (
                epochs(None, None, Some(100), None),
                GovActionType::InfoAction,
                ProposalStatus::Closed,
            ),
            (
                epochs(None, None, Some(100), None),
                GovActionType::TreasuryWithdrawals,
                ProposalStatus::Expired,
            ),
            (
                epochs(None, None, None, Some(97)),
                GovActionType::NoConfidence,
                ProposalStatus::Expired,
            ),
            (
                epochs(None, None, Some(101), None),
                GovActionType::ParameterChange,
                ProposalStatus::Active,
            ),
            (
                epochs(None, None, None, None),
                GovActionType::InfoAction,
                ProposalStatus::Active,
            ),
        ];

        for (epochs, action_type, expected) in cases {
            let status = ProposalStatus::derive(&epochs, action_type, 100);
            assert_eq!(status, expected, "{epochs:?} {action_type}");
        }
    }

    #[test]
    fn test_reference_epoch() {
        let mut proposal = Proposal {
            proposal_id: "gov_action1".to_owned(),
            tx_hash: "abcd".to_owned(),
            cert_index: 0,
            action_type: GovActionType::TreasuryWithdrawals,
            status: ProposalStatus::Active,
            epochs: epochs(None, None, None, None),
            metadata: ProposalMetadata::untitled(None),
            voting_power: VotingPowerFields::default(),
        };
        assert_eq!(proposal.reference_epoch(100), 100);

        proposal.status = ProposalStatus::Enacted;
        proposal.epochs = epochs(Some(98), Some(99), None, None);
        assert_eq!(proposal.reference_epoch(100), 98);

        proposal.status = ProposalStatus::Expired;
        proposal.epochs = epochs(None, None, None, Some(97));
        assert_eq!(proposal.reference_epoch(100), 97);

        proposal.epochs = epochs(None, None, None, None);
        assert_eq!(proposal.reference_epoch(100), 96);

        assert_eq!(proposal.tx_ref(), "abcd#0");
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "UpdateCommittee".parse::<GovActionType>(),
            Ok(GovActionType::NewCommittee)
        );
        assert!("Whatever".parse::<GovActionType>().is_err());

        for status in [
            ProposalStatus::Active,
            ProposalStatus::Ratified,
            ProposalStatus::Enacted,
            ProposalStatus::Expired,
            ProposalStatus::Closed,
        ] {
            assert_eq!(status.as_str().parse::<ProposalStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_parse_proposal_ref() {
        assert_eq!(
            ProposalRef::parse("gov_action1a"),
            Some(ProposalRef::Id("gov_action1a"))
        );
        assert_eq!(
            ProposalRef::parse("abc#02"),
            Some(ProposalRef::Tx {
                tx_hash: "abc",
                cert_index: 2,
            })
        );
        assert_eq!(ProposalRef::parse("abc#"), None);
        assert_eq!(ProposalRef::parse("abc#-1"), None);
    }
}
