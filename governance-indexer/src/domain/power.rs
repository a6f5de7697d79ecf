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

//! Voting-power tallies and ratification thresholds. All comparisons use integer arithmetic on
//! lovelace and basis points; percentages are for display only.

use crate::domain::GovActionType;
use serde::Deserialize;

/// 100 % in basis points.
pub const FULL_BASIS_POINTS: u64 = 10_000;

/// The share of committee seats voting yes for an action to be constitutional.
pub const CONSTITUTIONAL_THRESHOLD: Threshold = Threshold(6_700);

/// Stake based voting power of one voter class, in lovelace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StakePower {
    pub total: u64,
    pub yes: u64,
    pub no: u64,
    pub abstain: u64,
    pub always_abstain: u64,
    pub always_no_confidence: u64,

    /// Stake of inactive voters, only tracked for DReps.
    pub inactive: u64,
}

impl StakePower {
    /// Stake which neither voted nor is delegated to a predefined voter nor is inactive.
    pub fn not_voted(&self) -> u64 {
        self.total
            .saturating_sub(self.yes)
            .saturating_sub(self.no)
            .saturating_sub(self.abstain)
            .saturating_sub(self.always_abstain)
            .saturating_sub(self.always_no_confidence)
            .saturating_sub(self.inactive)
    }
}

/// Committee votes, counted in seats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitteeVotes {
    pub yes: u32,
    pub no: u32,
    pub abstain: u32,
}

impl CommitteeVotes {
    pub fn cast(&self) -> u32 {
        self.yes + self.no + self.abstain
    }
}

/// The voting-power fields stored with a proposal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VotingPowerFields {
    pub drep: StakePower,
    pub spo: StakePower,
    pub cc: CommitteeVotes,
}

/// Voting summary of a proposal. Totals and inactive power are not part of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VotingSummary {
    pub drep: StakePower,
    pub spo: StakePower,
    pub cc: CommitteeVotes,
}

impl VotingSummary {
    /// Whether the cast votes of this summary match the given stored fields.
    pub fn matches(&self, fields: &VotingPowerFields) -> bool {
        let cast = |power: &StakePower| (power.yes, power.no, power.abstain);

        cast(&self.drep) == cast(&fields.drep)
            && cast(&self.spo) == cast(&fields.spo)
            && self.cc == fields.cc
    }
}

/// Ratification threshold in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Threshold(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub cc: Option<Threshold>,
    pub drep: Option<Threshold>,
    pub spo: Option<Threshold>,
}

/// Yes and no sides over a denominator, in lovelace or seats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub yes: u64,
    pub no: u64,
    pub denominator: u64,
}

impl Tally {
    pub fn yes_pct(&self) -> f64 {
        pct(self.yes, self.denominator)
    }

    pub fn no_pct(&self) -> f64 {
        pct(self.no, self.denominator)
    }

    /// Whether the yes side reaches the given threshold. An empty denominator only meets a zero
    /// threshold.
    pub fn meets(&self, threshold: Threshold) -> bool {
        if self.denominator == 0 {
            return threshold.0 == 0;
        }

        self.yes as u128 * FULL_BASIS_POINTS as u128
            >= threshold.0 as u128 * self.denominator as u128
    }
}

fn pct(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// DRep tally: inactive stake and abstentions are excluded; always-no-confidence and not voted
/// stake count as no.
pub fn drep_tally(power: &StakePower) -> Tally {
    let not_voted = power.not_voted();
    let no = power.no + power.always_no_confidence + not_voted;

    Tally {
        yes: power.yes,
        no,
        denominator: power.yes + no,
    }
}

/// SPO tally: like the DRep tally, with not voted stake only counting as no under
/// [SpoFormula::IncludeNotVoted].
pub fn spo_tally(power: &StakePower, formula: SpoFormula) -> Tally {
    let not_voted = match formula {
        SpoFormula::ExcludeNotVoted => 0,
        SpoFormula::IncludeNotVoted => power.not_voted(),
    };
    let no = power.no + power.always_no_confidence + not_voted;

    Tally {
        yes: power.yes,
        no,
        denominator: power.yes + no,
    }
}

/// Committee tally over the fixed number of seats: seats not voting count as no, abstaining
/// seats are excluded.
pub fn committee_tally(votes: &CommitteeVotes, seats: u32) -> Tally {
    let not_voted = seats.saturating_sub(votes.cast());
    let yes = votes.yes as u64;
    let no = (votes.no + not_voted) as u64;

    Tally {
        yes,
        no,
        denominator: (seats.saturating_sub(votes.abstain) as u64).max(yes + no),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitteeVerdict {
    Constitutional,
    Unconstitutional,

    /// No committee member has voted yet.
    Pending,
}

impl CommitteeVerdict {
    pub fn new(votes: &CommitteeVotes, tally: &Tally) -> Self {
        if votes.cast() == 0 {
            CommitteeVerdict::Pending
        } else if tally.meets(CONSTITUTIONAL_THRESHOLD) {
            CommitteeVerdict::Constitutional
        } else {
            CommitteeVerdict::Unconstitutional
        }
    }
}

/// How not voted SPO stake is accounted for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpoFormula {
    #[default]
    ExcludeNotVoted,
    IncludeNotVoted,
}

/// From `effective_epoch` on `formula` applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FormulaTransition {
    pub effective_epoch: u32,
    pub formula: SpoFormula,
}

/// The SPO formula effective at the given epoch; before the first transition not voted stake is
/// excluded.
pub fn spo_formula_at(transitions: &[FormulaTransition], epoch: u32) -> SpoFormula {
    transitions
        .iter()
        .filter(|transition| transition.effective_epoch <= epoch)
        .max_by_key(|transition| transition.effective_epoch)
        .map(|transition| transition.formula)
        .unwrap_or_default()
}

/// The outcome of evaluating the voting power of a proposal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VotingPowerResult {
    pub reference_epoch: u32,
    pub fields: VotingPowerFields,
    pub drep: Tally,
    pub spo: Tally,
    pub cc: Tally,
    pub cc_verdict: CommitteeVerdict,

    /// Whether every threshold applicable to the action type is met.
    pub passes: bool,
}

impl VotingPowerResult {
    pub fn evaluate(
        action_type: GovActionType,
        fields: VotingPowerFields,
        reference_epoch: u32,
        cc_seats: u32,
        spo_formula: SpoFormula,
    ) -> Self {
        let drep = drep_tally(&fields.drep);
        let spo = spo_tally(&fields.spo, spo_formula);
        let cc = committee_tally(&fields.cc, cc_seats);
        let cc_verdict = CommitteeVerdict::new(&fields.cc, &cc);

        let thresholds = action_type.thresholds();
        let passes = [(thresholds.cc, cc), (thresholds.drep, drep), (thresholds.spo, spo)]
            .into_iter()
            .all(|(threshold, tally)| threshold.is_none_or(|threshold| tally.meets(threshold)));

        Self {
            reference_epoch,
            fields,
            drep,
            spo,
            cc,
            cc_verdict,
            passes,
        }
    }
}
