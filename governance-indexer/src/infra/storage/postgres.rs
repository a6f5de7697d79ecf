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
    Anchor, CommitteeVotes, OnchainVote, Proposal, ProposalEpochs, ProposalMetadata, ProposalRef,
    ProposalStatus, StakePower, Voter, VoterClass, VoterKey, VoterMetadata, VotingPowerFields,
    storage::{self, Upserted},
};
use fastrace::trace;
use indexer_common::infra::pool::postgres::PostgresPool;
use indoc::indoc;
use sqlx::{Row, postgres::PgRow};
use std::{
    collections::{HashMap, HashSet},
    error::Error as StdError,
    str::FromStr,
};

const PROPOSAL_COLUMNS: &str = indoc! {"
    proposal_id,
    tx_hash,
    cert_index,
    action_type,
    status,
    submitted_epoch,
    ratified_epoch,
    enacted_epoch,
    expired_epoch,
    dropped_epoch,
    expiration_epoch,
    title,
    description,
    motivation,
    rationale,
    metadata_url,
    drep_total_power,
    drep_yes_power,
    drep_no_power,
    drep_abstain_power,
    drep_always_abstain_power,
    drep_always_no_confidence_power,
    drep_inactive_power,
    spo_total_power,
    spo_yes_power,
    spo_no_power,
    spo_abstain_power,
    spo_always_abstain_power,
    spo_always_no_confidence_power,
    cc_yes_votes,
    cc_no_votes,
    cc_abstain_votes
"};

const VOTE_COLUMNS: &str = indoc! {"
    tx_hash,
    proposal_id,
    voter_class,
    voter_id,
    choice,
    voting_power,
    anchor_url,
    anchor_hash,
    epoch,
    block_time
"};

/// Postgres based storage implementation.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PostgresPool,
}

impl PostgresStorage {
    pub fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

impl storage::Storage for PostgresStorage {
    #[trace]
    async fn get_proposal(&self, proposal_id: &str) -> Result<Option<Proposal>, sqlx::Error> {
        let query = format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE proposal_id = $1");

        sqlx::query(&query)
            .bind(proposal_id)
            .fetch_optional(&*self.pool)
            .await?
            .map(|row| proposal_from_row(&row))
            .transpose()
    }

    #[trace]
    async fn find_proposal(&self, identifier: &str) -> Result<Option<Proposal>, sqlx::Error> {
        let (tx_hash, cert_index) = match ProposalRef::parse(identifier) {
            Some(ProposalRef::Id(proposal_id)) => return self.get_proposal(proposal_id).await,

            Some(ProposalRef::Tx {
                tx_hash,
                cert_index,
            }) => (tx_hash, cert_index),

            None => return Ok(None),
        };

        let query = format!(
            "SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE tx_hash = $1 AND cert_index = $2"
        );

        sqlx::query(&query)
            .bind(tx_hash)
            .bind(cert_index as i32)
            .fetch_optional(&*self.pool)
            .await?
            .map(|row| proposal_from_row(&row))
            .transpose()
    }

    #[trace]
    async fn get_proposal_statuses(
        &self,
    ) -> Result<HashMap<String, ProposalStatus>, sqlx::Error> {
        let query = indoc! {"
            SELECT proposal_id, status
            FROM proposals
        "};

        sqlx::query_as::<_, (String, String)>(query)
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(|(proposal_id, status)| {
                Ok::<_, sqlx::Error>((proposal_id, parse(&status)?))
            })
            .collect()
    }

    async fn get_proposal_count(&self) -> Result<u64, sqlx::Error> {
        let query = indoc! {"
            SELECT count(*)
            FROM proposals
        "};

        let (count,) = sqlx::query_as::<_, (i64,)>(query)
            .fetch_one(&*self.pool)
            .await?;

        Ok(count as u64)
    }

    #[trace]
    async fn save_proposal(&self, proposal: &Proposal) -> Result<Upserted, sqlx::Error> {
        let query = indoc! {"
            INSERT INTO proposals (
                proposal_id,
                tx_hash,
                cert_index,
                action_type,
                status,
                submitted_epoch,
                ratified_epoch,
                enacted_epoch,
                expired_epoch,
                dropped_epoch,
                expiration_epoch,
                title,
                description,
                motivation,
                rationale,
                metadata_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (proposal_id) DO UPDATE SET
                action_type = EXCLUDED.action_type,
                status = EXCLUDED.status,
                ratified_epoch = EXCLUDED.ratified_epoch,
                enacted_epoch = EXCLUDED.enacted_epoch,
                expired_epoch = EXCLUDED.expired_epoch,
                dropped_epoch = EXCLUDED.dropped_epoch,
                expiration_epoch = EXCLUDED.expiration_epoch,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                motivation = EXCLUDED.motivation,
                rationale = EXCLUDED.rationale,
                metadata_url = EXCLUDED.metadata_url,
                updated_at = NOW()
            RETURNING (xmax = 0) AS created
        "};

        let Proposal {
            proposal_id,
            tx_hash,
            cert_index,
            action_type,
            status,
            epochs,
            metadata,
            ..
        } = proposal;

        let (created,) = sqlx::query_as::<_, (bool,)>(query)
            .bind(proposal_id)
            .bind(tx_hash)
            .bind(*cert_index as i32)
            .bind(action_type.as_str())
            .bind(status.as_str())
            .bind(epochs.submitted as i32)
            .bind(epochs.ratified.map(|epoch| epoch as i32))
            .bind(epochs.enacted.map(|epoch| epoch as i32))
            .bind(epochs.expired.map(|epoch| epoch as i32))
            .bind(epochs.dropped.map(|epoch| epoch as i32))
            .bind(epochs.expiration.map(|epoch| epoch as i32))
            .bind(&metadata.title)
            .bind(&metadata.description)
            .bind(&metadata.motivation)
            .bind(&metadata.rationale)
            .bind(&metadata.url)
            .fetch_one(&*self.pool)
            .await?;

        Ok(Upserted::from_created(created))
    }

    #[trace]
    async fn save_voting_power(
        &self,
        proposal_id: &str,
        voting_power: &VotingPowerFields,
    ) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            UPDATE proposals SET
                drep_total_power = $2,
                drep_yes_power = $3,
                drep_no_power = $4,
                drep_abstain_power = $5,
                drep_always_abstain_power = $6,
                drep_always_no_confidence_power = $7,
                drep_inactive_power = $8,
                spo_total_power = $9,
                spo_yes_power = $10,
                spo_no_power = $11,
                spo_abstain_power = $12,
                spo_always_abstain_power = $13,
                spo_always_no_confidence_power = $14,
                cc_yes_votes = $15,
                cc_no_votes = $16,
                cc_abstain_votes = $17,
                updated_at = NOW()
            WHERE proposal_id = $1
        "};

        let VotingPowerFields { drep, spo, cc } = voting_power;

        sqlx::query(query)
            .bind(proposal_id)
            .bind(drep.total as i64)
            .bind(drep.yes as i64)
            .bind(drep.no as i64)
            .bind(drep.abstain as i64)
            .bind(drep.always_abstain as i64)
            .bind(drep.always_no_confidence as i64)
            .bind(drep.inactive as i64)
            .bind(spo.total as i64)
            .bind(spo.yes as i64)
            .bind(spo.no as i64)
            .bind(spo.abstain as i64)
            .bind(spo.always_abstain as i64)
            .bind(spo.always_no_confidence as i64)
            .bind(cc.yes as i32)
            .bind(cc.no as i32)
            .bind(cc.abstain as i32)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    #[trace]
    async fn save_vote(&self, vote: &OnchainVote) -> Result<Upserted, sqlx::Error> {
        let query = indoc! {"
            INSERT INTO onchain_votes (
                tx_hash,
                proposal_id,
                voter_class,
                voter_id,
                choice,
                voting_power,
                anchor_url,
                anchor_hash,
                epoch,
                block_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (tx_hash, proposal_id, voter_class, voter_id) DO UPDATE SET
                choice = EXCLUDED.choice,
                voting_power = EXCLUDED.voting_power,
                anchor_url = EXCLUDED.anchor_url,
                anchor_hash = EXCLUDED.anchor_hash,
                epoch = EXCLUDED.epoch,
                block_time = EXCLUDED.block_time
            RETURNING (xmax = 0) AS created
        "};

        let (created,) = sqlx::query_as::<_, (bool,)>(query)
            .bind(&vote.tx_hash)
            .bind(&vote.proposal_id)
            .bind(vote.voter_class.as_str())
            .bind(&vote.voter_id)
            .bind(vote.choice.as_str())
            .bind(vote.voting_power as i64)
            .bind(vote.anchor.as_ref().map(|anchor| &anchor.url))
            .bind(vote.anchor.as_ref().and_then(|anchor| anchor.hash.as_ref()))
            .bind(vote.epoch as i32)
            .bind(vote.block_time)
            .fetch_one(&*self.pool)
            .await?;

        Ok(Upserted::from_created(created))
    }

    async fn get_vote_count(&self, proposal_id: &str) -> Result<u64, sqlx::Error> {
        let query = indoc! {"
            SELECT count(*)
            FROM onchain_votes
            WHERE proposal_id = $1
        "};

        let (count,) = sqlx::query_as::<_, (i64,)>(query)
            .bind(proposal_id)
            .fetch_one(&*self.pool)
            .await?;

        Ok(count as u64)
    }

    #[trace]
    async fn get_votes(&self, proposal_id: &str) -> Result<Vec<OnchainVote>, sqlx::Error> {
        let query = format!(
            "SELECT {VOTE_COLUMNS} FROM onchain_votes WHERE proposal_id = $1 \
             ORDER BY block_time, tx_hash"
        );

        sqlx::query(&query)
            .bind(proposal_id)
            .fetch_all(&*self.pool)
            .await?
            .iter()
            .map(vote_from_row)
            .collect()
    }

    #[trace]
    async fn get_voter_ids_voted_between(
        &self,
        class: VoterClass,
        from_epoch: u32,
        to_epoch: u32,
    ) -> Result<HashSet<String>, sqlx::Error> {
        let query = indoc! {"
            SELECT DISTINCT voter_id
            FROM onchain_votes
            WHERE voter_class = $1
            AND epoch BETWEEN $2 AND $3
        "};

        let voter_ids = sqlx::query_as::<_, (String,)>(query)
            .bind(class.as_str())
            .bind(from_epoch as i32)
            .bind(to_epoch as i32)
            .fetch_all(&*self.pool)
            .await?
            .into_iter()
            .map(|(voter_id,)| voter_id)
            .collect();

        Ok(voter_ids)
    }

    #[trace]
    async fn get_voter(&self, key: &VoterKey) -> Result<Option<Voter>, sqlx::Error> {
        let query = indoc! {"
            SELECT
                voter_class,
                voter_id,
                name,
                ticker,
                payment_address,
                icon_url,
                voting_power,
                refreshed_at
            FROM voters
            WHERE voter_class = $1
            AND voter_id = $2
        "};

        sqlx::query(query)
            .bind(key.class.as_str())
            .bind(&key.id)
            .fetch_optional(&*self.pool)
            .await?
            .map(|row| voter_from_row(&row))
            .transpose()
    }

    #[trace]
    async fn create_voter(&self, voter: &Voter) -> Result<bool, sqlx::Error> {
        let query = indoc! {"
            INSERT INTO voters (
                voter_class,
                voter_id,
                name,
                ticker,
                payment_address,
                icon_url,
                voting_power,
                refreshed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
        "};

        let result = bind_voter(sqlx::query(query), voter)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    #[trace]
    async fn save_voter(&self, voter: &Voter) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            INSERT INTO voters (
                voter_class,
                voter_id,
                name,
                ticker,
                payment_address,
                icon_url,
                voting_power,
                refreshed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (voter_class, voter_id) DO UPDATE SET
                name = EXCLUDED.name,
                ticker = EXCLUDED.ticker,
                payment_address = EXCLUDED.payment_address,
                icon_url = EXCLUDED.icon_url,
                voting_power = EXCLUDED.voting_power,
                refreshed_at = EXCLUDED.refreshed_at
        "};

        bind_voter(sqlx::query(query), voter)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    #[trace]
    async fn get_voter_keys_after(
        &self,
        after: Option<&VoterKey>,
        limit: u32,
    ) -> Result<Vec<VoterKey>, sqlx::Error> {
        let rows = match after {
            Some(after) => {
                let query = indoc! {"
                    SELECT voter_class, voter_id
                    FROM voters
                    WHERE (voter_class, voter_id) > ($1, $2)
                    ORDER BY voter_class, voter_id
                    LIMIT $3
                "};

                sqlx::query_as::<_, (String, String)>(query)
                    .bind(after.class.as_str())
                    .bind(&after.id)
                    .bind(limit as i64)
                    .fetch_all(&*self.pool)
                    .await?
            }

            None => {
                let query = indoc! {"
                    SELECT voter_class, voter_id
                    FROM voters
                    ORDER BY voter_class, voter_id
                    LIMIT $1
                "};

                sqlx::query_as::<_, (String, String)>(query)
                    .bind(limit as i64)
                    .fetch_all(&*self.pool)
                    .await?
            }
        };

        rows.into_iter()
            .map(|(class, id)| Ok::<_, sqlx::Error>(VoterKey::new(parse(&class)?, id)))
            .collect()
    }

    async fn get_voter_refresh_cursor(&self) -> Result<Option<VoterKey>, sqlx::Error> {
        let query = indoc! {"
            SELECT voter_class, voter_id
            FROM voter_refresh_state
            WHERE id = TRUE
        "};

        let row = sqlx::query_as::<_, (Option<String>, Option<String>)>(query)
            .fetch_optional(&*self.pool)
            .await?;

        match row {
            Some((Some(class), Some(id))) => Ok(Some(VoterKey::new(parse(&class)?, id))),
            _ => Ok(None),
        }
    }

    async fn set_voter_refresh_cursor(&self, key: Option<&VoterKey>) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            INSERT INTO voter_refresh_state (id, voter_class, voter_id, updated_at)
            VALUES (TRUE, $1, $2, NOW())
            ON CONFLICT (id) DO UPDATE SET
                voter_class = EXCLUDED.voter_class,
                voter_id = EXCLUDED.voter_id,
                updated_at = NOW()
        "};

        sqlx::query(query)
            .bind(key.map(|key| key.class.as_str()))
            .bind(key.map(|key| &key.id))
            .execute(&*self.pool)
            .await?;

        Ok(())
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_voter<'q>(query: PgQuery<'q>, voter: &'q Voter) -> PgQuery<'q> {
    let Voter {
        key,
        metadata,
        voting_power,
        refreshed_at,
    } = voter;

    query
        .bind(key.class.as_str())
        .bind(&key.id)
        .bind(&metadata.name)
        .bind(&metadata.ticker)
        .bind(&metadata.payment_address)
        .bind(&metadata.icon_url)
        .bind(*voting_power as i64)
        .bind(*refreshed_at)
}

fn parse<T>(value: &str) -> Result<T, sqlx::Error>
where
    T: FromStr,
    T::Err: StdError + Send + Sync + 'static,
{
    value
        .parse()
        .map_err(|error| sqlx::Error::Decode(Box::new(error)))
}

fn epoch(row: &PgRow, column: &str) -> Result<Option<u32>, sqlx::Error> {
    let epoch = row.try_get::<Option<i32>, _>(column)?;
    Ok(epoch.map(|epoch| epoch as u32))
}

fn lovelace(row: &PgRow, column: &str) -> Result<u64, sqlx::Error> {
    Ok(row.try_get::<i64, _>(column)? as u64)
}

fn seats(row: &PgRow, column: &str) -> Result<u32, sqlx::Error> {
    Ok(row.try_get::<i32, _>(column)? as u32)
}

fn proposal_from_row(row: &PgRow) -> Result<Proposal, sqlx::Error> {
    let epochs = ProposalEpochs {
        submitted: row.try_get::<i32, _>("submitted_epoch")? as u32,
        ratified: epoch(row, "ratified_epoch")?,
        enacted: epoch(row, "enacted_epoch")?,
        expired: epoch(row, "expired_epoch")?,
        dropped: epoch(row, "dropped_epoch")?,
        expiration: epoch(row, "expiration_epoch")?,
    };

    let metadata = ProposalMetadata {
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        motivation: row.try_get("motivation")?,
        rationale: row.try_get("rationale")?,
        url: row.try_get("metadata_url")?,
    };

    let voting_power = VotingPowerFields {
        drep: StakePower {
            total: lovelace(row, "drep_total_power")?,
            yes: lovelace(row, "drep_yes_power")?,
            no: lovelace(row, "drep_no_power")?,
            abstain: lovelace(row, "drep_abstain_power")?,
            always_abstain: lovelace(row, "drep_always_abstain_power")?,
            always_no_confidence: lovelace(row, "drep_always_no_confidence_power")?,
            inactive: lovelace(row, "drep_inactive_power")?,
        },
        spo: StakePower {
            total: lovelace(row, "spo_total_power")?,
            yes: lovelace(row, "spo_yes_power")?,
            no: lovelace(row, "spo_no_power")?,
            abstain: lovelace(row, "spo_abstain_power")?,
            always_abstain: lovelace(row, "spo_always_abstain_power")?,
            always_no_confidence: lovelace(row, "spo_always_no_confidence_power")?,
            inactive: 0,
        },
        cc: CommitteeVotes {
            yes: seats(row, "cc_yes_votes")?,
            no: seats(row, "cc_no_votes")?,
            abstain: seats(row, "cc_abstain_votes")?,
        },
    };

    Ok(Proposal {
        proposal_id: row.try_get("proposal_id")?,
        tx_hash: row.try_get("tx_hash")?,
        cert_index: row.try_get::<i32, _>("cert_index")? as u32,
        action_type: parse(row.try_get("action_type")?)?,
        status: parse(row.try_get("status")?)?,
        epochs,
        metadata,
        voting_power,
    })
}

fn vote_from_row(row: &PgRow) -> Result<OnchainVote, sqlx::Error> {
    let anchor = row
        .try_get::<Option<String>, _>("anchor_url")?
        .map(|url| {
            Ok::<_, sqlx::Error>(Anchor {
                url,
                hash: row.try_get("anchor_hash")?,
            })
        })
        .transpose()?;

    Ok(OnchainVote {
        tx_hash: row.try_get("tx_hash")?,
        proposal_id: row.try_get("proposal_id")?,
        voter_class: parse(row.try_get("voter_class")?)?,
        voter_id: row.try_get("voter_id")?,
        choice: parse(row.try_get("choice")?)?,
        voting_power: lovelace(row, "voting_power")?,
        anchor,
        epoch: row.try_get::<i32, _>("epoch")? as u32,
        block_time: row.try_get("block_time")?,
    })
}

fn voter_from_row(row: &PgRow) -> Result<Voter, sqlx::Error> {
    let key = VoterKey::new(
        parse::<VoterClass>(row.try_get("voter_class")?)?,
        row.try_get::<String, _>("voter_id")?,
    );

    let metadata = VoterMetadata {
        name: row.try_get("name")?,
        ticker: row.try_get("ticker")?,
        payment_address: row.try_get("payment_address")?,
        icon_url: row.try_get("icon_url")?,
    };

    Ok(Voter {
        key,
        metadata,
        voting_power: lovelace(row, "voting_power")?,
        refreshed_at: row.try_get("refreshed_at")?,
    })
}
