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

use crate::{
    application::Indexer,
    domain::{
        GovActionType, Proposal, ProposalMetadata, ProposalStatus,
        anchor::{AnchorResolver, parse_proposal_metadata},
        clock::Clock,
        ledger::{ExternalProposal, LedgerIndex},
        storage::{Storage, Upserted},
    },
};
use anyhow::Context;
use fastrace::trace;
use log::{debug, warn};

impl<L, S, A, C> Indexer<L, S, A, C>
where
    L: LedgerIndex,
    S: Storage,
    A: AnchorResolver,
    C: Clock,
{
    /// Upsert the given external proposal with its status derived at the given epoch. Stored
    /// voting power is kept.
    #[trace]
    pub(crate) async fn reconcile(
        &self,
        external: ExternalProposal,
        current_epoch: u32,
    ) -> anyhow::Result<(Proposal, Upserted)> {
        let action_type = external
            .proposal_type
            .parse::<GovActionType>()
            .with_context(|| format!("parse type of proposal {}", external.proposal_id))?;
        let status = ProposalStatus::derive(&external.epochs, action_type, current_epoch);

        let existing = self
            .storage
            .get_proposal(&external.proposal_id)
            .await
            .context("get proposal")?;
        let metadata = self.resolve_metadata(&external, existing.as_ref()).await;

        let proposal = Proposal {
            proposal_id: external.proposal_id,
            tx_hash: external.tx_hash,
            cert_index: external.cert_index,
            action_type,
            status,
            epochs: external.epochs,
            metadata,
            voting_power: existing
                .map(|proposal| proposal.voting_power)
                .unwrap_or_default(),
        };

        let upserted = self
            .storage
            .save_proposal(&proposal)
            .await
            .context("save proposal")?;

        Ok((proposal, upserted))
    }

    /// Inline metadata takes precedence over already stored metadata which takes precedence over
    /// fetching the anchor. Anchors which cannot be fetched or parsed yield untitled metadata.
    async fn resolve_metadata(
        &self,
        external: &ExternalProposal,
        existing: Option<&Proposal>,
    ) -> ProposalMetadata {
        let url = external.meta_url.clone();

        if let Some(metadata) = external
            .meta_json
            .as_ref()
            .and_then(|document| parse_proposal_metadata(document, url.clone()))
        {
            return metadata;
        }

        if let Some(proposal) = existing.filter(|proposal| !proposal.metadata.is_untitled()) {
            return proposal.metadata.clone();
        }

        let Some(anchor_url) = url.as_deref() else {
            return ProposalMetadata::untitled(None);
        };

        match self.anchors.fetch(anchor_url).await {
            Ok(document) => match parse_proposal_metadata(&document, url.clone()) {
                Some(metadata) => return metadata,
                None => debug!(url = anchor_url; "anchored document without body"),
            },

            Err(error) => warn!(
                proposal_id:% = external.proposal_id,
                url = anchor_url,
                error:%;
                "cannot fetch proposal metadata"
            ),
        }

        ProposalMetadata::untitled(url)
    }
}
