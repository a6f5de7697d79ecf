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

//! Off-chain governance metadata: CIP-108 proposal documents and CIP-119 DRep documents.

use crate::domain::{DEFAULT_TITLE, ProposalMetadata, VoterMetadata};
use serde_json::Value;
use std::error::Error as StdError;

/// Resolves anchor URLs to JSON documents.
#[trait_variant::make(Send)]
pub trait AnchorResolver
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Fetch the JSON document referenced by the given URL, which may use the `ipfs` scheme.
    async fn fetch(&self, url: &str) -> Result<Value, Self::Error>;
}

/// Parse proposal metadata from a CIP-108 document; `None` if the document has no body.
pub fn parse_proposal_metadata(document: &Value, url: Option<String>) -> Option<ProposalMetadata> {
    let body = document.get("body")?.as_object()?;

    let title = body
        .get("title")
        .and_then(text)
        .unwrap_or_else(|| DEFAULT_TITLE.to_owned());

    Some(ProposalMetadata {
        title,
        description: body.get("abstract").and_then(text),
        motivation: body.get("motivation").and_then(text),
        rationale: body.get("rationale").and_then(text),
        url,
    })
}

/// Parse DRep display metadata from a CIP-119 document.
pub fn parse_drep_metadata(document: &Value) -> VoterMetadata {
    let Some(body) = document.get("body") else {
        return VoterMetadata::default();
    };

    VoterMetadata {
        name: body.get("givenName").and_then(text),
        ticker: None,
        payment_address: body.get("paymentAddress").and_then(text),
        icon_url: body
            .get("image")
            .and_then(|image| image.get("contentUrl"))
            .and_then(text),
    }
}

/// JSON-LD values are either plain strings or `{"@value": "..."}` objects.
fn text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.as_str(),
        Value::Object(object) => object.get("@value")?.as_str()?,
        _ => return None,
    };

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_owned())
}
