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

pub mod anchor;
pub mod http;
pub mod koios;
pub mod storage;

use indexer_common::retry::RetryPolicy;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "retry", default)]
    pub retry_config: RetryPolicy,

    #[serde(rename = "koios")]
    pub koios_config: koios::Config,

    #[serde(rename = "blockfrost", default)]
    pub blockfrost_config: Option<koios::BlockfrostConfig>,

    #[serde(rename = "anchor")]
    pub anchor_config: anchor::Config,

    #[serde(rename = "storage")]
    pub storage_config: storage::Config,
}
