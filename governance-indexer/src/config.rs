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

use crate::{application, infra};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run_migrations: bool,

    #[serde(rename = "application")]
    pub application_config: application::Config,

    #[serde(rename = "infra")]
    pub infra_config: infra::Config,

    #[serde(rename = "telemetry")]
    pub telemetry_config: indexer_common::telemetry::Config,
}

#[cfg(test)]
mod tests {
    use crate::{config::Config, infra::storage};
    use assert_matches::assert_matches;
    use figment::{
        Figment,
        providers::{Format, Yaml},
    };
    use std::time::Duration;

    #[test]
    fn test_config_file() {
        let config = Figment::new()
            .merge(Yaml::string(include_str!("../config.yaml")))
            .extract::<Config>();

        assert_matches!(config, Ok(config) if {
            let application = &config.application_config;
            let infra = &config.infra_config;

            application.aggregator_config.cc_seats == 7
                && application.trigger_config.detail_cooldown == Duration::from_secs(30)
                && infra.retry_config.max_retries == 5
                && infra.blockfrost_config.is_none()
                && matches!(infra.storage_config, storage::Config::Postgres(_))
        });
    }
}
