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

use fastrace::collector::{Config as CollectorConfig, ConsoleReporter};
use log::{LevelFilter, info, warn};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Deserialize;
use std::{env, net::IpAddr};

const RUST_LOG: &str = "RUST_LOG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "tracing")]
    pub tracing_config: TracingConfig,

    #[serde(rename = "metrics")]
    pub metrics_config: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TracingConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub address: IpAddr,
    pub port: u16,
}

/// Initialize logging with the level taken from the `RUST_LOG` environment variable, defaulting
/// to `info`. Records carry their key-values, e.g. `info!(proposal_id; "synced")`.
pub fn init_logging() {
    let level = env::var(RUST_LOG)
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    logforth::builder()
        .dispatch(|d| {
            d.filter(level)
                .append(logforth::append::Stdout::default())
        })
        .apply();
}

/// Initialize tracing, if enabled, reporting finished spans to the console.
pub fn init_tracing(config: TracingConfig) {
    if config.enabled {
        fastrace::set_reporter(ConsoleReporter, CollectorConfig::default());
        info!("tracing enabled");
    }
}

/// Initialize metrics, if enabled, exposing them in Prometheus format via HTTP.
pub fn init_metrics(config: MetricsConfig) {
    if config.enabled {
        let MetricsConfig { address, port, .. } = config;

        match PrometheusBuilder::new()
            .with_http_listener((address, port))
            .install()
        {
            Ok(()) => info!(address:%, port; "metrics enabled"),
            Err(error) => warn!(error:%; "cannot install Prometheus metrics exporter"),
        }
    }
}
