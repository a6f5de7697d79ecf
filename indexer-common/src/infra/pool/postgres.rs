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

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, de};
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
};
use std::{ops::Deref, time::Duration};

/// Configuration for a Postgres connection pool.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: SecretString,

    #[serde(deserialize_with = "deserialize_sslmode")]
    pub sslmode: PgSslMode,

    pub max_connections: u32,

    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub max_lifetime: Duration,
}

/// New type for a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PostgresPool(PgPool);

impl PostgresPool {
    /// Try to create a new [PostgresPool] with the given [Config].
    pub async fn new(config: Config) -> Result<Self, sqlx::Error> {
        let Config {
            host,
            port,
            dbname,
            user,
            password,
            sslmode,
            max_connections,
            idle_timeout,
            max_lifetime,
        } = config;

        let connect_options = PgConnectOptions::new()
            .host(&host)
            .port(port)
            .database(&dbname)
            .username(&user)
            .password(password.expose_secret())
            .ssl_mode(sslmode);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(idle_timeout)
            .max_lifetime(max_lifetime)
            .connect_with(connect_options)
            .await?;

        Ok(Self(pool))
    }
}

impl Deref for PostgresPool {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn deserialize_sslmode<'de, D>(deserializer: D) -> Result<PgSslMode, D::Error>
where
    D: Deserializer<'de>,
{
    let sslmode = String::deserialize(deserializer)?;
    sslmode.parse().map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use crate::infra::pool::postgres::Config;
    use assert_matches::assert_matches;
    use figment::{
        Figment,
        providers::{Format, Yaml},
    };
    use secrecy::ExposeSecret;
    use sqlx::postgres::PgSslMode;
    use std::time::Duration;

    #[test]
    fn test_deserialize_config() {
        let config = Figment::new()
            .merge(Yaml::string(
                "
                host: localhost
                port: 5432
                dbname: governance
                user: indexer
                password: secret
                sslmode: require
                max_connections: 10
                idle_timeout: 1m
                max_lifetime: 5m
                ",
            ))
            .extract::<Config>();

        assert_matches!(config, Ok(config) if
            matches!(config.sslmode, PgSslMode::Require)
            && config.password.expose_secret() == "secret"
            && config.idle_timeout == Duration::from_secs(60)
        );
    }
}
