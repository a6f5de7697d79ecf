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

//! Bounded, rate-limit-aware retry of fallible async operations.

use log::warn;
use serde::Deserialize;
use std::{fmt::Display, future::Future, time::Duration};
use tokio::time::sleep;

/// Retry policy: exponential backoff (factor 2) starting at `base_delay`, capped at `max_delay`.
/// An operation is attempted at most `max_retries + 1` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,

    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,

    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

/// How a failed attempt must be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Worth another attempt, optionally after a server-mandated delay.
    Transient { retry_after: Option<Duration> },

    /// Never retried, returned to the caller as is.
    Permanent,
}

/// Errors which can be classified for retrying.
pub trait Retryable
where
    Self: Sized,
{
    fn disposition(&self) -> Disposition;

    /// Wrap the last error once all attempts are used up.
    fn exhausted(self, attempts: u32) -> Self;
}

impl RetryPolicy {
    /// Run the given operation until it succeeds, fails permanently or the retries are exhausted.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let Disposition::Transient { retry_after } = error.disposition() else {
                return Err(error);
            };

            if attempts > self.max_retries {
                return Err(error.exhausted(attempts));
            }

            let delay = retry_after.unwrap_or_else(|| self.backoff(attempts));
            warn!(error:%, attempts, delay:?; "transient error, retrying");
            sleep(delay).await;
        }
    }

    /// Delay before the next attempt after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Parse a `Retry-After` header value given as delta-seconds. HTTP-dates are not supported and
/// yield `None`, like any other invalid value.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use crate::retry::{Disposition, RetryPolicy, Retryable, parse_retry_after};
    use assert_matches::assert_matches;
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering},
        },
        time::Duration,
    };
    use thiserror::Error;
    use tokio::time::Instant;

    #[derive(Debug, Error)]
    enum TestError {
        #[error("rate limited")]
        RateLimited(Option<Duration>),

        #[error("connection reset")]
        Reset,

        #[error("status {0}")]
        Status(u16),

        #[error("giving up after {attempts} attempts")]
        Exhausted {
            attempts: u32,
            #[source]
            source: Box<TestError>,
        },
    }

    impl Retryable for TestError {
        fn disposition(&self) -> Disposition {
            match self {
                TestError::RateLimited(retry_after) => Disposition::Transient {
                    retry_after: *retry_after,
                },
                TestError::Reset => Disposition::Transient { retry_after: None },
                _ => Disposition::Permanent,
            }
        }

        fn exhausted(self, attempts: u32) -> Self {
            TestError::Exhausted {
                attempts,
                source: Box::new(self),
            }
        }
    }

    const POLICY: RetryPolicy = RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(250),
    };

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_overrides_backoff() {
        let attempts = Arc::new(AtomicU32::new(0));
        let started_at = Instant::now();

        let result = POLICY
            .run(|| {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(TestError::RateLimited(Some(Duration::from_secs(2))))
                    } else {
                        Ok(Instant::now())
                    }
                }
            })
            .await;

        let succeeded_at = result.expect("second attempt succeeds");
        assert!(succeeded_at - started_at >= Duration::from_millis(2_000));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_not_retried() {
        let attempts = AtomicU32::new(0);

        let result = POLICY
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(TestError::Status(404)) }
            })
            .await;

        assert_matches!(result, Err(TestError::Status(404)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted() {
        let attempts = AtomicU32::new(0);
        let started_at = Instant::now();

        let result = POLICY
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(TestError::Reset) }
            })
            .await;

        assert_matches!(result, Err(TestError::Exhausted { attempts: 4, .. }));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        // 100ms + 200ms + 250ms (capped).
        assert!(Instant::now() - started_at >= Duration::from_millis(550));

        let error = result.unwrap_err();
        assert_eq!(error.to_string(), "giving up after 4 attempts");
    }

    #[test]
    fn test_backoff() {
        assert_eq!(POLICY.backoff(1), Duration::from_millis(100));
        assert_eq!(POLICY.backoff(2), Duration::from_millis(200));
        assert_eq!(POLICY.backoff(3), Duration::from_millis(250));
        assert_eq!(POLICY.backoff(64), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 120 "), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("-1"), None);
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
