/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! # Retry Policies
//!
//! Bounded retry policies used by the workers. Every retry loop in the
//! pipeline is driven by a [`RetryPolicy`], so every loop has a maximum
//! attempt count and a worker can never spin forever.
//!
//! Two policies are in play:
//!
//! - the create policy, applied only to explicit throttling signals, uses
//!   [`BackoffStrategy::Exponential`] so each wait doubles;
//! - the fetch policy, applied while a transaction has not settled yet, uses
//!   [`BackoffStrategy::Fixed`].
//!
//! ```rust
//! use reload_fulfillment::retry::{BackoffStrategy, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(4)
//!     .initial_delay(Duration::from_millis(100))
//!     .max_delay(Duration::from_secs(1))
//!     .backoff_strategy(BackoffStrategy::Exponential { base: 2.0, multiplier: 1.0 })
//!     .build();
//!
//! assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
//! assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
//! assert_eq!(policy.calculate_delay(3), Duration::from_millis(400));
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the wait between two attempts grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    Fixed,
    /// `initial_delay * multiplier * base^(attempt - 1)`.
    Exponential { base: f64, multiplier: f64 },
}

/// A bounded retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    pub backoff_strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::create_default()
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Policy applied to throttled create calls: exponential from 500ms,
    /// capped at 8s, five attempts.
    pub fn create_default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            backoff_strategy: BackoffStrategy::Exponential {
                base: 2.0,
                multiplier: 1.0,
            },
        }
    }

    /// Policy applied to fetches of unsettled transactions: 2s apart, three
    /// attempts.
    pub fn fetch_default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(2),
            backoff_strategy: BackoffStrategy::Fixed,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based) before
    /// the next one.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay = match &self.backoff_strategy {
            BackoffStrategy::Fixed => self.initial_delay,
            BackoffStrategy::Exponential { base, multiplier } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let factor = multiplier * base.powi(exponent);
                let secs = self.initial_delay.as_secs_f64() * factor;
                if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
                    self.max_delay
                } else {
                    Duration::from_secs_f64(secs.max(0.0))
                }
            }
        };
        delay.min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` attempts were made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Sum of every delay the policy would wait if all attempts fail.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts).map(|a| self.calculate_delay(a)).sum()
    }
}

/// Builder for [`RetryPolicy`], starting from [`RetryPolicy::create_default`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::create_default(),
        }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts.max(1);
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn backoff_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.policy.backoff_strategy = strategy;
        self
    }

    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
