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

//! File representation of the `reloadctl` configuration.
//!
//! ```toml
//! [database]
//! url = "/var/lib/reloadctl/reload.db"
//!
//! [gateway]
//! base_url = "https://preprod-dvs-api.dtone.com/v1"
//! username = "${DTONE_USERNAME}"
//! password = "${DTONE_PASSWORD}"
//!
//! [fulfillment]
//! workers = 5
//! create_rate_limit = 5
//! create_rate_interval_ms = 1000
//!
//! [fulfillment.create_retry]
//! max_attempts = 5
//! initial_delay_ms = 500
//! backoff = "exponential"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every `[fulfillment]` value is optional and falls back to the library
//! default.

use reload_fulfillment::{BackoffStrategy, DtOneConfig, FulfillmentConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadctlConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub fulfillment: FulfillmentSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "reload.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl GatewayConfig {
    pub fn to_dtone_config(&self) -> Result<DtOneConfig, url::ParseError> {
        let base_url = Url::parse(&self.base_url)?;
        Ok(
            DtOneConfig::new(base_url, self.username.clone(), self.password.clone())
                .with_request_timeout(Duration::from_secs(self.request_timeout_secs)),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff: Option<BackoffKind>,
    /// Growth factor for exponential backoff.
    pub base: Option<f64>,
}

impl RetrySection {
    /// Overrides the fields that are set on top of `policy`.
    pub fn apply(&self, mut policy: RetryPolicy) -> RetryPolicy {
        if let Some(max_attempts) = self.max_attempts {
            policy.max_attempts = max_attempts.max(1);
        }
        if let Some(ms) = self.initial_delay_ms {
            policy.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_delay_ms {
            policy.max_delay = Duration::from_millis(ms);
        }
        match (self.backoff, self.base) {
            (Some(BackoffKind::Fixed), _) => policy.backoff_strategy = BackoffStrategy::Fixed,
            (Some(BackoffKind::Exponential), base) => {
                policy.backoff_strategy = BackoffStrategy::Exponential {
                    base: base.unwrap_or(2.0),
                    multiplier: 1.0,
                }
            }
            (None, Some(base)) => {
                if let BackoffStrategy::Exponential { multiplier, .. } = policy.backoff_strategy {
                    policy.backoff_strategy = BackoffStrategy::Exponential { base, multiplier };
                }
            }
            (None, None) => {}
        }
        policy
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FulfillmentSection {
    pub workers: Option<usize>,
    pub task_queue_capacity: Option<usize>,
    pub create_rate_limit: Option<u32>,
    pub create_rate_interval_ms: Option<u64>,
    #[serde(default)]
    pub create_retry: RetrySection,
    pub settle_delay_ms: Option<u64>,
    #[serde(default)]
    pub fetch_retry: RetrySection,
    pub retry_pass_delay_ms: Option<u64>,
    pub max_tasks_per_request: Option<u64>,
    pub job_deadline_secs: Option<u64>,
}

impl FulfillmentSection {
    pub fn to_config(&self) -> FulfillmentConfig {
        let defaults = FulfillmentConfig::default();
        let mut builder = FulfillmentConfig::builder()
            .create_retry(self.create_retry.apply(defaults.create_retry().clone()))
            .fetch_retry(self.fetch_retry.apply(defaults.fetch_retry().clone()))
            .job_deadline(self.job_deadline_secs.map(Duration::from_secs));

        if let Some(workers) = self.workers {
            builder = builder.workers(workers);
        }
        if let Some(capacity) = self.task_queue_capacity {
            builder = builder.task_queue_capacity(capacity);
        }
        if self.create_rate_limit.is_some() || self.create_rate_interval_ms.is_some() {
            builder = builder.create_rate_limit(
                self.create_rate_limit
                    .unwrap_or(defaults.create_rate_limit()),
                self.create_rate_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.create_rate_interval()),
            );
        }
        if let Some(ms) = self.settle_delay_ms {
            builder = builder.settle_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.retry_pass_delay_ms {
            builder = builder.retry_pass_delay(Duration::from_millis(ms));
        }
        if let Some(max) = self.max_tasks_per_request {
            builder = builder.max_tasks_per_request(max);
        }
        builder.build()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
