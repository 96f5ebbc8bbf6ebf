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

//! Configuration for the bulk fulfillment pipeline.
//!
//! One [`FulfillmentConfig`] is built at startup and shared by `Arc` with the
//! dispatcher, the worker pool, the retry pass and the runner.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Tuning parameters of a [`BulkFulfillment`](crate::BulkFulfillment).
///
/// # Construction
///
/// ```rust
/// use reload_fulfillment::FulfillmentConfig;
/// use std::time::Duration;
///
/// let config = FulfillmentConfig::builder()
///     .workers(8)
///     .create_rate_limit(10, Duration::from_secs(1))
///     .settle_delay(Duration::from_secs(1))
///     .build();
///
/// assert_eq!(config.workers(), 8);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct FulfillmentConfig {
    workers: usize,
    task_queue_capacity: usize,
    create_rate_limit: u32,
    create_rate_interval: Duration,
    create_retry: RetryPolicy,
    settle_delay: Duration,
    fetch_retry: RetryPolicy,
    retry_pass_delay: Duration,
    max_tasks_per_request: u64,
    job_deadline: Option<Duration>,
}

impl FulfillmentConfig {
    pub fn builder() -> FulfillmentConfigBuilder {
        FulfillmentConfigBuilder::default()
    }

    /// Number of concurrent workers per job.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Capacity of the queue between the dispatcher and the workers.
    pub fn task_queue_capacity(&self) -> usize {
        self.task_queue_capacity
    }

    /// Create calls allowed per [`create_rate_interval`](Self::create_rate_interval).
    pub fn create_rate_limit(&self) -> u32 {
        self.create_rate_limit
    }

    pub fn create_rate_interval(&self) -> Duration {
        self.create_rate_interval
    }

    /// Backoff applied to throttled create calls.
    pub fn create_retry(&self) -> &RetryPolicy {
        &self.create_retry
    }

    /// Wait between a successful create and the first fetch.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Retry applied to fetches of unsettled transactions.
    pub fn fetch_retry(&self) -> &RetryPolicy {
        &self.fetch_retry
    }

    /// Wait before the retry pass fetches tasks it re-created.
    pub fn retry_pass_delay(&self) -> Duration {
        self.retry_pass_delay
    }

    pub fn max_tasks_per_request(&self) -> u64 {
        self.max_tasks_per_request
    }

    /// Cancels a job that is still running after this long.
    pub fn job_deadline(&self) -> Option<Duration> {
        self.job_deadline
    }
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        FulfillmentConfigBuilder::default().build()
    }
}

/// Builder for [`FulfillmentConfig`]. Zero counts are raised to one.
#[derive(Debug, Clone)]
pub struct FulfillmentConfigBuilder {
    config: FulfillmentConfig,
}

impl Default for FulfillmentConfigBuilder {
    fn default() -> Self {
        Self {
            config: FulfillmentConfig {
                workers: 5,
                task_queue_capacity: 64,
                create_rate_limit: 5,
                create_rate_interval: Duration::from_secs(1),
                create_retry: RetryPolicy::create_default(),
                settle_delay: Duration::from_secs(2),
                fetch_retry: RetryPolicy::fetch_default(),
                retry_pass_delay: Duration::from_secs(3),
                max_tasks_per_request: 1000,
                job_deadline: None,
            },
        }
    }
}

impl FulfillmentConfigBuilder {
    pub fn workers(mut self, value: usize) -> Self {
        self.config.workers = value.max(1);
        self
    }

    pub fn task_queue_capacity(mut self, value: usize) -> Self {
        self.config.task_queue_capacity = value.max(1);
        self
    }

    /// Allows `limit` create calls per `interval` across all workers.
    pub fn create_rate_limit(mut self, limit: u32, interval: Duration) -> Self {
        self.config.create_rate_limit = limit.max(1);
        self.config.create_rate_interval = interval;
        self
    }

    pub fn create_retry(mut self, value: RetryPolicy) -> Self {
        self.config.create_retry = value;
        self
    }

    pub fn settle_delay(mut self, value: Duration) -> Self {
        self.config.settle_delay = value;
        self
    }

    pub fn fetch_retry(mut self, value: RetryPolicy) -> Self {
        self.config.fetch_retry = value;
        self
    }

    pub fn retry_pass_delay(mut self, value: Duration) -> Self {
        self.config.retry_pass_delay = value;
        self
    }

    pub fn max_tasks_per_request(mut self, value: u64) -> Self {
        self.config.max_tasks_per_request = value.max(1);
        self
    }

    pub fn job_deadline(mut self, value: Option<Duration>) -> Self {
        self.config.job_deadline = value;
        self
    }

    pub fn build(self) -> FulfillmentConfig {
        self.config
    }
}
