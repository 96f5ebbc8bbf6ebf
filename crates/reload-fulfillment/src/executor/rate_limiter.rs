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

//! Shared throttle for gateway create calls.
//!
//! A single [`CreateRateLimiter`] is cloned into every worker of every job.
//! It wraps a direct (unkeyed) `governor` limiter whose quota emits one permit every
//! `interval / limit`, with no burst allowance, so that over any window of
//! length `interval` at most `limit` create calls are issued. Fetch calls do
//! not go through the limiter.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::Cancelled;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter shared by every worker of every job started from one
/// [`BulkFulfillment`](crate::runner::BulkFulfillment).
#[derive(Clone)]
pub struct CreateRateLimiter {
    limiter: Arc<DirectLimiter>,
    limit: u32,
    interval: Duration,
}

impl CreateRateLimiter {
    /// Allows `limit` create calls per `interval`. A zero limit is treated
    /// as one.
    pub fn new(limit: u32, interval: Duration) -> Self {
        let limit = limit.max(1);
        let period = interval / limit;
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(NonZeroU32::MIN);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            limit,
            interval,
        }
    }

    /// Waits for a permit, or returns [`Cancelled`] as soon as the token
    /// fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            _ = self.limiter.until_ready() => {
                trace!("create permit acquired");
                Ok(())
            }
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl std::fmt::Debug for CreateRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateRateLimiter")
            .field("limit", &self.limit)
            .field("interval", &self.interval)
            .finish()
    }
}
