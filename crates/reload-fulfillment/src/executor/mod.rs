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

//! # Executor
//!
//! Everything that runs reload tasks: the shared create rate limiter, the
//! per-task [`ReloadExecutor`] and the [`WorkerPool`] around it.

pub mod outcome;
pub mod pool;
pub mod rate_limiter;
pub mod worker;

pub use outcome::{FailureReason, FailureStage, TaskFailure, TaskOutcome};
pub use pool::{RunningPool, WorkerPool};
pub use rate_limiter::CreateRateLimiter;
pub use worker::ReloadExecutor;

/// Returned by a wait that was interrupted by the job's cancellation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;
