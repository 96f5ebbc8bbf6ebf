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

//! Terminal outcomes of reload tasks.

use std::fmt;

use crate::models::{ExternalId, PinItem, ReloadTask};

/// Pipeline step a failed task last attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    /// The gateway never accepted the create call.
    Create,
    /// The create was accepted but no settled transaction was retrieved.
    Fetch,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Create => "create",
            FailureStage::Fetch => "fetch",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the last attempt of a task failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Still throttled after the last backoff.
    Throttled,
    /// Any other gateway error.
    Gateway(String),
    /// The store write for this step failed.
    Store(String),
    /// The transaction was missing or had no pin yet.
    NotSettled,
    /// The job was cancelled before the task resolved.
    Cancelled,
}

impl FailureReason {
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::Throttled => "throttled",
            FailureReason::Gateway(_) => "gateway",
            FailureReason::Store(_) => "store",
            FailureReason::NotSettled => "not_settled",
            FailureReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Throttled => f.write_str("throttled by gateway"),
            FailureReason::Gateway(msg) => write!(f, "gateway error: {}", msg),
            FailureReason::Store(msg) => write!(f, "store error: {}", msg),
            FailureReason::NotSettled => f.write_str("transaction not settled"),
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A task that did not produce a pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: ReloadTask,
    pub stage: FailureStage,
    pub reason: FailureReason,
    /// Attempts made at `stage`, across both passes.
    pub attempts: u32,
}

impl TaskFailure {
    pub fn new(task: ReloadTask, stage: FailureStage, reason: FailureReason, attempts: u32) -> Self {
        Self {
            task,
            stage,
            reason,
            attempts,
        }
    }

    pub fn external_id(&self) -> &ExternalId {
        &self.task.external_id
    }
}

/// What a worker reports for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Pin(PinItem),
    Failed(TaskFailure),
}

impl TaskOutcome {
    pub fn external_id(&self) -> &ExternalId {
        match self {
            TaskOutcome::Pin(item) => &item.external_id,
            TaskOutcome::Failed(failure) => failure.external_id(),
        }
    }
}
