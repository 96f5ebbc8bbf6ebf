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

//! # Retry Pass
//!
//! One more attempt for every task the primary wave could not resolve,
//! in two waves:
//!
//! - **Wave A** re-creates create failures with a single rate-limited call,
//!   no backoff loop. Tasks the gateway now accepts join the fetch
//!   candidates.
//! - **Wave B** waits the retry pass delay once, then fetches every candidate
//!   a single time and persists the pin of those that settled.
//!
//! Whatever is still unresolved afterwards is returned as a failure and is
//! dropped for good by the runner.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use crate::executor::{FailureReason, FailureStage, ReloadExecutor, TaskFailure, TaskOutcome};

/// Runs the retry pass on a job's executor.
pub struct RetryPass {
    executor: Arc<ReloadExecutor>,
    concurrency: usize,
}

/// Counts reported by a finished retry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPassSummary {
    pub recreated: usize,
    pub recovered: usize,
    pub still_failed: usize,
}

impl RetryPass {
    pub fn new(executor: Arc<ReloadExecutor>) -> Self {
        let concurrency = executor.config().workers();
        Self {
            executor,
            concurrency,
        }
    }

    /// Retries the given failures once. Returns exactly one outcome per input
    /// failure.
    pub async fn run(
        &self,
        create_failures: Vec<TaskFailure>,
        fetch_failures: Vec<TaskFailure>,
    ) -> (Vec<TaskOutcome>, RetryPassSummary) {
        let mut summary = RetryPassSummary::default();
        if create_failures.is_empty() && fetch_failures.is_empty() {
            return (Vec::new(), summary);
        }
        info!(
            create_failures = create_failures.len(),
            fetch_failures = fetch_failures.len(),
            "starting retry pass"
        );

        let mut outcomes = Vec::new();
        let mut candidates = fetch_failures;

        let recreated: Vec<Result<TaskFailure, TaskFailure>> = stream::iter(create_failures)
            .map(|failure| recreate(self.executor.clone(), failure))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        for result in recreated {
            match result {
                Ok(candidate) => {
                    summary.recreated += 1;
                    candidates.push(candidate);
                }
                Err(failure) => outcomes.push(TaskOutcome::Failed(failure)),
            }
        }

        if !candidates.is_empty() {
            let delay = self.executor.config().retry_pass_delay();
            if self.executor.sleep_or_cancel(delay).await.is_err() {
                debug!(candidates = candidates.len(), "retry pass cancelled before fetch wave");
                outcomes.extend(candidates.into_iter().map(|mut failure| {
                    failure.reason = FailureReason::Cancelled;
                    TaskOutcome::Failed(failure)
                }));
            } else {
                let fetched: Vec<TaskOutcome> = stream::iter(candidates)
                    .map(|failure| refetch(self.executor.clone(), failure))
                    .buffer_unordered(self.concurrency)
                    .collect()
                    .await;
                summary.recovered = fetched
                    .iter()
                    .filter(|outcome| matches!(outcome, TaskOutcome::Pin(_)))
                    .count();
                outcomes.extend(fetched);
            }
        }

        summary.still_failed = outcomes.len() - summary.recovered;
        info!(
            recreated = summary.recreated,
            recovered = summary.recovered,
            still_failed = summary.still_failed,
            "retry pass finished"
        );
        (outcomes, summary)
    }
}

/// Wave A for one task. `Ok` carries the task on as a fetch candidate.
async fn recreate(
    executor: Arc<ReloadExecutor>,
    failure: TaskFailure,
) -> Result<TaskFailure, TaskFailure> {
    let TaskFailure { task, attempts, .. } = failure;

    let mut record = match executor.load_or_register(&task).await {
        Ok(record) => record,
        Err(reason) => return Err(TaskFailure::new(task, FailureStage::Create, reason, attempts)),
    };

    match executor.create_once(&task).await {
        Ok(()) => {
            executor.mark_submitted(&mut record, attempts + 1).await;
            Ok(TaskFailure::new(task, FailureStage::Fetch, FailureReason::NotSettled, 0))
        }
        Err(FailureReason::Cancelled) => Err(TaskFailure::new(
            task,
            FailureStage::Create,
            FailureReason::Cancelled,
            attempts,
        )),
        Err(reason) => Err(TaskFailure::new(
            task,
            FailureStage::Create,
            reason,
            attempts + 1,
        )),
    }
}

/// Wave B for one task.
async fn refetch(executor: Arc<ReloadExecutor>, failure: TaskFailure) -> TaskOutcome {
    let TaskFailure { task, attempts, .. } = failure;
    let attempts = attempts + 1;

    let (transaction, pin) = match executor.fetch_once(&task).await {
        Ok(settled) => settled,
        Err(reason) => {
            return TaskOutcome::Failed(TaskFailure::new(
                task,
                FailureStage::Fetch,
                reason,
                attempts,
            ))
        }
    };

    let record = match executor.load_or_register(&task).await {
        Ok(record) => record,
        Err(reason) => {
            return TaskOutcome::Failed(TaskFailure::new(
                task,
                FailureStage::Fetch,
                reason,
                attempts,
            ))
        }
    };

    match executor.persist_pin(&task, record, &transaction, pin).await {
        Ok(item) => TaskOutcome::Pin(item),
        Err(reason) => {
            TaskOutcome::Failed(TaskFailure::new(task, FailureStage::Fetch, reason, attempts))
        }
    }
}
