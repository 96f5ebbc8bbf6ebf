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

//! # Result Collector
//!
//! Single consumer of the outcome channel. Sorts outcomes into three
//! buckets: pins, create failures and fetch failures. Each external id lands
//! in at most one bucket; a second outcome for an id already collected is
//! discarded and counted.

use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::executor::{FailureStage, TaskFailure, TaskOutcome};
use crate::models::{ExternalId, PinItem};

#[derive(Debug, Default)]
pub struct ResultCollector {
    pins: Vec<PinItem>,
    create_failures: Vec<TaskFailure>,
    fetch_failures: Vec<TaskFailure>,
    seen: HashSet<ExternalId>,
    duplicates: usize,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes `outcomes` until every sender is dropped.
    pub async fn drain(mut self, mut outcomes: mpsc::UnboundedReceiver<TaskOutcome>) -> Self {
        while let Some(outcome) = outcomes.recv().await {
            self.record(outcome);
        }
        debug!(
            pins = self.pins.len(),
            create_failures = self.create_failures.len(),
            fetch_failures = self.fetch_failures.len(),
            "outcome channel drained"
        );
        self
    }

    /// Files one outcome. Returns `false` if the task was already collected.
    pub fn record(&mut self, outcome: TaskOutcome) -> bool {
        if !self.seen.insert(outcome.external_id().clone()) {
            warn!(external_id = %outcome.external_id(), "duplicate outcome discarded");
            self.duplicates += 1;
            return false;
        }
        match outcome {
            TaskOutcome::Pin(item) => self.pins.push(item),
            TaskOutcome::Failed(failure) => match failure.stage {
                FailureStage::Create => self.create_failures.push(failure),
                FailureStage::Fetch => self.fetch_failures.push(failure),
            },
        }
        true
    }

    /// Removes both failure buckets so the tasks can be retried and then
    /// recorded again. Returns `(create_failures, fetch_failures)`.
    pub fn take_failures(&mut self) -> (Vec<TaskFailure>, Vec<TaskFailure>) {
        let create = std::mem::take(&mut self.create_failures);
        let fetch = std::mem::take(&mut self.fetch_failures);
        for failure in create.iter().chain(fetch.iter()) {
            self.seen.remove(failure.external_id());
        }
        (create, fetch)
    }

    pub fn pins(&self) -> &[PinItem] {
        &self.pins
    }

    pub fn create_failures(&self) -> &[TaskFailure] {
        &self.create_failures
    }

    pub fn fetch_failures(&self) -> &[TaskFailure] {
        &self.fetch_failures
    }

    /// Number of distinct tasks collected.
    pub fn total(&self) -> usize {
        self.pins.len() + self.create_failures.len() + self.fetch_failures.len()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Splits into `(pins, failures)`, create failures first.
    pub fn into_parts(self) -> (Vec<PinItem>, Vec<TaskFailure>) {
        let mut failures = self.create_failures;
        failures.extend(self.fetch_failures);
        (self.pins, failures)
    }
}
