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

//! # Reload Executor
//!
//! Runs the per-task sequence of the primary wave:
//!
//! 1. register a write-ahead [`TransactionRecord`] keyed by the external id,
//! 2. create the transaction, waiting on the shared rate limiter before every
//!    call and backing off exponentially while the gateway throttles,
//! 3. wait the settle delay,
//! 4. fetch the transaction until it carries a pin, a bounded number of times,
//! 5. persist the pin on the record and emit a [`PinItem`].
//!
//! Every step is keyed by the same external id, so re-running any prefix of
//! the sequence for a task is safe. The single-attempt building blocks are
//! also used by the retry pass.
//!
//! Each suspension point (limiter, gateway calls, backoff, settle delay,
//! fetch delay) observes the job's cancellation token. A cancelled task
//! resolves to a failure at the stage it had reached instead of entering
//! another retry.

use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::outcome::{FailureReason, FailureStage, TaskFailure, TaskOutcome};
use super::rate_limiter::CreateRateLimiter;
use super::Cancelled;
use crate::config::FulfillmentConfig;
use crate::dal::ReloadStore;
use crate::error::GatewayError;
use crate::gateway::{GatewayTransaction, TransactionGateway};
use crate::models::{Pin, PinItem, ReloadTask, TransactionRecord};

/// A transaction that has settled, with its pin.
pub(crate) type Settled = (GatewayTransaction, Pin);

/// Executes reload tasks against the gateway and the store.
pub struct ReloadExecutor {
    gateway: Arc<dyn TransactionGateway>,
    store: Arc<dyn ReloadStore>,
    limiter: CreateRateLimiter,
    config: Arc<FulfillmentConfig>,
    cancel: CancellationToken,
}

impl ReloadExecutor {
    pub fn new(
        gateway: Arc<dyn TransactionGateway>,
        store: Arc<dyn ReloadStore>,
        limiter: CreateRateLimiter,
        config: Arc<FulfillmentConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            store,
            limiter,
            config,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    /// Runs the full primary sequence for one task.
    pub async fn execute(&self, task: ReloadTask) -> TaskOutcome {
        if self.cancel.is_cancelled() {
            return TaskOutcome::Failed(TaskFailure::new(
                task,
                FailureStage::Create,
                FailureReason::Cancelled,
                0,
            ));
        }

        let mut record = match self.register(&task).await {
            Ok(record) => record,
            Err(reason) => {
                return TaskOutcome::Failed(TaskFailure::new(task, FailureStage::Create, reason, 0))
            }
        };

        let attempts = match self.create_with_backoff(&task).await {
            Ok(attempts) => attempts,
            Err((reason, attempts)) => {
                return TaskOutcome::Failed(TaskFailure::new(
                    task,
                    FailureStage::Create,
                    reason,
                    attempts,
                ))
            }
        };
        self.mark_submitted(&mut record, attempts).await;

        if self.sleep_or_cancel(self.config.settle_delay()).await.is_err() {
            return TaskOutcome::Failed(TaskFailure::new(
                task,
                FailureStage::Fetch,
                FailureReason::Cancelled,
                0,
            ));
        }

        let ((transaction, pin), fetch_attempts) = match self.fetch_with_retry(&task).await {
            Ok(fetched) => fetched,
            Err((reason, attempts)) => {
                return TaskOutcome::Failed(TaskFailure::new(
                    task,
                    FailureStage::Fetch,
                    reason,
                    attempts,
                ))
            }
        };

        match self.persist_pin(&task, record, &transaction, pin).await {
            Ok(item) => TaskOutcome::Pin(item),
            Err(reason) => TaskOutcome::Failed(TaskFailure::new(
                task,
                FailureStage::Fetch,
                reason,
                fetch_attempts,
            )),
        }
    }

    /// Writes a fresh write-ahead record for the task.
    pub(crate) async fn register(
        &self,
        task: &ReloadTask,
    ) -> Result<TransactionRecord, FailureReason> {
        let record = TransactionRecord::register(task);
        self.store.upsert_transaction(&record).await.map_err(|e| {
            warn!(external_id = %task.external_id, error = %e, "failed to register transaction");
            FailureReason::Store(e.to_string())
        })?;
        debug!(
            external_id = %task.external_id,
            product_id = task.product_id,
            "registered transaction"
        );
        Ok(record)
    }

    /// Returns the stored record of a task, registering it if none exists.
    pub(crate) async fn load_or_register(
        &self,
        task: &ReloadTask,
    ) -> Result<TransactionRecord, FailureReason> {
        match self.store.get_transaction(&task.external_id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => self.register(task).await,
            Err(e) => Err(FailureReason::Store(e.to_string())),
        }
    }

    /// Creates the transaction, retrying only while the gateway throttles.
    ///
    /// Returns the number of attempts on success, or the reason and the
    /// number of attempts made on failure.
    async fn create_with_backoff(&self, task: &ReloadTask) -> Result<u32, (FailureReason, u32)> {
        let policy = self.config.create_retry();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.create_once(task).await {
                Ok(()) => return Ok(attempt),
                Err(FailureReason::Throttled) => {
                    if !policy.should_retry(attempt) {
                        warn!(
                            external_id = %task.external_id,
                            attempts = attempt,
                            "create still throttled after last attempt"
                        );
                        return Err((FailureReason::Throttled, attempt));
                    }
                    let delay = policy.calculate_delay(attempt);
                    warn!(
                        external_id = %task.external_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "gateway throttled create, backing off"
                    );
                    if self.sleep_or_cancel(delay).await.is_err() {
                        return Err((FailureReason::Cancelled, attempt));
                    }
                }
                Err(FailureReason::Cancelled) => {
                    return Err((FailureReason::Cancelled, attempt - 1))
                }
                Err(reason) => return Err((reason, attempt)),
            }
        }
    }

    /// One rate-limited create call. A duplicate external id counts as an
    /// accepted create.
    pub(crate) async fn create_once(&self, task: &ReloadTask) -> Result<(), FailureReason> {
        self.limiter
            .acquire(&self.cancel)
            .await
            .map_err(|Cancelled| FailureReason::Cancelled)?;

        counter!("reload_creates_total").increment(1);
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(external_id = %task.external_id, "create interrupted by cancellation");
                return Err(FailureReason::Cancelled);
            }
            result = self
                .gateway
                .create_transaction(&task.external_id, task.product_id, &task.recipient) => result,
        };
        match result {
            Ok(()) => {
                debug!(external_id = %task.external_id, "gateway accepted create");
                Ok(())
            }
            Err(GatewayError::Duplicate { .. }) => {
                debug!(
                    external_id = %task.external_id,
                    "transaction already exists on gateway, treating create as accepted"
                );
                Ok(())
            }
            Err(GatewayError::Throttled) => {
                counter!("reload_throttled_total").increment(1);
                Err(FailureReason::Throttled)
            }
            Err(e) => Err(FailureReason::Gateway(e.to_string())),
        }
    }

    /// Records the accepted create. A failed write is logged only: the
    /// write-ahead record already exists and the confirmed write follows.
    pub(crate) async fn mark_submitted(&self, record: &mut TransactionRecord, attempts: u32) {
        record.mark_submitted(attempts);
        if let Err(e) = self.store.upsert_transaction(record).await {
            warn!(
                external_id = %record.external_id,
                error = %e,
                "failed to record submitted transaction"
            );
        }
    }

    /// Fetches until the transaction settles, with the fixed fetch delay
    /// between attempts. Returns the attempts made either way.
    async fn fetch_with_retry(
        &self,
        task: &ReloadTask,
    ) -> Result<(Settled, u32), (FailureReason, u32)> {
        let policy = self.config.fetch_retry();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let reason = match self.fetch_once(task).await {
                Ok(settled) => return Ok((settled, attempt)),
                Err(FailureReason::Cancelled) => {
                    return Err((FailureReason::Cancelled, attempt - 1))
                }
                Err(reason) => reason,
            };
            if !policy.should_retry(attempt) {
                debug!(
                    external_id = %task.external_id,
                    attempts = attempt,
                    %reason,
                    "fetch retries exhausted"
                );
                return Err((reason, attempt));
            }
            if self.sleep_or_cancel(policy.calculate_delay(attempt)).await.is_err() {
                return Err((FailureReason::Cancelled, attempt));
            }
        }
    }

    /// One fetch call. Succeeds only for a transaction carrying a pin.
    pub(crate) async fn fetch_once(&self, task: &ReloadTask) -> Result<Settled, FailureReason> {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(external_id = %task.external_id, "fetch interrupted by cancellation");
                return Err(FailureReason::Cancelled);
            }
            result = self.gateway.fetch_transaction(&task.external_id) => result,
        };
        match result {
            Ok(Some(transaction)) => match transaction.settled_pin().cloned() {
                Some(pin) => Ok((transaction, pin)),
                None => Err(FailureReason::NotSettled),
            },
            Ok(None) => Err(FailureReason::NotSettled),
            Err(e) => Err(FailureReason::Gateway(e.to_string())),
        }
    }

    /// Stores the pin on the record and builds the emitted item.
    pub(crate) async fn persist_pin(
        &self,
        task: &ReloadTask,
        mut record: TransactionRecord,
        transaction: &GatewayTransaction,
        pin: Pin,
    ) -> Result<PinItem, FailureReason> {
        record.mark_confirmed(transaction, pin.clone());
        self.store.upsert_transaction(&record).await.map_err(|e| {
            warn!(external_id = %task.external_id, error = %e, "failed to persist pin");
            FailureReason::Store(e.to_string())
        })?;

        counter!("reload_pins_total").increment(1);
        debug!(
            external_id = %task.external_id,
            product_id = task.product_id,
            settle_ms = record.settle_latency().map(|d| d.num_milliseconds()),
            "pin stored"
        );
        Ok(PinItem {
            external_id: task.external_id.clone(),
            product_id: task.product_id,
            pin,
        })
    }

    /// Marks the record of a permanently dropped task as failed. Best effort.
    pub(crate) async fn mark_failed(&self, failure: &TaskFailure) {
        let mut record = match self.store.get_transaction(failure.external_id()).await {
            Ok(Some(record)) => record,
            Ok(None) => TransactionRecord::register(&failure.task),
            Err(e) => {
                warn!(
                    external_id = %failure.external_id(),
                    error = %e,
                    "failed to load record of dropped task"
                );
                return;
            }
        };
        record.mark_failed(format!("{} failed: {}", failure.stage, failure.reason));
        if let Err(e) = self.store.upsert_transaction(&record).await {
            warn!(
                external_id = %failure.external_id(),
                error = %e,
                "failed to mark dropped task as failed"
            );
        }
    }

    pub(crate) async fn sleep_or_cancel(&self, duration: Duration) -> Result<(), Cancelled> {
        if duration.is_zero() {
            return if self.cancel.is_cancelled() {
                Err(Cancelled)
            } else {
                Ok(())
            };
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
