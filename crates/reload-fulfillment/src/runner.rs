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

//! # Bulk Fulfillment Runner
//!
//! Orchestrates one bulk order end to end:
//!
//! ```text
//! submit ─▶ order row (Processing) ─▶ spawn job ─▶ JobHandle
//!
//! job:  dispatcher ─▶ task queue ─▶ worker pool ─▶ outcome channel ─▶ collector
//!       retry pass (skipped once cancelled) ─▶ collector
//!       permanent failures logged ─▶ dump ─▶ finalize ─▶ conservation check
//! ```
//!
//! Task-level errors never fail the job; they are accounted for in the
//! [`FulfillmentReport`]. Only store failures while creating the order,
//! dumping or finalizing, and a broken conservation count, end a job with a
//! [`PipelineError`].

use metrics::counter;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

use crate::collector::ResultCollector;
use crate::config::FulfillmentConfig;
use crate::dal::ReloadStore;
use crate::dispatcher;
use crate::error::PipelineError;
use crate::executor::{
    CreateRateLimiter, FailureStage, ReloadExecutor, TaskFailure, WorkerPool,
};
use crate::gateway::TransactionGateway;
use crate::models::{BulkRequest, OrderId, OrderRecord, OrderStatus, PinItem};
use crate::persistence::{FinalizedOrder, PinPersistence};
use crate::retry_pass::RetryPass;

/// Aggregate result of a finished job.
#[derive(Debug, Clone)]
pub struct FulfillmentReport {
    pub order_id: OrderId,
    pub total_tasks: usize,
    /// Pins as finalized on the order.
    pub pins: Vec<PinItem>,
    /// Tasks dropped after both passes.
    pub permanent_failures: Vec<TaskFailure>,
    pub succeeded: usize,
    pub failed_create: usize,
    pub failed_fetch: usize,
    /// Whether the job's cancellation token fired.
    pub cancelled: bool,
    pub status: OrderStatus,
}

/// Bucket sizes of the result collector once both passes are done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectedCounts {
    pub pins: usize,
    pub create_failures: usize,
    pub fetch_failures: usize,
}

impl CollectedCounts {
    fn of(collector: &ResultCollector) -> Self {
        Self {
            pins: collector.pins().len(),
            create_failures: collector.create_failures().len(),
            fetch_failures: collector.fetch_failures().len(),
        }
    }

    fn failures(&self) -> usize {
        self.create_failures + self.fetch_failures
    }
}

impl FulfillmentReport {
    /// Checks that every task is accounted for exactly once, that the
    /// reported failures match the collector's buckets and that the
    /// finalized pin count matches the collected one.
    pub fn verify_conservation(&self, collected: CollectedCounts) -> Result<(), PipelineError> {
        let balanced = collected.pins + collected.failures() == self.total_tasks
            && self.permanent_failures.len() == collected.failures()
            && self.failed_create == collected.create_failures
            && self.failed_fetch == collected.fetch_failures
            && self.pins.len() == collected.pins;
        if balanced {
            Ok(())
        } else {
            Err(PipelineError::ConservationViolated {
                order_id: self.order_id.clone(),
                total_tasks: self.total_tasks,
                pins: collected.pins,
                permanent_failures: self.permanent_failures.len(),
                finalized: self.pins.len(),
            })
        }
    }
}

/// A running job.
pub struct JobHandle {
    order_id: OrderId,
    cancel: CancellationToken,
    handle: JoinHandle<Result<FulfillmentReport, PipelineError>>,
}

impl JobHandle {
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Stops dispatching and lets in-flight tasks wind down. The job still
    /// dumps and finalizes the pins it obtained.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the job to finish.
    pub async fn wait(self) -> Result<FulfillmentReport, PipelineError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::JobAborted {
                order_id: self.order_id,
                message: e.to_string(),
            }),
        }
    }
}

/// Entry point of the bulk fulfillment pipeline.
///
/// Cheap to clone; clones share the configuration, the gateway, the store
/// and the create rate limiter.
#[derive(Clone)]
pub struct BulkFulfillment {
    config: Arc<FulfillmentConfig>,
    gateway: Arc<dyn TransactionGateway>,
    store: Arc<dyn ReloadStore>,
    limiter: CreateRateLimiter,
}

impl BulkFulfillment {
    pub fn new(
        config: FulfillmentConfig,
        gateway: Arc<dyn TransactionGateway>,
        store: Arc<dyn ReloadStore>,
    ) -> Self {
        let limiter =
            CreateRateLimiter::new(config.create_rate_limit(), config.create_rate_interval());
        Self {
            config: Arc::new(config),
            gateway,
            store,
            limiter,
        }
    }

    pub fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ReloadStore> {
        &self.store
    }

    /// Accepts a bulk request and starts fulfilling it in the background.
    ///
    /// Returns as soon as the order row exists; the handle carries the new
    /// order id.
    pub async fn submit(&self, request: BulkRequest) -> Result<JobHandle, PipelineError> {
        request.validate(self.config.max_tasks_per_request())?;

        let order_id = OrderId::generate();
        let order = OrderRecord::new(
            order_id.clone(),
            request.recipient.clone(),
            request.total_quantity(),
        );
        self.store
            .create_order(&order)
            .await
            .map_err(|source| PipelineError::OrderCreation {
                order_id: order_id.clone(),
                source,
            })?;
        info!(
            order_id = %order_id,
            line_items = request.line_items.len(),
            tasks = order.requested_quantity,
            "bulk order accepted"
        );

        let cancel = CancellationToken::new();
        let deadline = self.config.job_deadline().map(|deadline| {
            let cancel = cancel.clone();
            let order_id = order_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!(order_id = %order_id, "job deadline elapsed, cancelling");
                cancel.cancel();
            })
        });

        let runner = self.clone();
        let job_order_id = order_id.clone();
        let job_cancel = cancel.clone();
        let span = tracing::info_span!("bulk_fulfillment", order_id = %order_id);
        let handle = tokio::spawn(
            async move {
                let result = runner.run(job_order_id, request, job_cancel).await;
                if let Some(deadline) = deadline {
                    deadline.abort();
                }
                result
            }
            .instrument(span),
        );

        Ok(JobHandle {
            order_id,
            cancel,
            handle,
        })
    }

    /// Runs the job body for an order whose row already exists.
    pub async fn run(
        &self,
        order_id: OrderId,
        request: BulkRequest,
        cancel: CancellationToken,
    ) -> Result<FulfillmentReport, PipelineError> {
        let tasks = dispatcher::expand(&order_id, &request);
        let total_tasks = tasks.len();

        let executor = Arc::new(ReloadExecutor::new(
            self.gateway.clone(),
            self.store.clone(),
            self.limiter.clone(),
            self.config.clone(),
            cancel.clone(),
        ));

        let (queue_tx, queue_rx) = mpsc::channel(self.config.task_queue_capacity());
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let collector = tokio::spawn(ResultCollector::new().drain(outcome_rx));
        let pool = WorkerPool::new(executor.clone(), self.config.workers())
            .spawn(queue_rx, outcome_tx.clone());

        let dispatched = dispatcher::dispatch(tasks, queue_tx, outcome_tx, &cancel).await;
        let processed = pool.join().await;

        let mut collector = collector.await.map_err(|e| PipelineError::JobAborted {
            order_id: order_id.clone(),
            message: format!("result collector failed: {}", e),
        })?;
        info!(
            order_id = %order_id,
            dispatched = dispatched.dispatched,
            processed,
            collected = collector.total(),
            duplicates = collector.duplicates(),
            pins = collector.pins().len(),
            create_failures = collector.create_failures().len(),
            fetch_failures = collector.fetch_failures().len(),
            "primary wave completed"
        );

        if cancel.is_cancelled() {
            warn!(order_id = %order_id, "job cancelled, skipping retry pass");
        } else {
            let (create_failures, fetch_failures) = collector.take_failures();
            let (outcomes, _) = RetryPass::new(executor.clone())
                .run(create_failures, fetch_failures)
                .await;
            for outcome in outcomes {
                collector.record(outcome);
            }
        }

        let collected = CollectedCounts::of(&collector);
        let (pins, permanent_failures) = collector.into_parts();
        for failure in &permanent_failures {
            log_permanent_failure(&order_id, failure);
            executor.mark_failed(failure).await;
        }

        let persistence = PinPersistence::new(self.store.clone());
        persistence.dump(&order_id, &pins).await?;
        let FinalizedOrder {
            pins: finalized,
            status,
            ..
        } = persistence.finalize(&order_id).await?;

        let report = FulfillmentReport {
            order_id: order_id.clone(),
            total_tasks,
            succeeded: finalized.len(),
            failed_create: count_stage(&permanent_failures, FailureStage::Create),
            failed_fetch: count_stage(&permanent_failures, FailureStage::Fetch),
            pins: finalized,
            permanent_failures,
            cancelled: cancel.is_cancelled(),
            status,
        };
        report.verify_conservation(collected)?;

        info!(
            order_id = %order_id,
            total = report.total_tasks,
            succeeded = report.succeeded,
            failed_create = report.failed_create,
            failed_fetch = report.failed_fetch,
            cancelled = report.cancelled,
            status = %report.status,
            "bulk order finished"
        );
        Ok(report)
    }

    /// Runs the finalize phase alone from the newest dump of an order.
    pub async fn recover(&self, order_id: &OrderId) -> Result<FinalizedOrder, PipelineError> {
        info!(order_id = %order_id, "recovering order from pin dump");
        PinPersistence::new(self.store.clone())
            .finalize(order_id)
            .await
    }
}

fn count_stage(failures: &[TaskFailure], stage: FailureStage) -> usize {
    failures.iter().filter(|f| f.stage == stage).count()
}

fn log_permanent_failure(order_id: &OrderId, failure: &TaskFailure) {
    counter!("reload_permanent_failures_total", "stage" => failure.stage.as_str()).increment(1);
    error!(
        event_type = "reload.permanent_failure",
        order_id = %order_id,
        external_id = %failure.task.external_id,
        product_id = failure.task.product_id,
        stage = %failure.stage,
        reason = failure.reason.kind(),
        attempts = failure.attempts,
        detail = %failure.reason,
        "reload task permanently failed"
    );
}
