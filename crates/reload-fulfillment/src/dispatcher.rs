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

//! # Task Dispatcher
//!
//! Expands a [`BulkRequest`] into one [`ReloadTask`] per unit of quantity,
//! each with a freshly generated external id, and feeds them to the worker
//! pool's bounded queue.
//!
//! When the job is cancelled the dispatcher stops feeding the queue. Every
//! task it did not hand over is reported to the collector as a cancelled
//! create failure, so no task disappears.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::executor::{FailureReason, FailureStage, TaskFailure, TaskOutcome};
use crate::models::{BulkRequest, ExternalId, OrderId, ReloadTask};

/// Expands `request` into its tasks. Produces exactly
/// [`BulkRequest::total_quantity`] tasks.
pub fn expand(order_id: &OrderId, request: &BulkRequest) -> Vec<ReloadTask> {
    let mut tasks = Vec::with_capacity(request.total_quantity() as usize);
    for (line_item_index, item) in request.line_items.iter().enumerate() {
        for _ in 0..item.quantity {
            tasks.push(ReloadTask {
                order_id: order_id.clone(),
                line_item_index,
                product_id: item.product_id,
                recipient: request.recipient.clone(),
                external_id: ExternalId::generate(),
            });
        }
    }
    tasks
}

/// Counts reported by [`dispatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Tasks handed to the worker queue.
    pub dispatched: usize,
    /// Tasks reported as cancelled without being queued.
    pub cancelled: usize,
}

/// Feeds `tasks` into `queue` until done or cancelled.
///
/// The queue sender is dropped on return, which lets the workers exit once
/// they drain it.
pub async fn dispatch(
    tasks: Vec<ReloadTask>,
    queue: mpsc::Sender<ReloadTask>,
    outcomes: mpsc::UnboundedSender<TaskOutcome>,
    cancel: &CancellationToken,
) -> DispatchSummary {
    let mut summary = DispatchSummary::default();
    let mut pending = tasks.into_iter();

    for task in pending.by_ref() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = queue.reserve() => permit.ok(),
        };
        match permit {
            Some(permit) => {
                permit.send(task);
                summary.dispatched += 1;
            }
            None => {
                report_cancelled(task, &outcomes);
                summary.cancelled += 1;
                break;
            }
        }
    }

    for task in pending {
        report_cancelled(task, &outcomes);
        summary.cancelled += 1;
    }

    if summary.cancelled > 0 {
        info!(
            dispatched = summary.dispatched,
            cancelled = summary.cancelled,
            "dispatch stopped early"
        );
    } else {
        debug!(dispatched = summary.dispatched, "all tasks dispatched");
    }
    summary
}

fn report_cancelled(task: ReloadTask, outcomes: &mpsc::UnboundedSender<TaskOutcome>) {
    let failure = TaskFailure::new(task, FailureStage::Create, FailureReason::Cancelled, 0);
    // The collector outlives the dispatcher; a send error means the job is
    // already being torn down.
    let _ = outcomes.send(TaskOutcome::Failed(failure));
}
