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

//! Fixed-size worker pool.
//!
//! `W` workers share one receiving end of the task queue and push every
//! outcome into the collector's channel. The channel is the only
//! synchronization point between workers and the collector.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::outcome::{FailureReason, FailureStage, TaskFailure, TaskOutcome};
use super::worker::ReloadExecutor;
use crate::models::ReloadTask;

/// A pool of workers running tasks on a shared [`ReloadExecutor`].
pub struct WorkerPool {
    executor: Arc<ReloadExecutor>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(executor: Arc<ReloadExecutor>, workers: usize) -> Self {
        Self {
            executor,
            workers: workers.max(1),
        }
    }

    /// Starts the workers. They stop once `tasks` is closed and drained.
    pub fn spawn(
        &self,
        tasks: mpsc::Receiver<ReloadTask>,
        outcomes: mpsc::UnboundedSender<TaskOutcome>,
    ) -> RunningPool {
        let tasks = Arc::new(Mutex::new(tasks));
        let handles = (0..self.workers)
            .map(|worker_id| {
                let executor = self.executor.clone();
                let tasks = tasks.clone();
                let outcomes = outcomes.clone();
                tokio::spawn(async move { worker_loop(worker_id, executor, tasks, outcomes).await })
            })
            .collect();
        RunningPool { handles }
    }
}

/// Handles of a started pool.
pub struct RunningPool {
    handles: Vec<JoinHandle<usize>>,
}

impl RunningPool {
    /// Waits for every worker to exit and returns the number of tasks they
    /// processed.
    pub async fn join(self) -> usize {
        let mut processed = 0;
        for handle in self.handles {
            match handle.await {
                Ok(count) => processed += count,
                Err(e) => error!(error = %e, "worker task terminated abnormally"),
            }
        }
        processed
    }
}

async fn worker_loop(
    worker_id: usize,
    executor: Arc<ReloadExecutor>,
    tasks: Arc<Mutex<mpsc::Receiver<ReloadTask>>>,
    outcomes: mpsc::UnboundedSender<TaskOutcome>,
) -> usize {
    let mut processed = 0;
    loop {
        // The lock is only held while waiting for the next task.
        let task = { tasks.lock().await.recv().await };
        let Some(task) = task else {
            break;
        };

        let fallback = task.clone();
        let outcome = AssertUnwindSafe(executor.execute(task))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!(
                    worker_id,
                    external_id = %fallback.external_id,
                    "task panicked in worker"
                );
                TaskOutcome::Failed(TaskFailure::new(
                    fallback,
                    FailureStage::Create,
                    FailureReason::Gateway("task panicked".to_string()),
                    0,
                ))
            });

        processed += 1;
        if outcomes.send(outcome).is_err() {
            error!(worker_id, "result collector is gone, stopping worker");
            break;
        }
    }
    debug!(worker_id, processed, "worker exiting");
    processed
}
