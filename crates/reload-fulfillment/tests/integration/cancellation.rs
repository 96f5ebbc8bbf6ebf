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

//! Cancellation and job deadlines.

use reload_fulfillment::{
    BulkFulfillment, BulkRequest, FailureReason, FulfillmentReport, LineItem, MemoryStore,
    ReloadStore,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::fixtures::{fast_config, ScriptedGateway};

fn slow_gateway() -> Arc<ScriptedGateway> {
    Arc::new(ScriptedGateway::new().with_create_latency(Duration::from_millis(30)))
}

fn assert_accounted(report: &FulfillmentReport) {
    let mut ids: HashSet<String> = report
        .pins
        .iter()
        .map(|p| p.external_id.to_string())
        .collect();
    for failure in &report.permanent_failures {
        assert!(
            ids.insert(failure.external_id().to_string()),
            "task {} reported twice",
            failure.external_id()
        );
    }
    assert_eq!(ids.len(), report.total_tasks);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_mid_batch_stops_new_creates() {
    let gateway = slow_gateway();
    let store = Arc::new(MemoryStore::new());
    let config = fast_config().workers(2).task_queue_capacity(2).build();
    let fulfillment = BulkFulfillment::new(config, gateway.clone(), store.clone());

    let handle = fulfillment
        .submit(BulkRequest::new("+15552000", vec![LineItem::new(1, 20)]))
        .await
        .unwrap();
    let order_id = handle.order_id().clone();

    tokio::time::sleep(Duration::from_millis(80)).await;
    handle.cancel();
    let cancelled_at = Instant::now();
    let report = handle.wait().await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.total_tasks, 20);
    assert!(report.succeeded < 20);
    assert!(report
        .permanent_failures
        .iter()
        .any(|f| f.reason == FailureReason::Cancelled));
    assert_accounted(&report);

    let grace = Duration::from_millis(5);
    assert!(gateway
        .create_instants()
        .iter()
        .all(|at| *at <= cancelled_at + grace));

    // Pins obtained before the cancel are still dumped and finalized.
    let order = store.get_order(&order_id).await.unwrap().unwrap();
    assert!(order.status.is_terminal());
    assert_eq!(order.pins.len(), report.succeeded);
    assert_eq!(store.dump_count(&order_id), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_interrupts_in_flight_create() {
    let gateway =
        Arc::new(ScriptedGateway::new().with_create_latency(Duration::from_millis(1500)));
    let store = Arc::new(MemoryStore::new());
    let config = fast_config().workers(2).build();
    let fulfillment = BulkFulfillment::new(config, gateway.clone(), store.clone());

    let handle = fulfillment
        .submit(BulkRequest::new("+15552003", vec![LineItem::new(1, 4)]))
        .await
        .unwrap();
    let order_id = handle.order_id().clone();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(gateway.total_create_calls(), 2);
    handle.cancel();
    let cancelled_at = Instant::now();
    let report = handle.wait().await.unwrap();

    assert!(cancelled_at.elapsed() < Duration::from_millis(500));
    assert!(report.cancelled);
    assert_eq!(report.succeeded, 0);
    assert_eq!(report.permanent_failures.len(), 4);
    assert!(report
        .permanent_failures
        .iter()
        .all(|f| f.reason == FailureReason::Cancelled));
    assert_accounted(&report);

    let order = store.get_order(&order_id).await.unwrap().unwrap();
    assert!(order.status.is_terminal());
    assert!(order.pins.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_job_deadline_cancels_job() {
    let gateway = slow_gateway();
    let store = Arc::new(MemoryStore::new());
    let config = fast_config()
        .workers(2)
        .task_queue_capacity(2)
        .job_deadline(Some(Duration::from_millis(60)))
        .build();
    let fulfillment = BulkFulfillment::new(config, gateway.clone(), store.clone());

    let started = Instant::now();
    let report = fulfillment
        .submit(BulkRequest::new("+15552001", vec![LineItem::new(1, 30)]))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.succeeded < 30);
    assert_accounted(&report);
    // 30 creates at 30ms on 2 workers would take 450ms.
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_deadline_that_never_fires_leaves_job_untouched() {
    let gateway = Arc::new(ScriptedGateway::new());
    let store = Arc::new(MemoryStore::new());
    let config = fast_config()
        .job_deadline(Some(Duration::from_secs(30)))
        .build();
    let fulfillment = BulkFulfillment::new(config, gateway, store);

    let report = fulfillment
        .submit(BulkRequest::new("+15552002", vec![LineItem::new(1, 4)]))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.succeeded, 4);
}
