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

//! Worker bound and create rate limit under load.

use reload_fulfillment::{BulkFulfillment, BulkRequest, LineItem, MemoryStore};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::fixtures::{fast_config, ScriptedGateway};

/// Asserts no `limit + 1` consecutive creates fall inside one `interval`.
fn assert_rate_window(instants: &[Instant], limit: usize, interval: Duration) {
    let floor = interval.mul_f64(0.9);
    for window in instants.windows(limit + 1) {
        let span = window[limit].duration_since(window[0]);
        assert!(
            span >= floor,
            "{} creates issued within {:?}, expected at least {:?}",
            limit + 1,
            span,
            floor
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_in_flight_creates_never_exceed_workers() {
    let gateway = Arc::new(ScriptedGateway::new().with_create_latency(Duration::from_millis(25)));
    let store = Arc::new(MemoryStore::new());
    let config = fast_config().workers(3).task_queue_capacity(4).build();
    let fulfillment = BulkFulfillment::new(config, gateway.clone(), store);

    let report = fulfillment
        .submit(BulkRequest::new("+15551000", vec![LineItem::new(1, 18)]))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.succeeded, 18);
    assert!(gateway.max_concurrent_creates() <= 3);
    assert!(gateway.max_concurrent_creates() >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_creates_respect_rate_limit() {
    let gateway = Arc::new(ScriptedGateway::new());
    let store = Arc::new(MemoryStore::new());
    let interval = Duration::from_millis(200);
    let config = fast_config()
        .workers(8)
        .create_rate_limit(5, interval)
        .build();
    let fulfillment = BulkFulfillment::new(config, gateway.clone(), store);

    let started = Instant::now();
    let report = fulfillment
        .submit(BulkRequest::new("+15551001", vec![LineItem::new(1, 12)]))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.succeeded, 12);
    let instants = gateway.create_instants();
    assert_eq!(instants.len(), 12);
    assert_rate_window(&instants, 5, interval);
    // 12 permits spaced 40ms apart.
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rate_limit_is_shared_between_jobs() {
    let gateway = Arc::new(ScriptedGateway::new());
    let store = Arc::new(MemoryStore::new());
    let interval = Duration::from_millis(200);
    let config = fast_config().create_rate_limit(4, interval).build();
    let fulfillment = BulkFulfillment::new(config, gateway.clone(), store);

    let first = fulfillment
        .submit(BulkRequest::new("+15551002", vec![LineItem::new(1, 5)]))
        .await
        .unwrap();
    let second = fulfillment
        .clone()
        .submit(BulkRequest::new("+15551003", vec![LineItem::new(2, 5)]))
        .await
        .unwrap();

    assert_eq!(first.wait().await.unwrap().succeeded, 5);
    assert_eq!(second.wait().await.unwrap().succeeded, 5);

    let mut instants = gateway.create_instants();
    instants.sort();
    assert_eq!(instants.len(), 10);
    assert_rate_window(&instants, 4, interval);
}
