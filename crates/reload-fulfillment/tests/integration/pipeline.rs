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

//! End-to-end runs of the bulk pipeline against the scripted gateway and the
//! in-memory store.

use reload_fulfillment::{
    BulkFulfillment, BulkRequest, FailureReason, FailureStage, LineItem, MemoryStore, OrderId,
    OrderRecord, OrderStatus, PinItem, PipelineError, ReloadStore, TransactionStatus,
    ValidationError,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_test::traced_test;

use crate::fixtures::{ProductBehavior, ScriptedGateway, FAST_CONFIG};

fn fulfillment(gateway: &Arc<ScriptedGateway>, store: &Arc<MemoryStore>) -> BulkFulfillment {
    BulkFulfillment::new(FAST_CONFIG.clone(), gateway.clone(), store.clone())
}

#[tokio::test]
async fn test_happy_path_finalizes_every_pin() {
    let gateway = Arc::new(ScriptedGateway::new());
    let store = Arc::new(MemoryStore::new());
    let request = BulkRequest::new(
        "+6281234567890",
        vec![LineItem::new(101, 2), LineItem::new(202, 1)],
    );

    let handle = fulfillment(&gateway, &store).submit(request).await.unwrap();
    let order_id = handle.order_id().clone();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.total_tasks, 3);
    assert_eq!(report.succeeded, 3);
    assert!(report.permanent_failures.is_empty());
    assert_eq!(report.status, OrderStatus::Completed);
    assert!(!report.cancelled);

    let order = store.get_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.pins.len(), 3);
    let by_product = |product_id| order.pins.iter().filter(|p| p.product_id == product_id).count();
    assert_eq!(by_product(101), 2);
    assert_eq!(by_product(202), 1);
    assert_eq!(store.dump_count(&order_id), 1);

    let records = store.transactions_for_order(&order_id);
    assert_eq!(records.len(), 3);
    assert!(records
        .iter()
        .all(|r| r.status == TransactionStatus::Confirmed && r.pin.is_some()));
}

#[tokio::test]
async fn test_single_line_item_of_three_yields_three_pins() {
    let gateway = Arc::new(ScriptedGateway::new());
    let store = Arc::new(MemoryStore::new());
    let request = BulkRequest::new("+6281234567891", vec![LineItem::new(101, 3)]);

    let handle = fulfillment(&gateway, &store).submit(request).await.unwrap();
    let order_id = handle.order_id().clone();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.total_tasks, 3);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.status, OrderStatus::Completed);

    let order = store.get_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.pins.len(), 3);
    assert!(order.pins.iter().all(|p| p.product_id == 101));
    let distinct: HashSet<_> = order.pins.iter().map(|p| p.external_id.clone()).collect();
    assert_eq!(distinct.len(), 3);
    assert_eq!(gateway.total_create_calls(), 3);
    assert!(gateway.allocations().values().all(|n| *n == 1));
    assert_eq!(store.dump_count(&order_id), 1);
}

#[tokio::test]
async fn test_throttled_creates_back_off_and_succeed() {
    let gateway = Arc::new(ScriptedGateway::new().with_product(
        7,
        ProductBehavior {
            throttle_first: 2,
            ..Default::default()
        },
    ));
    let store = Arc::new(MemoryStore::new());
    let request = BulkRequest::new("+15550001", vec![LineItem::new(7, 1)]);

    let started = Instant::now();
    let handle = fulfillment(&gateway, &store).submit(request).await.unwrap();
    let order_id = handle.order_id().clone();
    let report = handle.wait().await.unwrap();

    // 20ms then 40ms of backoff before the third call is accepted.
    assert!(started.elapsed() >= Duration::from_millis(60));
    assert_eq!(report.succeeded, 1);
    assert_eq!(gateway.total_create_calls(), 3);

    let records = store.transactions_for_order(&order_id);
    assert_eq!(records[0].create_attempts, 3);
    assert_eq!(records[0].status, TransactionStatus::Confirmed);
}

#[tokio::test(flavor = "current_thread")]
#[traced_test]
async fn test_unsettled_task_is_dropped_and_logged_once() {
    let gateway = Arc::new(
        ScriptedGateway::new().with_product(
            9,
            ProductBehavior {
                never_settle: true,
                ..Default::default()
            },
        ),
    );
    let store = Arc::new(MemoryStore::new());
    let request = BulkRequest::new("+15550002", vec![LineItem::new(1, 2), LineItem::new(9, 1)]);

    let handle = fulfillment(&gateway, &store).submit(request).await.unwrap();
    let order_id = handle.order_id().clone();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.total_tasks, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed_fetch, 1);
    assert_eq!(report.failed_create, 0);
    assert_eq!(report.status, OrderStatus::PartiallyCompleted);

    let failure = &report.permanent_failures[0];
    assert_eq!(failure.stage, FailureStage::Fetch);
    assert_eq!(failure.reason, FailureReason::NotSettled);
    assert_eq!(failure.task.product_id, 9);
    // Three fetches in the primary wave plus one in the retry pass.
    assert_eq!(gateway.fetch_calls_for(failure.external_id()), 4);

    let record = store
        .get_transaction(failure.external_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TransactionStatus::Failed);
    assert!(record.last_error.is_some());

    let order = store.get_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.pins.len(), 2);
    assert_eq!(order.status, OrderStatus::PartiallyCompleted);

    let external_id = failure.external_id().to_string();
    logs_assert(|lines: &[&str]| {
        let matching = lines
            .iter()
            .filter(|line| line.contains("reload task permanently failed"))
            .collect::<Vec<_>>();
        if matching.len() != 1 {
            return Err(format!("expected 1 permanent failure line, found {}", matching.len()));
        }
        let line = matching[0];
        for needle in [
            external_id.as_str(),
            "event_type=\"reload.permanent_failure\"",
            "stage=fetch",
            "reason=\"not_settled\"",
        ] {
            if !line.contains(needle) {
                return Err(format!("permanent failure line is missing {}: {}", needle, line));
            }
        }
        Ok(())
    });
}

#[tokio::test]
async fn test_retry_pass_recovers_late_settlement() {
    let gateway = Arc::new(ScriptedGateway::new().with_product(
        5,
        ProductBehavior {
            settle_on_fetch: 4,
            ..Default::default()
        },
    ));
    let store = Arc::new(MemoryStore::new());
    let request = BulkRequest::new("+15550003", vec![LineItem::new(5, 2)]);

    let report = fulfillment(&gateway, &store)
        .submit(request)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    assert!(report.permanent_failures.is_empty());
    assert_eq!(report.status, OrderStatus::Completed);
    for pin in &report.pins {
        assert_eq!(gateway.fetch_calls_for(&pin.external_id), 4);
    }
}

#[tokio::test]
async fn test_retry_pass_recreates_rejected_create() {
    let gateway = Arc::new(ScriptedGateway::new().with_product(
        3,
        ProductBehavior {
            reject_first_create: true,
            ..Default::default()
        },
    ));
    let store = Arc::new(MemoryStore::new());
    let request = BulkRequest::new("+15550004", vec![LineItem::new(3, 1)]);

    let handle = fulfillment(&gateway, &store).submit(request).await.unwrap();
    let order_id = handle.order_id().clone();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.status, OrderStatus::Completed);
    // Rejections are not retried in the primary wave.
    assert_eq!(gateway.total_create_calls(), 2);

    let records = store.transactions_for_order(&order_id);
    assert_eq!(records[0].status, TransactionStatus::Confirmed);
    assert_eq!(records[0].create_attempts, 2);
}

#[tokio::test]
async fn test_permanently_rejected_product_fails_order() {
    let gateway = Arc::new(ScriptedGateway::new().with_product(
        4,
        ProductBehavior {
            reject_creates: true,
            ..Default::default()
        },
    ));
    let store = Arc::new(MemoryStore::new());
    let request = BulkRequest::new("+15550005", vec![LineItem::new(4, 2)]);

    let handle = fulfillment(&gateway, &store).submit(request).await.unwrap();
    let order_id = handle.order_id().clone();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.failed_create, 2);
    assert_eq!(report.status, OrderStatus::Failed);
    assert!(report
        .permanent_failures
        .iter()
        .all(|f| matches!(f.reason, FailureReason::Gateway(_)) && f.attempts == 2));

    let order = store.get_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
    assert!(order.pins.is_empty());
    assert_eq!(store.dump_count(&order_id), 1);
}

#[tokio::test]
async fn test_lost_create_response_allocates_one_pin() {
    let gateway = Arc::new(ScriptedGateway::new().with_product(
        6,
        ProductBehavior {
            lose_first_create_response: true,
            ..Default::default()
        },
    ));
    let store = Arc::new(MemoryStore::new());
    let request = BulkRequest::new("+15550006", vec![LineItem::new(6, 3)]);

    let report = fulfillment(&gateway, &store)
        .submit(request)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.succeeded, 3);
    let allocations = gateway.allocations();
    assert_eq!(allocations.len(), 3);
    assert!(allocations.values().all(|&n| n == 1));

    let unique: HashSet<&str> = report.pins.iter().map(|p| p.pin.code.as_str()).collect();
    assert_eq!(unique.len(), 3);
}

#[tokio::test]
async fn test_every_task_is_accounted_for() {
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_product(
                1,
                ProductBehavior {
                    throttle_first: 1,
                    ..Default::default()
                },
            )
            .with_product(
                2,
                ProductBehavior {
                    reject_creates: true,
                    ..Default::default()
                },
            )
            .with_product(
                3,
                ProductBehavior {
                    never_settle: true,
                    ..Default::default()
                },
            ),
    );
    let store = Arc::new(MemoryStore::new());
    let request = BulkRequest::new(
        "+15550007",
        vec![
            LineItem::new(1, 6),
            LineItem::new(2, 3),
            LineItem::new(3, 2),
            LineItem::new(4, 5),
        ],
    );

    let report = fulfillment(&gateway, &store)
        .submit(request)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.total_tasks, 16);
    assert_eq!(report.succeeded, 11);
    assert_eq!(report.failed_create, 3);
    assert_eq!(report.failed_fetch, 2);
    assert_eq!(
        report.succeeded + report.permanent_failures.len(),
        report.total_tasks
    );

    let mut seen: HashSet<String> = report
        .pins
        .iter()
        .map(|p| p.external_id.to_string())
        .collect();
    for failure in &report.permanent_failures {
        assert!(seen.insert(failure.external_id().to_string()));
    }
    assert_eq!(seen.len(), 16);
}

#[tokio::test]
async fn test_invalid_request_is_rejected_before_dispatch() {
    let gateway = Arc::new(ScriptedGateway::new());
    let store = Arc::new(MemoryStore::new());

    let result = fulfillment(&gateway, &store)
        .submit(BulkRequest::new("+15550008", vec![LineItem::new(1, 0)]))
        .await;

    assert!(matches!(
        result,
        Err(PipelineError::Validation(ValidationError::ZeroQuantity { index: 0, .. }))
    ));
    assert_eq!(gateway.total_create_calls(), 0);
}

#[tokio::test]
async fn test_recover_finalizes_from_newest_dump() {
    let gateway = Arc::new(ScriptedGateway::new());
    let store = Arc::new(MemoryStore::new());
    let order_id = OrderId::from("order-recover");
    store
        .create_order(&OrderRecord::new(order_id.clone(), "+15550009", 2))
        .await
        .unwrap();

    let pin = |n: u32| PinItem {
        external_id: format!("ext-{}", n).into(),
        product_id: 1,
        pin: reload_fulfillment::Pin::new(format!("PIN-{}", n), format!("SER-{}", n)),
    };
    store.save_pin_dump(&order_id, &[pin(1)]).await.unwrap();
    store
        .save_pin_dump(&order_id, &[pin(1), pin(2)])
        .await
        .unwrap();

    let runner = fulfillment(&gateway, &store);
    let finalized = runner.recover(&order_id).await.unwrap();
    assert_eq!(finalized.pins.len(), 2);
    assert_eq!(finalized.status, OrderStatus::Completed);

    // Finalizing again is harmless.
    let again = runner.recover(&order_id).await.unwrap();
    assert_eq!(again, finalized);

    let order = store.get_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.pins, finalized.pins);
}

#[tokio::test]
async fn test_recover_without_dump_fails() {
    let gateway = Arc::new(ScriptedGateway::new());
    let store = Arc::new(MemoryStore::new());
    let order_id = OrderId::from("order-no-dump");
    store
        .create_order(&OrderRecord::new(order_id.clone(), "+15550010", 1))
        .await
        .unwrap();

    let result = fulfillment(&gateway, &store).recover(&order_id).await;
    assert!(matches!(result, Err(PipelineError::Finalize { .. })));
}
