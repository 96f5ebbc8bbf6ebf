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

//! The pipeline against a migrated SQLite store.

use reload_fulfillment::{
    BulkFulfillment, BulkRequest, LineItem, OrderStatus, ReloadStore, SqliteStore,
    TransactionStatus,
};
use std::sync::Arc;

use crate::fixtures::{sqlite_store, ProductBehavior, ScriptedGateway, FAST_CONFIG};

#[tokio::test]
async fn test_pipeline_persists_to_sqlite() {
    let (_dir, store) = sqlite_store().await;
    let store = Arc::new(store);
    let gateway = Arc::new(ScriptedGateway::new().with_product(
        2,
        ProductBehavior {
            never_settle: true,
            ..Default::default()
        },
    ));
    let fulfillment = BulkFulfillment::new(FAST_CONFIG.clone(), gateway, store.clone());

    let handle = fulfillment
        .submit(BulkRequest::new(
            "+15553000",
            vec![LineItem::new(1, 4), LineItem::new(2, 1)],
        ))
        .await
        .unwrap();
    let order_id = handle.order_id().clone();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed_fetch, 1);
    assert_eq!(report.status, OrderStatus::PartiallyCompleted);

    let order = store.get_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::PartiallyCompleted);
    assert_eq!(order.pins, report.pins);

    let dump = store.read_pin_dump(&order_id).await.unwrap().unwrap();
    assert_eq!(dump.pins.len(), 4);

    let records = store.transactions_for_order(&order_id).await.unwrap();
    assert_eq!(records.len(), 5);
    let confirmed = records
        .iter()
        .filter(|r| r.status == TransactionStatus::Confirmed)
        .count();
    let failed = records
        .iter()
        .filter(|r| r.status == TransactionStatus::Failed)
        .count();
    assert_eq!((confirmed, failed), (4, 1));
}

#[tokio::test]
async fn test_finalize_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reload.db");
    let path = path.to_str().unwrap();

    let order_id = {
        let store = Arc::new(SqliteStore::open(path).await.unwrap());
        let fulfillment =
            BulkFulfillment::new(FAST_CONFIG.clone(), Arc::new(ScriptedGateway::new()), store);
        let handle = fulfillment
            .submit(BulkRequest::new("+15553001", vec![LineItem::new(1, 2)]))
            .await
            .unwrap();
        let order_id = handle.order_id().clone();
        handle.wait().await.unwrap();
        order_id
    };

    // A fresh process finalizes again from the durable dump alone.
    let store = Arc::new(SqliteStore::open(path).await.unwrap());
    let fulfillment =
        BulkFulfillment::new(FAST_CONFIG.clone(), Arc::new(ScriptedGateway::new()), store.clone());
    let finalized = fulfillment.recover(&order_id).await.unwrap();

    assert_eq!(finalized.pins.len(), 2);
    assert_eq!(finalized.status, OrderStatus::Completed);
    let order = store.get_order(&order_id).await.unwrap().unwrap();
    assert_eq!(order.pins, finalized.pins);
}
