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

//! In-process [`ReloadStore`].

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::ReloadStore;
use crate::error::StoreError;
use crate::models::{
    ExternalId, OrderId, OrderRecord, OrderStatus, PinDump, PinItem, TransactionRecord,
};

#[derive(Debug, Default)]
struct State {
    transactions: HashMap<ExternalId, TransactionRecord>,
    orders: HashMap<OrderId, OrderRecord>,
    dumps: Vec<PinDump>,
    next_dump_id: i64,
}

/// A [`ReloadStore`] that keeps everything in memory.
///
/// Every method takes the lock once, so each call is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All transaction records of an order, in no particular order.
    pub fn transactions_for_order(&self, order_id: &OrderId) -> Vec<TransactionRecord> {
        self.state
            .lock()
            .transactions
            .values()
            .filter(|record| &record.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Number of dumps written for an order.
    pub fn dump_count(&self, order_id: &OrderId) -> usize {
        self.state
            .lock()
            .dumps
            .iter()
            .filter(|dump| &dump.order_id == order_id)
            .count()
    }
}

#[async_trait]
impl ReloadStore for MemoryStore {
    async fn upsert_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        self.state
            .lock()
            .transactions
            .insert(record.external_id.clone(), record.clone());
        Ok(())
    }

    async fn get_transaction(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.state.lock().transactions.get(external_id).cloned())
    }

    async fn create_order(&self, order: &OrderRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.orders.contains_key(&order.order_id) {
            return Err(StoreError::OrderExists(order.order_id.clone()));
        }
        state.orders.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<OrderRecord>, StoreError> {
        Ok(self.state.lock().orders.get(order_id).cloned())
    }

    async fn save_pin_dump(
        &self,
        order_id: &OrderId,
        pins: &[PinItem],
    ) -> Result<PinDump, StoreError> {
        let mut state = self.state.lock();
        state.next_dump_id += 1;
        let dump = PinDump {
            id: state.next_dump_id,
            order_id: order_id.clone(),
            pins: pins.to_vec(),
            created_at: Utc::now(),
        };
        state.dumps.push(dump.clone());
        Ok(dump)
    }

    async fn read_pin_dump(&self, order_id: &OrderId) -> Result<Option<PinDump>, StoreError> {
        Ok(self
            .state
            .lock()
            .dumps
            .iter()
            .filter(|dump| &dump.order_id == order_id)
            .max_by_key(|dump| dump.id)
            .cloned())
    }

    async fn write_final_order_pins(
        &self,
        order_id: &OrderId,
        pins: &[PinItem],
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let order = state
            .orders
            .get_mut(order_id)
            .ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        order.pins = pins.to_vec();
        order.status = status;
        order.updated_at = Utc::now();
        Ok(())
    }
}
