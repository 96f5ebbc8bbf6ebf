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

//! # Data Access Layer
//!
//! The pipeline persists three kinds of data through [`ReloadStore`]:
//!
//! - transaction records, upserted by external id before and after every
//!   gateway step,
//! - pin dumps, an append-only snapshot of the pins of one order,
//! - order rows, whose pin list is only written when the order is finalized.
//!
//! Writes for different external ids never conflict, so implementations need
//! no cross-task locking beyond what keeps a single write atomic.
//!
//! Two implementations ship with the crate: [`SqliteStore`] for durable use
//! and [`MemoryStore`] for tests and embedders without durability needs.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{
    ExternalId, OrderId, OrderRecord, OrderStatus, PinDump, PinItem, TransactionRecord,
};

/// Persistent store used by the fulfillment pipeline.
#[async_trait]
pub trait ReloadStore: Send + Sync {
    /// Inserts or replaces the record keyed by `record.external_id`.
    async fn upsert_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError>;

    async fn get_transaction(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<TransactionRecord>, StoreError>;

    /// Creates the order row. Fails if the order already exists.
    async fn create_order(&self, order: &OrderRecord) -> Result<(), StoreError>;

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<OrderRecord>, StoreError>;

    /// Appends a new pin dump for `order_id` and returns it.
    async fn save_pin_dump(
        &self,
        order_id: &OrderId,
        pins: &[PinItem],
    ) -> Result<PinDump, StoreError>;

    /// Reads the newest pin dump for `order_id`.
    async fn read_pin_dump(&self, order_id: &OrderId) -> Result<Option<PinDump>, StoreError>;

    /// Replaces the order's pin list and sets its status.
    ///
    /// Returns [`StoreError::OrderNotFound`] if no order row exists.
    async fn write_final_order_pins(
        &self,
        order_id: &OrderId,
        pins: &[PinItem],
        status: OrderStatus,
    ) -> Result<(), StoreError>;
}
