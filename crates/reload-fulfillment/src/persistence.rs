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

//! # Pin Persistence
//!
//! Two-phase persistence of an order's pins:
//!
//! 1. **Dump** writes every collected pin as one append-only snapshot.
//! 2. **Finalize** reads the newest snapshot back from the store and writes
//!    it onto the order as its authoritative pin list.
//!
//! Finalize depends only on durable state, so it can run on its own after a
//! crash between the two phases, and running it twice is harmless.

use std::sync::Arc;
use tracing::info;

use crate::dal::ReloadStore;
use crate::error::{PipelineError, StoreError};
use crate::models::{OrderId, OrderStatus, PinDump, PinItem};

/// Result of a finalize step.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedOrder {
    pub order_id: OrderId,
    /// Id of the dump the pins were read from.
    pub dump_id: i64,
    pub pins: Vec<PinItem>,
    pub status: OrderStatus,
}

pub struct PinPersistence {
    store: Arc<dyn ReloadStore>,
}

impl PinPersistence {
    pub fn new(store: Arc<dyn ReloadStore>) -> Self {
        Self { store }
    }

    /// Phase 1: appends a snapshot of `pins` for the order.
    pub async fn dump(&self, order_id: &OrderId, pins: &[PinItem]) -> Result<PinDump, PipelineError> {
        let dump = self
            .store
            .save_pin_dump(order_id, pins)
            .await
            .map_err(|source| PipelineError::Dump {
                order_id: order_id.clone(),
                source,
            })?;
        info!(order_id = %order_id, dump_id = dump.id, pins = dump.pins.len(), "pin dump written");
        Ok(dump)
    }

    /// Phase 2: copies the newest dump onto the order and sets its terminal
    /// status from the requested quantity.
    pub async fn finalize(&self, order_id: &OrderId) -> Result<FinalizedOrder, PipelineError> {
        let finalize_err = |source: StoreError| PipelineError::Finalize {
            order_id: order_id.clone(),
            source,
        };

        let order = self
            .store
            .get_order(order_id)
            .await
            .map_err(finalize_err)?
            .ok_or_else(|| finalize_err(StoreError::OrderNotFound(order_id.clone())))?;
        let dump = self
            .store
            .read_pin_dump(order_id)
            .await
            .map_err(finalize_err)?
            .ok_or_else(|| finalize_err(StoreError::DumpNotFound(order_id.clone())))?;

        let requested = usize::try_from(order.requested_quantity).unwrap_or(usize::MAX);
        let status = OrderStatus::from_counts(requested, dump.pins.len());
        self.store
            .write_final_order_pins(order_id, &dump.pins, status)
            .await
            .map_err(finalize_err)?;

        info!(
            order_id = %order_id,
            dump_id = dump.id,
            pins = dump.pins.len(),
            requested = order.requested_quantity,
            status = %status,
            "order finalized"
        );
        Ok(FinalizedOrder {
            order_id: order_id.clone(),
            dump_id: dump.id,
            pins: dump.pins,
            status,
        })
    }
}
