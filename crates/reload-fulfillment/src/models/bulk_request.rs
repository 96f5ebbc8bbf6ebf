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

//! The bulk purchase request accepted from the calling layer.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One product line of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "productId")]
    pub product_id: i64,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(product_id: i64, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A bulk purchase: `quantity` independent reloads per line item, all sent
/// to the same recipient.
///
/// Immutable once accepted; the pipeline only ever borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequest {
    #[serde(rename = "mobile_number")]
    pub recipient: String,
    #[serde(rename = "lineItems")]
    pub line_items: Vec<LineItem>,
}

impl BulkRequest {
    pub fn new(recipient: impl Into<String>, line_items: Vec<LineItem>) -> Self {
        Self {
            recipient: recipient.into(),
            line_items,
        }
    }

    /// Sum of all line item quantities, i.e. the number of tasks this request
    /// expands to.
    pub fn total_quantity(&self) -> u64 {
        self.line_items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Checks the request can be accepted.
    ///
    /// # Arguments
    /// * `max_tasks` - Upper bound on the number of tasks one request may expand to
    pub fn validate(&self, max_tasks: u64) -> Result<(), ValidationError> {
        if self.recipient.trim().is_empty() {
            return Err(ValidationError::EmptyRecipient);
        }
        if self.line_items.is_empty() {
            return Err(ValidationError::NoLineItems);
        }
        if let Some((index, item)) = self
            .line_items
            .iter()
            .enumerate()
            .find(|(_, item)| item.quantity == 0)
        {
            return Err(ValidationError::ZeroQuantity {
                index,
                product_id: item.product_id,
            });
        }

        let requested = self.total_quantity();
        if requested > max_tasks {
            return Err(ValidationError::TooManyTasks {
                requested,
                limit: max_tasks,
            });
        }
        Ok(())
    }
}
