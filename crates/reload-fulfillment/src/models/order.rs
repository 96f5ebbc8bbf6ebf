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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{OrderId, PinItem};

/// Status of a bulk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted, the job is still running.
    Processing,
    /// Every requested reload produced a pin.
    Completed,
    /// Some, but not all, reloads produced a pin.
    PartiallyCompleted,
    /// No reload produced a pin.
    Failed,
}

impl OrderStatus {
    /// Terminal status for an order given how many pins were finalized.
    pub fn from_counts(requested: usize, finalized: usize) -> Self {
        if requested > 0 && finalized >= requested {
            OrderStatus::Completed
        } else if finalized == 0 {
            OrderStatus::Failed
        } else {
            OrderStatus::PartiallyCompleted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "Processing",
            OrderStatus::Completed => "Completed",
            OrderStatus::PartiallyCompleted => "PartiallyCompleted",
            OrderStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Processing)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(OrderStatus::Processing),
            "Completed" => Ok(OrderStatus::Completed),
            "PartiallyCompleted" => Ok(OrderStatus::PartiallyCompleted),
            "Failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// The order aggregate: its authoritative pin list is only written by the
/// finalize step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub recipient: String,
    pub requested_quantity: u64,
    pub status: OrderStatus,
    pub pins: Vec<PinItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn new(order_id: OrderId, recipient: impl Into<String>, requested_quantity: u64) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            recipient: recipient.into(),
            requested_quantity,
            status: OrderStatus::Processing,
            pins: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
