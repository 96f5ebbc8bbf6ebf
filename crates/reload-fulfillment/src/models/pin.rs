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

//! Pins and the pin dump.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ExternalId, OrderId};

/// Redemption code and serial returned by the gateway once a transaction
/// settles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pin {
    pub code: String,
    pub serial: String,
}

impl Pin {
    pub fn new(code: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            serial: serial.into(),
        }
    }
}

/// The redeemable result of one successful task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinItem {
    pub external_id: ExternalId,
    #[serde(rename = "productId")]
    pub product_id: i64,
    pub pin: Pin,
}

/// Append-only snapshot of all pins collected for an order.
///
/// Several dumps may exist for one order; the newest one is authoritative
/// when the order is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDump {
    pub id: i64,
    pub order_id: OrderId,
    pub pins: Vec<PinItem>,
    pub created_at: DateTime<Utc>,
}
