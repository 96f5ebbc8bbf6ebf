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

//! # Transaction Gateway
//!
//! The external service that performs reloads. The pipeline only needs two
//! operations from it, captured by [`TransactionGateway`]:
//!
//! - `create_transaction` submits one reload keyed by its external id. The
//!   gateway may answer with [`GatewayError::Throttled`], which the workers
//!   retry with backoff, or [`GatewayError::Duplicate`] when a transaction
//!   with that external id already exists, which the workers treat as an
//!   accepted create.
//! - `fetch_transaction` looks a transaction up by external id. The gateway
//!   confirms asynchronously, so a transaction may be missing or may not
//!   carry a pin yet for a while after it was created.
//!
//! [`DtOneGateway`] is the HTTP implementation.

mod dtone;

pub use dtone::{DtOneConfig, DtOneGateway};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::models::{ExternalId, Pin};

/// Status id the gateway reports for a completed transaction.
pub const STATUS_COMPLETED: i64 = 70000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatusClass {
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatus {
    pub id: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<GatewayStatusClass>,
}

impl GatewayStatus {
    pub fn completed() -> Self {
        Self {
            id: STATUS_COMPLETED,
            message: "COMPLETED".to_string(),
            class: Some(GatewayStatusClass {
                id: 7,
                message: "COMPLETED".to_string(),
            }),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.id == STATUS_COMPLETED
    }
}

/// A transaction as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub id: i64,
    pub external_id: ExternalId,
    pub status: GatewayStatus,
    #[serde(default)]
    pub pin: Option<Pin>,
    #[serde(default)]
    pub operator_reference: Option<String>,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub confirmation_date: Option<DateTime<Utc>>,
}

impl GatewayTransaction {
    /// The pin, once the transaction has settled. A transaction without a
    /// non-empty pin code is not settled yet.
    pub fn settled_pin(&self) -> Option<&Pin> {
        self.pin.as_ref().filter(|pin| !pin.code.is_empty())
    }
}

/// The external transaction service.
#[async_trait]
pub trait TransactionGateway: Send + Sync {
    /// Submits one reload. Must be idempotent per `external_id` on the
    /// gateway side.
    async fn create_transaction(
        &self,
        external_id: &ExternalId,
        product_id: i64,
        recipient: &str,
    ) -> Result<(), GatewayError>;

    /// Looks a transaction up by external id. `Ok(None)` means the gateway
    /// does not know the transaction (yet).
    async fn fetch_transaction(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<GatewayTransaction>, GatewayError>;
}
