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

//! Persisted lifecycle record of one reload task.
//!
//! A record is written before the first gateway call (write-ahead) and then
//! updated in place, keyed by the task's external id. Records are never
//! deleted; a permanently failed task keeps its record with status `Failed`
//! so it can be reconciled by hand.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ExternalId, OrderId, Pin, ReloadTask};
use crate::gateway::GatewayTransaction;

/// Lifecycle state of a [`TransactionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Record exists, no gateway call has succeeded yet.
    Registered,
    /// The gateway accepted the create call.
    Submitted,
    /// The pin was fetched and stored.
    Confirmed,
    /// The task was permanently dropped.
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Registered => "Registered",
            TransactionStatus::Submitted => "Submitted",
            TransactionStatus::Confirmed => "Confirmed",
            TransactionStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Registered" => Ok(TransactionStatus::Registered),
            "Submitted" => Ok(TransactionStatus::Submitted),
            "Confirmed" => Ok(TransactionStatus::Confirmed),
            "Failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub external_id: ExternalId,
    pub order_id: OrderId,
    pub product_id: i64,
    pub recipient: String,
    pub status: TransactionStatus,
    pub gateway_transaction_id: Option<i64>,
    pub operator_reference: Option<String>,
    pub pin: Option<Pin>,
    pub create_attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Fresh write-ahead record for a task that has not touched the gateway.
    pub fn register(task: &ReloadTask) -> Self {
        let now = Utc::now();
        Self {
            external_id: task.external_id.clone(),
            order_id: task.order_id.clone(),
            product_id: task.product_id,
            recipient: task.recipient.clone(),
            status: TransactionStatus::Registered,
            gateway_transaction_id: None,
            operator_reference: None,
            pin: None,
            create_attempts: 0,
            last_error: None,
            created_at: now,
            submitted_at: None,
            confirmed_at: None,
            updated_at: now,
        }
    }

    /// Marks the create call as accepted after `attempts` tries.
    pub fn mark_submitted(&mut self, attempts: u32) {
        let now = Utc::now();
        self.status = TransactionStatus::Submitted;
        self.create_attempts = attempts;
        self.submitted_at.get_or_insert(now);
        self.last_error = None;
        self.updated_at = now;
    }

    /// Copies the settled gateway transaction onto the record.
    pub fn mark_confirmed(&mut self, transaction: &GatewayTransaction, pin: Pin) {
        let now = Utc::now();
        self.status = TransactionStatus::Confirmed;
        self.gateway_transaction_id = Some(transaction.id);
        self.operator_reference = transaction.operator_reference.clone();
        self.pin = Some(pin);
        self.submitted_at.get_or_insert(now);
        self.confirmed_at = Some(transaction.confirmation_date.unwrap_or(now));
        self.last_error = None;
        self.updated_at = now;
    }

    /// Marks the task as permanently dropped.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = TransactionStatus::Failed;
        self.last_error = Some(reason.into());
        self.updated_at = Utc::now();
    }

    /// Time between registration and confirmation, once confirmed.
    pub fn settle_latency(&self) -> Option<Duration> {
        self.confirmed_at.map(|confirmed| confirmed - self.created_at)
    }
}
