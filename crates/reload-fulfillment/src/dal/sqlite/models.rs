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

//! SQLite row types.
//!
//! Timestamps are stored as RFC 3339 text and pin lists as JSON text. Rows
//! are converted to domain types at the store boundary.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::database::schema::{orders, pin_dumps, reload_transactions};
use crate::error::StoreError;
use crate::models::{OrderRecord, Pin, PinDump, PinItem, TransactionRecord};

pub(super) fn parse_timestamp(
    column: &'static str,
    value: &str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidValue {
            column,
            value: value.to_string(),
        })
}

fn parse_optional_timestamp(
    column: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    value.map(|v| parse_timestamp(column, &v)).transpose()
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = reload_transactions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TransactionRow {
    pub external_id: String,
    pub order_id: String,
    pub product_id: i64,
    pub recipient: String,
    pub status: String,
    pub gateway_transaction_id: Option<i64>,
    pub operator_reference: Option<String>,
    pub pin_code: Option<String>,
    pub pin_serial: Option<String>,
    pub create_attempts: i32,
    pub last_error: Option<String>,
    pub created_at: String,
    pub submitted_at: Option<String>,
    pub confirmed_at: Option<String>,
    pub updated_at: String,
}

impl From<&TransactionRecord> for TransactionRow {
    fn from(record: &TransactionRecord) -> Self {
        let (pin_code, pin_serial) = match &record.pin {
            Some(pin) => (Some(pin.code.clone()), Some(pin.serial.clone())),
            None => (None, None),
        };
        Self {
            external_id: record.external_id.to_string(),
            order_id: record.order_id.to_string(),
            product_id: record.product_id,
            recipient: record.recipient.clone(),
            status: record.status.as_str().to_string(),
            gateway_transaction_id: record.gateway_transaction_id,
            operator_reference: record.operator_reference.clone(),
            pin_code,
            pin_serial,
            create_attempts: i32::try_from(record.create_attempts).unwrap_or(i32::MAX),
            last_error: record.last_error.clone(),
            created_at: record.created_at.to_rfc3339(),
            submitted_at: record.submitted_at.map(|ts| ts.to_rfc3339()),
            confirmed_at: record.confirmed_at.map(|ts| ts.to_rfc3339()),
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|_| StoreError::InvalidValue {
                column: "reload_transactions.status",
                value: row.status.clone(),
            })?;
        let pin = match (row.pin_code, row.pin_serial) {
            (Some(code), Some(serial)) => Some(Pin { code, serial }),
            _ => None,
        };

        Ok(TransactionRecord {
            external_id: row.external_id.into(),
            order_id: row.order_id.into(),
            product_id: row.product_id,
            recipient: row.recipient,
            status,
            gateway_transaction_id: row.gateway_transaction_id,
            operator_reference: row.operator_reference,
            pin,
            create_attempts: u32::try_from(row.create_attempts).unwrap_or(0),
            last_error: row.last_error,
            created_at: parse_timestamp("reload_transactions.created_at", &row.created_at)?,
            submitted_at: parse_optional_timestamp(
                "reload_transactions.submitted_at",
                row.submitted_at,
            )?,
            confirmed_at: parse_optional_timestamp(
                "reload_transactions.confirmed_at",
                row.confirmed_at,
            )?,
            updated_at: parse_timestamp("reload_transactions.updated_at", &row.updated_at)?,
        })
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = pin_dumps)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PinDumpRow {
    pub id: i64,
    pub order_id: String,
    pub pins: String,
    pub created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = pin_dumps)]
pub struct NewPinDumpRow {
    pub order_id: String,
    pub pins: String,
    pub created_at: String,
}

impl TryFrom<PinDumpRow> for PinDump {
    type Error = StoreError;

    fn try_from(row: PinDumpRow) -> Result<Self, Self::Error> {
        let pins: Vec<PinItem> = serde_json::from_str(&row.pins)?;
        Ok(PinDump {
            id: row.id,
            order_id: row.order_id.into(),
            pins,
            created_at: parse_timestamp("pin_dumps.created_at", &row.created_at)?,
        })
    }
}

#[derive(Debug, Queryable, Selectable, Insertable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderRow {
    pub order_id: String,
    pub recipient: String,
    pub requested_quantity: i64,
    pub status: String,
    pub pins: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<&OrderRecord> for OrderRow {
    type Error = StoreError;

    fn try_from(order: &OrderRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            order_id: order.order_id.to_string(),
            recipient: order.recipient.clone(),
            requested_quantity: i64::try_from(order.requested_quantity).map_err(|_| {
                StoreError::InvalidValue {
                    column: "orders.requested_quantity",
                    value: order.requested_quantity.to_string(),
                }
            })?,
            status: order.status.as_str().to_string(),
            pins: serde_json::to_string(&order.pins)?,
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        })
    }
}

impl TryFrom<OrderRow> for OrderRecord {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|_| StoreError::InvalidValue {
            column: "orders.status",
            value: row.status.clone(),
        })?;
        Ok(OrderRecord {
            order_id: row.order_id.into(),
            recipient: row.recipient,
            requested_quantity: u64::try_from(row.requested_quantity).unwrap_or(0),
            status,
            pins: serde_json::from_str(&row.pins)?,
            created_at: parse_timestamp("orders.created_at", &row.created_at)?,
            updated_at: parse_timestamp("orders.updated_at", &row.updated_at)?,
        })
    }
}
