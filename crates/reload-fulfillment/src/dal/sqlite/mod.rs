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

//! Durable [`ReloadStore`] on SQLite.

mod models;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;

use self::models::{NewPinDumpRow, OrderRow, PinDumpRow, TransactionRow};
use super::ReloadStore;
use crate::database::schema::{orders, pin_dumps, reload_transactions};
use crate::database::Database;
use crate::error::StoreError;
use crate::models::{
    ExternalId, OrderId, OrderRecord, OrderStatus, PinDump, PinItem, TransactionRecord,
};

/// [`ReloadStore`] backed by a SQLite [`Database`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    database: Database,
}

impl SqliteStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Opens `connection_string`, runs migrations and wraps the result.
    pub async fn open(connection_string: &str) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(connection_string).await?))
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// All transaction records of an order, oldest first.
    pub async fn transactions_for_order(
        &self,
        order_id: &OrderId,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let order_id = order_id.to_string();
        let rows: Vec<TransactionRow> = self
            .interact(move |conn| {
                reload_transactions::table
                    .filter(reload_transactions::order_id.eq(order_id))
                    .order(reload_transactions::created_at.asc())
                    .select(TransactionRow::as_select())
                    .load(conn)
                    .map_err(StoreError::from)
            })
            .await?;
        rows.into_iter().map(TransactionRecord::try_from).collect()
    }

    async fn interact<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<R, StoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self
            .database
            .pool()
            .get()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;
        conn.interact(f)
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?
    }
}

#[async_trait]
impl ReloadStore for SqliteStore {
    async fn upsert_transaction(&self, record: &TransactionRecord) -> Result<(), StoreError> {
        let row = TransactionRow::from(record);
        self.interact(move |conn| {
            diesel::replace_into(reload_transactions::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn get_transaction(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let external_id = external_id.to_string();
        let row: Option<TransactionRow> = self
            .interact(move |conn| {
                reload_transactions::table
                    .find(external_id)
                    .select(TransactionRow::as_select())
                    .first(conn)
                    .optional()
                    .map_err(StoreError::from)
            })
            .await?;
        row.map(TransactionRecord::try_from).transpose()
    }

    async fn create_order(&self, order: &OrderRecord) -> Result<(), StoreError> {
        let row = OrderRow::try_from(order)?;
        let order_id = order.order_id.clone();
        self.interact(move |conn| {
            match diesel::insert_into(orders::table).values(&row).execute(conn) {
                Ok(_) => Ok(()),
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    Err(StoreError::OrderExists(order_id))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_order(&self, order_id: &OrderId) -> Result<Option<OrderRecord>, StoreError> {
        let order_id = order_id.to_string();
        let row: Option<OrderRow> = self
            .interact(move |conn| {
                orders::table
                    .find(order_id)
                    .select(OrderRow::as_select())
                    .first(conn)
                    .optional()
                    .map_err(StoreError::from)
            })
            .await?;
        row.map(OrderRecord::try_from).transpose()
    }

    async fn save_pin_dump(
        &self,
        order_id: &OrderId,
        pins: &[PinItem],
    ) -> Result<PinDump, StoreError> {
        let new_row = NewPinDumpRow {
            order_id: order_id.to_string(),
            pins: serde_json::to_string(pins)?,
            created_at: Utc::now().to_rfc3339(),
        };
        let row: PinDumpRow = self
            .interact(move |conn| {
                conn.transaction(|conn| {
                    let order_id = new_row.order_id.clone();
                    diesel::insert_into(pin_dumps::table)
                        .values(&new_row)
                        .execute(conn)?;
                    pin_dumps::table
                        .filter(pin_dumps::order_id.eq(order_id))
                        .order(pin_dumps::id.desc())
                        .select(PinDumpRow::as_select())
                        .first(conn)
                        .map_err(StoreError::from)
                })
            })
            .await?;
        PinDump::try_from(row)
    }

    async fn read_pin_dump(&self, order_id: &OrderId) -> Result<Option<PinDump>, StoreError> {
        let order_id = order_id.to_string();
        let row: Option<PinDumpRow> = self
            .interact(move |conn| {
                pin_dumps::table
                    .filter(pin_dumps::order_id.eq(order_id))
                    .order(pin_dumps::id.desc())
                    .select(PinDumpRow::as_select())
                    .first(conn)
                    .optional()
                    .map_err(StoreError::from)
            })
            .await?;
        row.map(PinDump::try_from).transpose()
    }

    async fn write_final_order_pins(
        &self,
        order_id: &OrderId,
        pins: &[PinItem],
        status: OrderStatus,
    ) -> Result<(), StoreError> {
        let pins_json = serde_json::to_string(pins)?;
        let now = Utc::now().to_rfc3339();
        let key = order_id.to_string();
        let updated = self
            .interact(move |conn| {
                diesel::update(orders::table.find(key))
                    .set((
                        orders::pins.eq(pins_json),
                        orders::status.eq(status.as_str()),
                        orders::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .map_err(StoreError::from)
            })
            .await?;

        if updated == 0 {
            return Err(StoreError::OrderNotFound(order_id.clone()));
        }
        Ok(())
    }
}
