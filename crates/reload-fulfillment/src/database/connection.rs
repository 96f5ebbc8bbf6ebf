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

//! SQLite connection pool.

use deadpool_diesel::sqlite::{Manager, Pool, Runtime};
use diesel::connection::SimpleConnection;
use diesel_migrations::MigrationHarness;
use tracing::{debug, info};

use super::MIGRATIONS;
use crate::error::StoreError;

pub type SqlitePool = Pool;

/// Milliseconds a statement waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 30_000;

/// Handle to the SQLite database backing the store.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    url: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("url", &self.url).finish()
    }
}

impl Database {
    /// Opens a pool for `connection_string`, which may be a plain file path,
    /// a `sqlite://` URL or `:memory:`.
    pub fn new(connection_string: &str) -> Result<Self, StoreError> {
        let url = Self::build_sqlite_url(connection_string);
        let manager = Manager::new(url.clone(), Runtime::Tokio1);
        let pool = Pool::builder(manager)
            .max_size(1)
            .build()
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        info!(url = %url, "SQLite connection pool initialized");
        Ok(Self { pool, url })
    }

    /// Opens the database and applies pending migrations.
    pub async fn open(connection_string: &str) -> Result<Self, StoreError> {
        let database = Self::new(connection_string)?;
        database.run_migrations().await?;
        Ok(database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_sqlite_url(connection_string: &str) -> String {
        connection_string
            .strip_prefix("sqlite://")
            .unwrap_or(connection_string)
            .to_string()
    }

    /// Sets WAL mode and the busy timeout, then runs pending migrations.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        let applied = conn
            .interact(|conn| {
                conn.batch_execute(&format!(
                    "PRAGMA journal_mode=WAL; PRAGMA busy_timeout={};",
                    BUSY_TIMEOUT_MS
                ))
                .map_err(|e| StoreError::Migration(e.to_string()))?;

                conn.run_pending_migrations(MIGRATIONS)
                    .map(|versions| versions.len())
                    .map_err(|e| StoreError::Migration(e.to_string()))
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        debug!(applied, "database migrations complete");
        Ok(())
    }
}
