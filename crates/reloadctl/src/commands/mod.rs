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

//! Sub-command implementations.

pub mod finalize;
pub mod pins;
pub mod run;

use anyhow::{Context, Result};
use reload_fulfillment::{BulkFulfillment, DtOneGateway, SqliteStore};
use std::sync::Arc;

use crate::config::ReloadctlConfig;

/// Opens the configured store, migrating it if needed.
pub async fn open_store(config: &ReloadctlConfig) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config.database.url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;
    Ok(Arc::new(store))
}

/// Wires the pipeline to the configured store and HTTP gateway.
pub async fn build_fulfillment(config: &ReloadctlConfig) -> Result<BulkFulfillment> {
    let store = open_store(config).await?;
    let dtone = config
        .gateway
        .to_dtone_config()
        .context("Invalid gateway base URL")?;
    let gateway = DtOneGateway::new(dtone).context("Failed to build gateway client")?;
    Ok(BulkFulfillment::new(
        config.fulfillment.to_config(),
        Arc::new(gateway),
        store,
    ))
}
