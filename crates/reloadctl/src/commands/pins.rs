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

use anyhow::{bail, Result};
use reload_fulfillment::{OrderId, ReloadStore};

use super::open_store;
use crate::config::ReloadctlConfig;

/// Prints the finalized pins of an order as JSON.
pub async fn run(config: &ReloadctlConfig, order_id: &str) -> Result<()> {
    let order_id = OrderId::from(order_id);
    let store = open_store(config).await?;
    let Some(order) = store.get_order(&order_id).await? else {
        bail!("No order found for order id {}", order_id);
    };

    if !order.status.is_terminal() {
        eprintln!("order {} is still {}", order_id, order.status);
    }
    println!("{}", serde_json::to_string_pretty(&order.pins)?);
    Ok(())
}
