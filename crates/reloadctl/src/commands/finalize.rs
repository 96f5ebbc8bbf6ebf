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

use anyhow::{Context, Result};
use reload_fulfillment::OrderId;

use super::build_fulfillment;
use crate::config::ReloadctlConfig;

/// Re-runs the finalize phase of an order from its newest pin dump.
pub async fn run(config: &ReloadctlConfig, order_id: &str) -> Result<()> {
    let order_id = OrderId::from(order_id);
    let fulfillment = build_fulfillment(config).await?;
    let finalized = fulfillment
        .recover(&order_id)
        .await
        .with_context(|| format!("Failed to finalize order {}", order_id))?;

    println!(
        "order {} finalized from dump {}: {} pins, status {}",
        finalized.order_id,
        finalized.dump_id,
        finalized.pins.len(),
        finalized.status
    );
    Ok(())
}
