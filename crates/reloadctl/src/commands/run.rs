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
use reload_fulfillment::{BulkRequest, FulfillmentReport};
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::build_fulfillment;
use crate::config::ReloadctlConfig;

/// Reads a bulk request from a JSON file.
pub fn read_request(path: &Path) -> Result<BulkRequest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse bulk request in {}", path.display()))
}

/// Submits the request and waits for the job. Ctrl-C cancels the job, which
/// still dumps and finalizes what it obtained.
pub async fn run(config: &ReloadctlConfig, request_path: &Path) -> Result<()> {
    let request = read_request(request_path)?;
    let fulfillment = build_fulfillment(config).await?;

    let handle = fulfillment
        .submit(request)
        .await
        .context("Bulk request was not accepted")?;
    info!(order_id = %handle.order_id(), "order accepted");
    println!("order_id: {}", handle.order_id());

    let cancel = handle.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling order");
            cancel.cancel();
        }
    });
    let result = handle.wait().await;
    interrupt.abort();

    let report = result.context("Bulk fulfillment failed")?;
    println!("{}", serde_json::to_string_pretty(&summary(&report))?);
    Ok(())
}

fn summary(report: &FulfillmentReport) -> serde_json::Value {
    json!({
        "order_id": report.order_id,
        "status": report.status.as_str(),
        "total": report.total_tasks,
        "succeeded": report.succeeded,
        "failed_create": report.failed_create,
        "failed_fetch": report.failed_fetch,
        "cancelled": report.cancelled,
        "failed_external_ids": report
            .permanent_failures
            .iter()
            .map(|f| f.external_id().to_string())
            .collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_request_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"mobile_number": "+6281234567890", "lineItems": [{{"productId": 101, "quantity": 3}}]}}"#
        )
        .unwrap();

        let request = read_request(file.path()).unwrap();
        assert_eq!(request.recipient, "+6281234567890");
        assert_eq!(request.total_quantity(), 3);
    }

    #[test]
    fn test_read_request_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = read_request(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse bulk request"));
    }
}
