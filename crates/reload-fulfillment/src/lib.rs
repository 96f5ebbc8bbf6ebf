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

//! # Reload Fulfillment
//!
//! Fulfills bulk reload orders against a rate-limited, occasionally
//! throttling transaction gateway.
//!
//! A bulk request lists line items, each asking for `quantity` independent
//! reloads of one product for one recipient. The pipeline expands the
//! request into one task per unit, runs the tasks on a fixed-size worker
//! pool, gives failed tasks one more chance in a retry pass, and persists the
//! resulting pins in two phases (dump, then finalize) so an order can be
//! finalized again after a crash.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use reload_fulfillment::{
//!     BulkFulfillment, BulkRequest, DtOneConfig, DtOneGateway, FulfillmentConfig, LineItem,
//!     SqliteStore,
//! };
//! use std::sync::Arc;
//!
//! let store = SqliteStore::open("reload.db").await?;
//! let gateway = DtOneGateway::new(DtOneConfig::new(base_url, "user", "secret"))?;
//! let fulfillment = BulkFulfillment::new(
//!     FulfillmentConfig::default(),
//!     Arc::new(gateway),
//!     Arc::new(store),
//! );
//!
//! let job = fulfillment
//!     .submit(BulkRequest::new("+6281234567890", vec![LineItem::new(101, 3)]))
//!     .await?;
//! println!("accepted order {}", job.order_id());
//!
//! let report = job.wait().await?;
//! assert_eq!(report.succeeded + report.permanent_failures.len(), report.total_tasks);
//! ```
//!
//! ## Guarantees
//!
//! - Every task ends as exactly one pin or one logged permanent failure.
//! - Retried creates reuse the task's external id, so a retry never yields a
//!   second pin for the same task.
//! - At most `workers` create calls are in flight, and create calls are issued
//!   at no more than the configured rate.
//! - Cancelling a job stops dispatch, captures every unresolved task as a
//!   failure and still finalizes the pins already obtained.
//!
//! ## Observability
//!
//! Logging goes through `tracing`; [`init_logging`] installs a formatted
//! subscriber. Counters are emitted through the `metrics` facade:
//! `reload_creates_total`, `reload_throttled_total`, `reload_pins_total` and
//! `reload_permanent_failures_total{stage}`.

pub mod collector;
pub mod config;
pub mod dal;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod models;
pub mod persistence;
pub mod retry;
pub mod retry_pass;
pub mod runner;

pub use config::{FulfillmentConfig, FulfillmentConfigBuilder};
pub use dal::{MemoryStore, ReloadStore, SqliteStore};
pub use database::Database;
pub use error::{GatewayError, PipelineError, StoreError, ValidationError};
pub use executor::{FailureReason, FailureStage, TaskFailure, TaskOutcome};
pub use gateway::{DtOneConfig, DtOneGateway, GatewayTransaction, TransactionGateway};
pub use models::{
    BulkRequest, ExternalId, LineItem, OrderId, OrderRecord, OrderStatus, Pin, PinDump, PinItem,
    ReloadTask, TransactionRecord, TransactionStatus,
};
pub use persistence::FinalizedOrder;
pub use retry::{BackoffStrategy, RetryPolicy};
pub use runner::{BulkFulfillment, CollectedCounts, FulfillmentReport, JobHandle};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a global `tracing` subscriber printing to stderr.
///
/// `RUST_LOG` takes precedence over `level` when set. Calling this more than
/// once is harmless; later calls leave the first subscriber in place.
pub fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
