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

//! Error types for the bulk fulfillment pipeline.
//!
//! Errors are layered the same way the pipeline is:
//!
//! - [`GatewayError`] - failures talking to the external transaction gateway.
//!   These never escape a worker; they are turned into task failures.
//! - [`StoreError`] - failures of the persistent store. Inside a worker they
//!   fail the current step of one task; during order creation, dump or
//!   finalize they are terminal for the job.
//! - [`ValidationError`] - a bulk request that cannot be accepted.
//! - [`PipelineError`] - the terminal error of a whole job.

use thiserror::Error;

use crate::models::OrderId;

/// Errors returned by a [`TransactionGateway`](crate::gateway::TransactionGateway).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway asked us to slow down. Retried with exponential backoff.
    #[error("gateway throttled the request")]
    Throttled,

    /// A transaction with this external id already exists on the gateway.
    #[error("transaction with external id {external_id} already exists")]
    Duplicate { external_id: String },

    /// The gateway answered with a non-success status.
    #[error("gateway rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a response.
    #[error("gateway transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("failed to decode gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether this error is the gateway's explicit throttling signal.
    pub fn is_throttled(&self) -> bool {
        matches!(self, GatewayError::Throttled)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Errors returned by a [`ReloadStore`](crate::dal::ReloadStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    ConnectionPool(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("failed to serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid stored value in column {column}: {value}")]
    InvalidValue { column: &'static str, value: String },

    #[error("no order found for order id {0}")]
    OrderNotFound(OrderId),

    #[error("order {0} already exists")]
    OrderExists(OrderId),

    #[error("no pin dump found for order id {0}")]
    DumpNotFound(OrderId),
}

/// Reasons a bulk request is rejected before any work is dispatched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("recipient must not be empty")]
    EmptyRecipient,

    #[error("bulk request has no line items")]
    NoLineItems,

    #[error("line item {index} (product {product_id}) has zero quantity")]
    ZeroQuantity { index: usize, product_id: i64 },

    #[error("bulk request expands to {requested} tasks, limit is {limit}")]
    TooManyTasks { requested: u64, limit: u64 },
}

/// Terminal errors of a bulk fulfillment job.
///
/// Individual task failures are never reported here; they are accounted for
/// in the job's [`FulfillmentReport`](crate::runner::FulfillmentReport).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid bulk request: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to create order {order_id}: {source}")]
    OrderCreation {
        order_id: OrderId,
        #[source]
        source: StoreError,
    },

    #[error("failed to write pin dump for order {order_id}: {source}")]
    Dump {
        order_id: OrderId,
        #[source]
        source: StoreError,
    },

    #[error("failed to finalize pins for order {order_id}: {source}")]
    Finalize {
        order_id: OrderId,
        #[source]
        source: StoreError,
    },

    #[error(
        "pin conservation violated for order {order_id}: {total_tasks} tasks, \
         {pins} pins, {permanent_failures} permanent failures, {finalized} finalized"
    )]
    ConservationViolated {
        order_id: OrderId,
        total_tasks: usize,
        pins: usize,
        permanent_failures: usize,
        finalized: usize,
    },

    #[error("fulfillment job for order {order_id} aborted: {message}")]
    JobAborted { order_id: OrderId, message: String },
}
