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

//! Domain types shared by every stage of the pipeline.

mod bulk_request;
mod ids;
mod order;
mod pin;
mod reload_task;
mod transaction_record;

pub use bulk_request::{BulkRequest, LineItem};
pub use ids::{ExternalId, OrderId};
pub use order::{OrderRecord, OrderStatus};
pub use pin::{Pin, PinDump, PinItem};
pub use reload_task::ReloadTask;
pub use transaction_record::{TransactionRecord, TransactionStatus};
