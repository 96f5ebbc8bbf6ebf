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

//! Diesel table definitions for the SQLite store.

diesel::table! {
    reload_transactions (external_id) {
        external_id -> Text,
        order_id -> Text,
        product_id -> BigInt,
        recipient -> Text,
        status -> Text,
        gateway_transaction_id -> Nullable<BigInt>,
        operator_reference -> Nullable<Text>,
        pin_code -> Nullable<Text>,
        pin_serial -> Nullable<Text>,
        create_attempts -> Integer,
        last_error -> Nullable<Text>,
        created_at -> Text,
        submitted_at -> Nullable<Text>,
        confirmed_at -> Nullable<Text>,
        updated_at -> Text,
    }
}

diesel::table! {
    pin_dumps (id) {
        id -> BigInt,
        order_id -> Text,
        pins -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    orders (order_id) {
        order_id -> Text,
        recipient -> Text,
        requested_quantity -> BigInt,
        status -> Text,
        pins -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(reload_transactions, pin_dumps, orders);
