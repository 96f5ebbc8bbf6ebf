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

//! # Database Layer
//!
//! SQLite connection management for the durable store. The pool is a
//! `deadpool-diesel` pool of a single connection; SQLite serializes writers
//! anyway and one connection avoids "database is locked" errors under the
//! concurrent upserts of the worker pool. Schema changes ship as embedded
//! diesel migrations and are applied by [`Database::run_migrations`].

pub mod connection;
pub mod schema;

pub use connection::{Database, SqlitePool};

use diesel_migrations::{embed_migrations, EmbeddedMigrations};

/// Migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");
