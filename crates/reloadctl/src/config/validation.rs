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

use url::Url;

use crate::config::types::*;
use crate::config::ValidationError;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for ReloadctlConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors: Vec<ValidationError> = [
            self.database.validate(),
            self.gateway.validate(),
            self.fulfillment.validate(),
            self.logging.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple { errors }),
        }
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let path = self.url.strip_prefix("sqlite://").unwrap_or(&self.url);
        if path.trim().is_empty() || self.url.starts_with("postgres") {
            return Err(ValidationError::InvalidDatabaseUrl {
                url: self.url.clone(),
            });
        }
        Ok(())
    }
}

impl Validate for GatewayConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason,
        };
        let url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::Zero {
                field: "gateway.request_timeout_secs",
            });
        }
        Ok(())
    }
}

impl Validate for FulfillmentSection {
    fn validate(&self) -> Result<(), ValidationError> {
        let checks: [(&'static str, Option<u64>); 6] = [
            ("fulfillment.workers", self.workers.map(|v| v as u64)),
            (
                "fulfillment.task_queue_capacity",
                self.task_queue_capacity.map(|v| v as u64),
            ),
            (
                "fulfillment.create_rate_limit",
                self.create_rate_limit.map(u64::from),
            ),
            (
                "fulfillment.create_rate_interval_ms",
                self.create_rate_interval_ms,
            ),
            (
                "fulfillment.create_retry.max_attempts",
                self.create_retry.max_attempts.map(u64::from),
            ),
            (
                "fulfillment.fetch_retry.max_attempts",
                self.fetch_retry.max_attempts.map(u64::from),
            ),
        ];
        match checks.iter().find(|(_, value)| *value == Some(0)) {
            Some((field, _)) => Err(ValidationError::Zero { field: *field }),
            None => Ok(()),
        }
    }
}

impl Validate for LoggingConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            Ok(())
        } else {
            Err(ValidationError::InvalidLogLevel {
                level: self.level.clone(),
            })
        }
    }
}
