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

//! HTTP client for a DT One style transaction API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{GatewayTransaction, TransactionGateway};
use crate::error::GatewayError;
use crate::models::ExternalId;

const CREATE_PATH: &str = "async/transactions";
const FETCH_PATH: &str = "transactions";

/// Connection settings for [`DtOneGateway`].
#[derive(Debug, Clone)]
pub struct DtOneConfig {
    pub base_url: Url,
    pub username: String,
    pub password: String,
    pub request_timeout: Duration,
}

impl DtOneConfig {
    pub fn new(base_url: Url, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url,
            username: username.into(),
            password: password.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct CreditPartyIdentifier<'a> {
    mobile_number: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateTransactionBody<'a> {
    external_id: &'a str,
    product_id: i64,
    auto_confirm: bool,
    credit_party_identifier: CreditPartyIdentifier<'a>,
}

/// [`TransactionGateway`] backed by the DT One HTTP API, using basic auth.
#[derive(Debug, Clone)]
pub struct DtOneGateway {
    http_client: reqwest::Client,
    config: DtOneConfig,
}

impl DtOneGateway {
    pub fn new(config: DtOneConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        // Url::join drops the last segment of a base without a trailing slash.
        let mut base = self.config.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(path)
            .map_err(|e| GatewayError::Transport(format!("invalid gateway url: {}", e)))
    }

    async fn error_from_response(
        response: reqwest::Response,
        external_id: &ExternalId,
    ) -> GatewayError {
        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => GatewayError::Throttled,
            StatusCode::CONFLICT => GatewayError::Duplicate {
                external_id: external_id.to_string(),
            },
            _ => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
                GatewayError::Rejected {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

#[async_trait]
impl TransactionGateway for DtOneGateway {
    async fn create_transaction(
        &self,
        external_id: &ExternalId,
        product_id: i64,
        recipient: &str,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(CREATE_PATH)?;
        let body = CreateTransactionBody {
            external_id: external_id.as_str(),
            product_id,
            auto_confirm: true,
            credit_party_identifier: CreditPartyIdentifier {
                mobile_number: recipient,
            },
        };

        debug!(external_id = %external_id, product_id, "creating gateway transaction");
        let response = self
            .http_client
            .post(url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        let err = Self::error_from_response(response, external_id).await;
        if !err.is_throttled() {
            warn!(external_id = %external_id, product_id, error = %err, "gateway rejected create");
        }
        Err(err)
    }

    async fn fetch_transaction(
        &self,
        external_id: &ExternalId,
    ) -> Result<Option<GatewayTransaction>, GatewayError> {
        let url = self.endpoint(FETCH_PATH)?;
        let response = self
            .http_client
            .get(url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .query(&[("external_id", external_id.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from_response(response, external_id).await);
        }

        let transactions: Vec<GatewayTransaction> = response.json().await?;
        Ok(transactions
            .into_iter()
            .find(|txn| &txn.external_id == external_id))
    }
}
