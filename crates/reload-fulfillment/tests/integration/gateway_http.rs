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

//! The HTTP gateway client against a local axum stub of the transaction API.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use reload_fulfillment::{
    BulkFulfillment, BulkRequest, DtOneConfig, DtOneGateway, ExternalId, GatewayError,
    LineItem, MemoryStore, TransactionGateway,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use url::Url;

use crate::fixtures::FAST_CONFIG;

const EXPECTED_AUTH: &str = "Basic dXNlcjpzZWNyZXQ=";

#[derive(Default)]
struct Stub {
    /// Statuses to answer create calls with, in order. Empty means 201.
    create_responses: Mutex<VecDeque<StatusCode>>,
    /// Authorization header and body of every create call.
    creates: Mutex<Vec<(Option<String>, Value)>>,
    /// Every transaction the stub knows, returned by every lookup.
    transactions: Mutex<Vec<Value>>,
    next_id: AtomicI64,
}

impl Stub {
    fn respond_with(self, statuses: &[StatusCode]) -> Self {
        self.create_responses.lock().extend(statuses.iter().copied());
        self
    }
}

async fn create(
    State(stub): State<Arc<Stub>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    stub.creates.lock().push((auth, body.clone()));

    let status = stub
        .create_responses
        .lock()
        .pop_front()
        .unwrap_or(StatusCode::CREATED);
    if status.is_success() {
        let id = stub.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        stub.transactions.lock().push(json!({
            "id": id,
            "external_id": body["external_id"],
            "status": {"id": 70000, "message": "COMPLETED", "class": {"id": 7, "message": "COMPLETED"}},
            "pin": {"code": format!("PIN-{}", id), "serial": format!("SER-{}", id)},
            "operator_reference": format!("OP-{}", id),
            "creation_date": "2025-06-01T10:00:00Z",
            "confirmation_date": "2025-06-01T10:00:02Z"
        }));
    }
    (status, Json(json!({"message": status.to_string()})))
}

async fn fetch(
    State(stub): State<Arc<Stub>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.get("external_id").map(String::as_str) == Some("gone") {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(stub.transactions.lock().clone()).into_response()
}

async fn serve(stub: Arc<Stub>) -> Url {
    let app = Router::new()
        .route("/v1/async/transactions", post(create))
        .route("/v1/transactions", get(fetch))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}/v1", addr)).unwrap()
}

async fn client(stub: Arc<Stub>) -> DtOneGateway {
    let base_url = serve(stub).await;
    DtOneGateway::new(DtOneConfig::new(base_url, "user", "secret")).unwrap()
}

#[tokio::test]
async fn test_create_sends_basic_auth_and_body() {
    let stub = Arc::new(Stub::default());
    let gateway = client(stub.clone()).await;

    gateway
        .create_transaction(&ExternalId::from("ext-1"), 101, "+6281234567890")
        .await
        .unwrap();

    let creates = stub.creates.lock();
    assert_eq!(creates.len(), 1);
    let (auth, body) = &creates[0];
    assert_eq!(auth.as_deref(), Some(EXPECTED_AUTH));
    assert_eq!(body["external_id"], "ext-1");
    assert_eq!(body["product_id"], 101);
    assert_eq!(body["auto_confirm"], true);
    assert_eq!(body["credit_party_identifier"]["mobile_number"], "+6281234567890");
}

#[tokio::test]
async fn test_create_maps_error_statuses() {
    let stub = Arc::new(Stub::default().respond_with(&[
        StatusCode::TOO_MANY_REQUESTS,
        StatusCode::CONFLICT,
        StatusCode::BAD_REQUEST,
    ]));
    let gateway = client(stub).await;
    let ext = ExternalId::from("ext-2");

    assert_eq!(
        gateway.create_transaction(&ext, 1, "+1").await,
        Err(GatewayError::Throttled)
    );
    assert_eq!(
        gateway.create_transaction(&ext, 1, "+1").await,
        Err(GatewayError::Duplicate {
            external_id: "ext-2".to_string()
        })
    );
    match gateway.create_transaction(&ext, 1, "+1").await {
        Err(GatewayError::Rejected { status, message }) => {
            assert_eq!(status, 400);
            assert!(message.contains("400"));
        }
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_picks_matching_transaction() {
    let stub = Arc::new(Stub::default());
    let gateway = client(stub).await;

    gateway
        .create_transaction(&ExternalId::from("ext-a"), 1, "+1")
        .await
        .unwrap();
    gateway
        .create_transaction(&ExternalId::from("ext-b"), 2, "+1")
        .await
        .unwrap();

    let txn = gateway
        .fetch_transaction(&ExternalId::from("ext-b"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(txn.external_id.as_str(), "ext-b");
    assert!(txn.status.is_completed());
    assert_eq!(txn.settled_pin().unwrap().code, "PIN-2");
    assert_eq!(txn.operator_reference.as_deref(), Some("OP-2"));

    let unknown = gateway
        .fetch_transaction(&ExternalId::from("ext-z"))
        .await
        .unwrap();
    assert!(unknown.is_none());

    let gone = gateway
        .fetch_transaction(&ExternalId::from("gone"))
        .await
        .unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
async fn test_unreachable_gateway_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base_url = Url::parse(&format!("http://{}/v1", addr)).unwrap();
    let gateway = DtOneGateway::new(DtOneConfig::new(base_url, "user", "secret")).unwrap();
    let result = gateway
        .create_transaction(&ExternalId::from("ext-3"), 1, "+1")
        .await;
    assert!(matches!(result, Err(GatewayError::Transport(_))));
}

#[tokio::test]
async fn test_pipeline_over_http() {
    let stub = Arc::new(Stub::default().respond_with(&[StatusCode::TOO_MANY_REQUESTS]));
    let gateway = Arc::new(client(stub.clone()).await);
    let store = Arc::new(MemoryStore::new());
    let fulfillment = BulkFulfillment::new(FAST_CONFIG.clone(), gateway, store);

    let report = fulfillment
        .submit(BulkRequest::new("+6281234567890", vec![LineItem::new(101, 3)]))
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(report.succeeded, 3);
    assert!(report.permanent_failures.is_empty());
    let creates = stub.creates.lock();
    assert_eq!(creates.len(), 4);
    assert!(creates
        .iter()
        .all(|(auth, _)| auth.as_deref() == Some(EXPECTED_AUTH)));
    assert_eq!(stub.transactions.lock().len(), 3);
}
