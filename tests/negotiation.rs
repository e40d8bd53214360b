//! x402 pay-and-retry against a loopback paywall.

use alloy::primitives::{hex, TxHash};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::header::{HeaderMap, HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use reap_agent::builder::types::COMMERCE_BATCH_ENDPOINT;
use reap_agent::chain::Receipt;
use reap_agent::x402::{
    ChallengeError, NegotiationError, NegotiationOutcome, PaymentNegotiator, ResourcePurchaser,
};
use reap_agent::AgentError;

mod common;
use common::{agent, spawn_server, wire_intent, Behavior, MockGateway};

const PAY_LABEL: &str = "Pay Resource";
const CHALLENGE: &str = r#"reap-protocol resource_id="r9", realm="premium""#;

#[derive(Clone, Default)]
struct Paywall {
    challenge: Option<&'static str>,
    /// Unrelated challenge sent in its own header ahead of `challenge`.
    lead_challenge: Option<&'static str>,
    accept_proof: bool,
    /// Authorization header and body of every paywalled request.
    seen: Arc<Mutex<Vec<(Option<String>, String)>>>,
    purchases: Arc<Mutex<Vec<Value>>>,
}

impl Paywall {
    fn new(challenge: Option<&'static str>, accept_proof: bool) -> Self {
        Self {
            challenge,
            accept_proof,
            ..Self::default()
        }
    }

    fn with_lead_challenge(mut self, lead: &'static str) -> Self {
        self.lead_challenge = Some(lead);
        self
    }

    fn auth_headers(&self) -> Vec<Option<String>> {
        self.seen.lock().unwrap().iter().map(|(a, _)| a.clone()).collect()
    }

    fn purchase_count(&self) -> usize {
        self.purchases.lock().unwrap().len()
    }

    async fn serve(&self) -> SocketAddr {
        let app = Router::new()
            .route("/content", any(paywalled))
            .route("/free", get(|| async { "free content" }))
            .route(COMMERCE_BATCH_ENDPOINT, post(commerce))
            .with_state(self.clone());
        spawn_server(app).await
    }
}

async fn paywalled(State(wall): State<Paywall>, headers: HeaderMap, body: String) -> Response {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    wall.seen.lock().unwrap().push((auth.clone(), body));

    let has_proof = auth.as_deref().is_some_and(|a| a.starts_with("X402-Proof 0x"));
    if wall.accept_proof && has_proof {
        return (StatusCode::OK, "premium content").into_response();
    }

    let mut response = (StatusCode::PAYMENT_REQUIRED, "payment required").into_response();
    for challenge in [wall.lead_challenge, wall.challenge].into_iter().flatten() {
        response
            .headers_mut()
            .append(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
    }
    response
}

async fn commerce(State(wall): State<Paywall>, Json(body): Json<Value>) -> Json<Value> {
    wall.purchases.lock().unwrap().push(body);
    Json(json!({ "status": "ok", "transactions": [wire_intent(PAY_LABEL)] }))
}

/// Purchaser with a canned answer.
struct FixedPurchaser {
    receipt: Option<Receipt>,
    calls: Mutex<Vec<String>>,
}

impl FixedPurchaser {
    fn new(receipt: Option<Receipt>) -> Self {
        Self {
            receipt,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ResourcePurchaser for FixedPurchaser {
    async fn purchase(&self, resource_id: &str) -> Result<Option<Receipt>, AgentError> {
        self.calls.lock().unwrap().push(resource_id.to_string());
        Ok(self.receipt.clone())
    }
}

fn receipt(byte: u8) -> Receipt {
    Receipt {
        transaction_hash: TxHash::repeat_byte(byte),
        status: 1,
        block_number: Some(1),
        gas_used: 21_000,
    }
}

#[tokio::test]
async fn test_pays_and_retries_with_proof() {
    let wall = Paywall::new(Some(CHALLENGE), true);
    let addr = wall.serve().await;
    let gateway = Arc::new(MockGateway::new(0));
    let agent = agent(&gateway, addr);

    let request = agent
        .http()
        .get(format!("http://{}/content", addr))
        .build()
        .unwrap();
    let negotiated = agent.fetch(request).await.unwrap();

    let paid_hash = gateway.broadcasts()[0].hash;

    match &negotiated.outcome {
        NegotiationOutcome::Paid { resource_id, proof } => {
            assert_eq!(resource_id, "r9");
            assert_eq!(proof.as_str(), hex::encode_prefixed(paid_hash));
            assert_eq!(
                wall.auth_headers(),
                vec![None, Some(proof.header_value())]
            );
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(gateway.broadcast_labels(), vec![PAY_LABEL]);
    assert_eq!(wall.purchases.lock().unwrap()[0]["product_ids"], json!(["r9"]));

    let response = negotiated.into_response();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "premium content");
}

#[tokio::test]
async fn test_challenge_in_second_header_is_paid() {
    let wall = Paywall::new(Some(CHALLENGE), true).with_lead_challenge(r#"Bearer realm="api""#);
    let addr = wall.serve().await;
    let gateway = Arc::new(MockGateway::new(0));
    let agent = agent(&gateway, addr);

    let request = agent
        .http()
        .get(format!("http://{}/content", addr))
        .build()
        .unwrap();
    let negotiated = agent.fetch(request).await.unwrap();

    assert!(matches!(
        &negotiated.outcome,
        NegotiationOutcome::Paid { resource_id, .. } if resource_id == "r9"
    ));
    assert_eq!(negotiated.response.status(), reqwest::StatusCode::OK);
    assert_eq!(wall.purchase_count(), 1);
}

#[tokio::test]
async fn test_retry_replays_body() {
    let wall = Paywall::new(Some(CHALLENGE), true);
    let addr = wall.serve().await;
    let gateway = Arc::new(MockGateway::new(0));
    let agent = agent(&gateway, addr);

    let request = agent
        .http()
        .post(format!("http://{}/content", addr))
        .body("query=lamps")
        .build()
        .unwrap();
    let negotiated = agent.fetch(request).await.unwrap();

    assert_eq!(negotiated.response.status(), reqwest::StatusCode::OK);
    let bodies: Vec<_> = wall.seen.lock().unwrap().iter().map(|(_, b)| b.clone()).collect();
    assert_eq!(bodies, vec!["query=lamps", "query=lamps"]);
}

#[tokio::test]
async fn test_second_402_is_returned_without_another_retry() {
    let wall = Paywall::new(Some(CHALLENGE), false);
    let addr = wall.serve().await;
    let gateway = Arc::new(MockGateway::new(0));
    let agent = agent(&gateway, addr);

    let request = agent
        .http()
        .get(format!("http://{}/content", addr))
        .build()
        .unwrap();
    let negotiated = agent.fetch(request).await.unwrap();

    assert_eq!(
        negotiated.response.status(),
        reqwest::StatusCode::PAYMENT_REQUIRED
    );
    assert!(matches!(negotiated.outcome, NegotiationOutcome::Paid { .. }));
    assert_eq!(wall.auth_headers().len(), 2);
    assert_eq!(wall.purchase_count(), 1);
}

#[tokio::test]
async fn test_malformed_challenge_returns_original_402() {
    let cases = [
        (Some(r#"reap-protocol realm="premium""#), ChallengeError::MissingResourceId),
        (Some(r#"reap-protocol resource_id="r9"#), ChallengeError::UnterminatedResourceId),
        (None, ChallengeError::MissingHeader),
    ];

    for (challenge, expected) in cases {
        let wall = Paywall::new(challenge, true);
        let addr = wall.serve().await;
        let purchaser = FixedPurchaser::new(Some(receipt(1)));
        let http = reqwest::Client::new();
        let negotiator = PaymentNegotiator::new(http.clone(), &purchaser);

        let request = http.get(format!("http://{}/content", addr)).build().unwrap();
        let negotiated = negotiator.fetch(request).await.unwrap();

        assert_eq!(
            negotiated.response.status(),
            reqwest::StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            negotiated.outcome,
            NegotiationOutcome::ChallengeRejected(expected)
        );
        assert!(purchaser.calls.lock().unwrap().is_empty());
        assert_eq!(wall.auth_headers(), vec![None]);
    }
}

#[tokio::test]
async fn test_non_402_passes_through() {
    let wall = Paywall::new(Some(CHALLENGE), true);
    let addr = wall.serve().await;
    let purchaser = FixedPurchaser::new(Some(receipt(1)));
    let http = reqwest::Client::new();
    let negotiator = PaymentNegotiator::new(http.clone(), &purchaser);

    let request = http.get(format!("http://{}/free", addr)).build().unwrap();
    let negotiated = negotiator.fetch(request).await.unwrap();

    assert_eq!(negotiated.outcome, NegotiationOutcome::NotRequired);
    assert_eq!(
        negotiated.into_response().text().await.unwrap(),
        "free content"
    );
    assert!(purchaser.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_purchase_failure_propagates() {
    let wall = Paywall::new(Some(CHALLENGE), true);
    let addr = wall.serve().await;
    let gateway = Arc::new(MockGateway::new(0).script(PAY_LABEL, Behavior::Revert));
    let agent = agent(&gateway, addr);

    let request = agent
        .http()
        .get(format!("http://{}/content", addr))
        .build()
        .unwrap();
    let err = agent.fetch(request).await.unwrap_err();

    match err {
        NegotiationError::Purchase {
            resource_id,
            source: AgentError::Execution(e),
        } => {
            assert_eq!(resource_id, "r9");
            assert_eq!(e.label(), Some(PAY_LABEL));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(wall.auth_headers(), vec![None]);
}

#[tokio::test]
async fn test_nothing_settled_is_an_error() {
    let wall = Paywall::new(Some(CHALLENGE), true);
    let addr = wall.serve().await;
    let purchaser = FixedPurchaser::new(None);
    let http = reqwest::Client::new();
    let negotiator = PaymentNegotiator::new(http.clone(), &purchaser);

    let request = http.get(format!("http://{}/content", addr)).build().unwrap();
    let err = negotiator.fetch(request).await.unwrap_err();

    assert!(matches!(
        err,
        NegotiationError::NothingSettled { resource_id } if resource_id == "r9"
    ));
    assert_eq!(*purchaser.calls.lock().unwrap(), vec!["r9"]);
    assert_eq!(wall.auth_headers().len(), 1);
}

#[tokio::test]
async fn test_proof_does_not_leak_into_later_fetches() {
    let wall = Paywall::new(Some(CHALLENGE), true);
    let addr = wall.serve().await;
    let purchaser = FixedPurchaser::new(Some(receipt(0xab)));
    let http = reqwest::Client::new();
    let negotiator = PaymentNegotiator::new(http.clone(), &purchaser);
    let url = format!("http://{}/content", addr);

    for _ in 0..2 {
        let request = http.get(&url).build().unwrap();
        let negotiated = negotiator.fetch(request).await.unwrap();
        assert_eq!(negotiated.response.status(), reqwest::StatusCode::OK);
    }

    let proof = format!("X402-Proof 0x{}", "ab".repeat(32));
    assert_eq!(
        wall.auth_headers(),
        vec![None, Some(proof.clone()), None, Some(proof)]
    );
}
