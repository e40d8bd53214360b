//! HTTP client for the transaction builder service.

use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::builder::types::BuilderResponse;
use crate::config::schema::BuilderConfig;

/// Errors returned by the builder service or while reaching it.
#[derive(Debug, Error)]
pub enum BuilderError {
    /// The service answered with a non-200 status.
    #[error("Reap Protocol Error: {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Builder request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid builder response: {0}")]
    Decode(String),

    #[error("Invalid builder URL: {0}")]
    InvalidUrl(String),
}

pub type BuilderResult<T> = Result<T, BuilderError>;

/// Client for the `/build/*` and `/read/*` endpoints.
#[derive(Debug, Clone)]
pub struct BuilderClient {
    client: Client,
    base_url: String,
    /// Injected into every build payload when known.
    chain_id: Option<u64>,
}

impl BuilderClient {
    pub fn new(config: &BuilderConfig) -> BuilderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        url::Url::parse(&config.base_url)
            .map_err(|e| BuilderError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chain_id: None,
        })
    }

    /// Tag build payloads with the chain the agent is signing for.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `payload` to a build endpoint and decode the envelope.
    pub async fn call<P>(&self, endpoint: &str, payload: &P) -> BuilderResult<BuilderResponse>
    where
        P: Serialize + ?Sized,
    {
        let mut body =
            serde_json::to_value(payload).map_err(|e| BuilderError::Decode(e.to_string()))?;
        if let (Some(chain_id), Some(fields)) = (self.chain_id, body.as_object_mut()) {
            fields
                .entry("chain_id")
                .or_insert_with(|| Value::from(chain_id));
        }

        tracing::debug!(endpoint, "Calling builder");
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .json(&body)
            .send()
            .await?;

        let text = ensure_ok(response).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| BuilderError::Decode(e.to_string()))
    }

    /// Read-only product lookup; the id is escaped as a single path segment.
    pub async fn get_product(&self, product_id: &str) -> BuilderResult<Value> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| BuilderError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BuilderError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(["read", "product", product_id]);

        let response = self.client.get(url).send().await?;
        let text = ensure_ok(response).await?.text().await?;
        serde_json::from_str(&text).map_err(|e| BuilderError::Decode(e.to_string()))
    }
}

async fn ensure_ok(response: Response) -> BuilderResult<Response> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(&body);
    tracing::warn!(status = status.as_u16(), detail = %detail, "Builder rejected request");
    Err(BuilderError::Rejected {
        status: status.as_u16(),
        detail,
    })
}

/// The `detail` field of a JSON error body, else the raw body.
pub fn extract_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(fields)) => match fields.get("detail") {
            Some(Value::String(detail)) => detail.clone(),
            Some(Value::Null) | None => body.to_string(),
            Some(other) => other.to_string(),
        },
        _ => body.to_string(),
    }
}
