//! Adapter for the external payment gateway.
//!
//! The gateway is an opaque provider with two touch points: a checkout session
//! is initialized over HTTPS, and the outcome arrives later as a webhook.
//! Services only see the [`PaymentGateway`] trait so tests can swap in a fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::AppError;

/// One checkout attempt for an order.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub order_id: Uuid,
    /// Price in minor currency units (agorot, cents).
    pub amount_minor: i64,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Opaque reference the gateway echoes back in its webhook.
    pub reference: String,
    pub authorization_url: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Non-2xx answer. The body is kept verbatim for the caller.
    #[error("gateway rejected the request with status {status}")]
    Rejected { status: u16, body: String },
    #[error("gateway unreachable: {0}")]
    Unreachable(String),
    #[error("unexpected gateway response: {0}")]
    Malformed(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Rejected { status, body } => AppError::Gateway { status, body },
            GatewayError::Unreachable(msg) => AppError::GatewayUnavailable(msg),
            GatewayError::Malformed(msg) => AppError::GatewayUnavailable(msg),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a checkout session. Called at most once per request; never retried.
    async fn initialize(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError>;
}

/// Inbound webhook body: `{"data": {"reference": ..., "status": ...}}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookPayload {
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookData {
    pub reference: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    amount: String,
    currency: &'a str,
    email: &'a str,
    callback_url: &'a str,
    webhook_url: &'a str,
    metadata: InitializeMetadata,
}

#[derive(Debug, Serialize)]
struct InitializeMetadata {
    order_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    data: InitializeData,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    reference: String,
    authorization_url: String,
}

/// HTTP client for the gateway's REST API.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initialize(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let url = format!("{}/transaction/initialize", self.config.api_url);
        let body = InitializeBody {
            amount: request.amount_minor.to_string(),
            currency: &self.config.currency,
            email: &request.email,
            callback_url: &self.config.callback_url,
            webhook_url: &self.config.webhook_url,
            metadata: InitializeMetadata {
                order_id: request.order_id,
            },
        };

        tracing::debug!("Initializing checkout for order {}", request.order_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: InitializeResponse =
            serde_json::from_str(&text).map_err(|e| GatewayError::Malformed(e.to_string()))?;

        Ok(CheckoutSession {
            reference: parsed.data.reference,
            authorization_url: parsed.data.authorization_url,
        })
    }
}
