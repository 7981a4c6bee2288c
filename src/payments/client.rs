//! HTTP client for the payment gateway

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, warn};

use super::gateway::PaymentGateway;
use super::types::{InitiatePaymentRequest, PaymentParameters, SettlementStatus};
use crate::error::GatewayError;
use crate::logging::redact_sensitive_data;

#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_status(response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let body = redact_sensitive_data(&body);
        warn!(status = status.as_u16(), body = %body, "Gateway returned error status");
        Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn check_settlement(
        &self,
        transaction_code: &str,
    ) -> Result<SettlementStatus, GatewayError> {
        let url = self.url(&format!("/payments/{}/payment-status", transaction_code));
        debug!(transaction_code = %transaction_code, "Querying settlement status");

        let response = self.authorize(self.client.get(&url)).send().await?;
        let response = Self::check_status(response).await?;
        response
            .json::<SettlementStatus>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn mark_expired(&self, transaction_code: &str) -> Result<(), GatewayError> {
        let url = self.url(&format!("/payments/{}/expired", transaction_code));
        debug!(transaction_code = %transaction_code, "Marking payment expired");

        let response = self.authorize(self.client.patch(&url)).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn initiate(
        &self,
        request: &InitiatePaymentRequest,
    ) -> Result<PaymentParameters, GatewayError> {
        let url = self.url("/payments/init");
        debug!(course_id = %request.course_id, amount = request.amount, "Initiating payment");

        let response = self
            .authorize(self.client.post(&url).json(request))
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let params = response
            .json::<PaymentParameters>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        params
            .validate()
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(params)
    }
}
