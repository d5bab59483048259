//! Outbound payment processor client. Services depend on the
//! [`PaymentGateway`] trait; the Stripe implementation talks to the
//! hosted-checkout API over HTTPS with form-encoded bodies.

use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// One hosted-checkout line item. `unit_amount` is in currency minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    pub description: Option<String>,
    pub unit_amount: i64,
    pub quantity: i64,
}

/// Parameters for creating a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub order_id: String,
    pub currency: String,
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    /// Processor-side dedupe key; retried calls with the same key return
    /// the original session instead of creating another.
    pub idempotency_key: String,
}

/// Hosted checkout session as returned by the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Payment intent detail; used to resolve the charge id after completion.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub latest_charge: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<CheckoutSession, ServiceError>;

    async fn retrieve_payment_intent(&self, intent_id: &str)
        -> Result<PaymentIntent, ServiceError>;
}

/// Stripe REST implementation.
pub struct StripeGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(
        base_url: String,
        secret_key: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url,
            secret_key,
        })
    }

    fn session_form(params: &CreateSessionParams) -> Vec<(String, String)> {
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), params.success_url.clone()),
            ("cancel_url".to_string(), params.cancel_url.clone()),
            (
                "metadata[order_id]".to_string(),
                params.order_id.clone(),
            ),
        ];
        for (i, item) in params.line_items.iter().enumerate() {
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                params.currency.to_lowercase(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                item.name.clone(),
            ));
            if let Some(desc) = &item.description {
                form.push((
                    format!("line_items[{i}][price_data][product_data][description]"),
                    desc.clone(),
                ));
            }
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                item.unit_amount.to_string(),
            ));
            form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
        }
        form
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "payment processor returned {status}: {body}"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("malformed response: {e}")))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, params), fields(order_id = %params.order_id))]
    async fn create_checkout_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<CheckoutSession, ServiceError> {
        debug!(items = params.line_items.len(), "creating checkout session");
        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", &params.idempotency_key)
            .form(&Self::session_form(&params))
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("request failed: {e}")))?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn retrieve_payment_intent(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let response = self
            .client
            .get(format!("{}/payment_intents/{intent_id}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("request failed: {e}")))?;
        Self::decode(response).await
    }
}
