//! Webhook reconciler: verifies processor signatures, then applies payment
//! state transitions. Every branch is idempotent (upsert keyed on the
//! payment intent id) and guarded against out-of-order delivery via the
//! event's `created` timestamp. Unknown references are acknowledged
//! without effect so the processor stops redelivering them.

use crate::entities::{
    order, payment, refund, Order, Payment,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::payment_gateway::PaymentGateway;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Webhook envelope as delivered by the processor.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Unix timestamp the processor created the event; drives the
    /// out-of-order guard.
    pub created: i64,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// Converts a minor-unit integer amount to a major-unit Decimal.
fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Constant-time byte comparison for signature digests.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Verifies a `Stripe-Signature` style header (`t=...,v1=...`) against the
/// raw request body. The signed message is `{t}.{body}`.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    tolerance_secs: u64,
    now: i64,
) -> Result<(), ServiceError> {
    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| ServiceError::InvalidSignature("missing timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(ServiceError::InvalidSignature(
            "missing v1 signature".to_string(),
        ));
    }
    if (now - timestamp).unsigned_abs() > tolerance_secs {
        return Err(ServiceError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InternalError("invalid webhook secret".to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    if candidates
        .iter()
        .any(|c| constant_time_eq(c.as_bytes(), expected.as_bytes()))
    {
        Ok(())
    } else {
        Err(ServiceError::InvalidSignature(
            "signature mismatch".to_string(),
        ))
    }
}

#[derive(Clone)]
pub struct WebhookService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    events: EventSender,
    secret: String,
    tolerance_secs: u64,
}

impl WebhookService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
        secret: String,
        tolerance_secs: u64,
    ) -> Self {
        Self {
            db,
            gateway,
            events,
            secret,
            tolerance_secs,
        }
    }

    /// Verifies the signature and processes the event. Signature failure
    /// returns before any state is read or written.
    #[instrument(skip_all)]
    pub async fn handle(&self, payload: &[u8], signature_header: &str) -> Result<(), ServiceError> {
        verify_signature(
            &self.secret,
            payload,
            signature_header,
            self.tolerance_secs,
            Utc::now().timestamp(),
        )?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::InvalidInput(format!("malformed event payload: {e}")))?;
        self.process(event).await
    }

    /// Dispatches a verified event to its transition branch.
    pub async fn process(&self, event: WebhookEvent) -> Result<(), ServiceError> {
        info!(event_id = %event.id, event_type = %event.event_type, "processing webhook event");
        match event.event_type.as_str() {
            "checkout.session.completed" => self.on_session_completed(&event).await,
            "payment_intent.succeeded" => {
                self.on_intent_transition(&event, payment::PaymentState::Succeeded)
                    .await
            }
            "payment_intent.payment_failed" => {
                self.on_intent_transition(&event, payment::PaymentState::Failed)
                    .await
            }
            "charge.refunded" => self.on_charge_refunded(&event).await,
            other => {
                info!(event_type = %other, "ignoring unhandled event type");
                Ok(())
            }
        }
    }

    fn object_str<'a>(event: &'a WebhookEvent, key: &str) -> Option<&'a str> {
        event.data.object.get(key)?.as_str()
    }

    /// Checks the out-of-order guard for an existing payment row: a
    /// transition older than the last applied one must not be applied.
    fn is_stale(existing: Option<&payment::Model>, event_created: i64) -> bool {
        existing
            .and_then(|p| p.last_event_at)
            .map(|last| event_created < last)
            .unwrap_or(false)
    }

    async fn on_session_completed(&self, event: &WebhookEvent) -> Result<(), ServiceError> {
        let Some(order_id) = event
            .data
            .object
            .get("metadata")
            .and_then(|m| m.get("order_id"))
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            warn!("completed session without order metadata, ignoring");
            return Ok(());
        };
        let Some(intent_id) = Self::object_str(event, "payment_intent").map(str::to_owned) else {
            warn!("completed session without payment intent, ignoring");
            return Ok(());
        };

        let Some(order) = Order::find_by_id(order_id).one(&*self.db).await? else {
            warn!(%order_id, "completed session references unknown order, ignoring");
            return Ok(());
        };

        let amount = event
            .data
            .object
            .get("amount_total")
            .and_then(|v| v.as_i64())
            .map(from_minor_units)
            .unwrap_or_else(|| super::money(order.total_amount));
        let currency = Self::object_str(event, "currency")
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| "USD".to_string());

        // Resolve the charge id before opening the transaction; a gateway
        // failure here surfaces as 5xx so the processor redelivers.
        let charge_id = self
            .gateway
            .retrieve_payment_intent(&intent_id)
            .await?
            .latest_charge;

        let txn = self.db.begin().await?;

        let existing = Payment::find()
            .filter(payment::Column::StripePaymentIntentId.eq(intent_id.as_str()))
            .one(&txn)
            .await?;
        if Self::is_stale(existing.as_ref(), event.created) {
            info!(event_id = %event.id, "stale event, acknowledged without effect");
            return Ok(());
        }

        let now = Utc::now();
        let mut active: order::ActiveModel = order.into();
        active.status = Set(order::OrderStatus::Paid);
        active.payment_status = Set(order::PaymentStatus::Succeeded);
        active.stripe_payment_intent_id = Set(Some(intent_id.clone()));
        active.paid_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        // Duplicate deliveries converge on the unique intent id.
        let row = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            amount: Set(amount),
            currency: Set(currency),
            stripe_payment_intent_id: Set(intent_id),
            stripe_charge_id: Set(charge_id),
            status: Set(payment::PaymentState::Succeeded),
            last_event_at: Set(Some(event.created)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Payment::insert(row)
            .on_conflict(
                OnConflict::column(payment::Column::StripePaymentIntentId)
                    .update_columns([
                        payment::Column::Status,
                        payment::Column::StripeChargeId,
                        payment::Column::Amount,
                        payment::Column::Currency,
                        payment::Column::LastEventAt,
                        payment::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.events
            .send(Event::PaymentSucceeded { order_id, amount })
            .await;
        Ok(())
    }

    /// Shared branch for `payment_intent.succeeded` / `payment_failed`.
    /// Transitions the payment row only; the order settles via the
    /// session-completed and refund branches. A missing payment row means
    /// the session-completed event has not arrived (or never will); the
    /// event is acknowledged without effect.
    async fn on_intent_transition(
        &self,
        event: &WebhookEvent,
        state: payment::PaymentState,
    ) -> Result<(), ServiceError> {
        let Some(intent_id) = Self::object_str(event, "id") else {
            warn!("payment intent event without id, ignoring");
            return Ok(());
        };
        let event_charge = Self::object_str(event, "latest_charge").map(str::to_owned);

        let txn = self.db.begin().await?;

        let Some(existing) = Payment::find()
            .filter(payment::Column::StripePaymentIntentId.eq(intent_id))
            .one(&txn)
            .await?
        else {
            info!(%intent_id, "intent event references unknown payment, ignoring");
            return Ok(());
        };
        if Self::is_stale(Some(&existing), event.created) {
            info!(event_id = %event.id, "stale event, acknowledged without effect");
            return Ok(());
        }

        // The session-completed retrieval can run before the intent has a
        // charge; the intent event backfills it so refunds (looked up by
        // charge id) still resolve.
        let charge_id = event_charge.or_else(|| existing.stripe_charge_id.clone());

        let now = Utc::now();
        let mut active: payment::ActiveModel = existing.into();
        active.status = Set(state);
        active.stripe_charge_id = Set(charge_id);
        active.last_event_at = Set(Some(event.created));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        txn.commit().await?;

        if state == payment::PaymentState::Failed {
            self.events
                .send(Event::PaymentFailed {
                    payment_intent_id: intent_id.to_string(),
                })
                .await;
        }
        Ok(())
    }

    async fn on_charge_refunded(&self, event: &WebhookEvent) -> Result<(), ServiceError> {
        let Some(charge_id) = Self::object_str(event, "id") else {
            warn!("charge event without id, ignoring");
            return Ok(());
        };

        let txn = self.db.begin().await?;

        let Some(existing) = Payment::find()
            .filter(payment::Column::StripeChargeId.eq(charge_id))
            .one(&txn)
            .await?
        else {
            info!(%charge_id, "refund references unknown charge, ignoring");
            return Ok(());
        };
        if Self::is_stale(Some(&existing), event.created) {
            info!(event_id = %event.id, "stale event, acknowledged without effect");
            return Ok(());
        }

        // Zero/absent amount_refunded means a full refund.
        let amount = event
            .data
            .object
            .get("amount_refunded")
            .and_then(|v| v.as_i64())
            .filter(|minor| *minor > 0)
            .map(from_minor_units)
            .unwrap_or_else(|| super::money(existing.amount));
        let refund_id = event
            .data
            .object
            .get("refunds")
            .and_then(|r| r.get("data"))
            .and_then(|d| d.get(0))
            .and_then(|r| r.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_owned);

        let payment_id = existing.id;
        let order_id = existing.order_id;
        let currency = existing.currency.clone();
        let now = Utc::now();

        self.record_refund(&txn, &existing, amount, currency, refund_id, now)
            .await?;

        let mut active: payment::ActiveModel = existing.into();
        active.status = Set(payment::PaymentState::Refunded);
        active.last_event_at = Set(Some(event.created));
        active.updated_at = Set(now);
        active.update(&txn).await?;

        if let Some(order) = Order::find_by_id(order_id).one(&txn).await? {
            let mut active: order::ActiveModel = order.into();
            active.status = Set(order::OrderStatus::Refunded);
            active.payment_status = Set(order::PaymentStatus::Refunded);
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }

        txn.commit().await?;

        self.events
            .send(Event::PaymentRefunded { payment_id, amount })
            .await;
        Ok(())
    }

    async fn record_refund(
        &self,
        txn: &DatabaseTransaction,
        payment: &payment::Model,
        amount: Decimal,
        currency: String,
        stripe_refund_id: Option<String>,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let row = refund::ActiveModel {
            id: Set(Uuid::new_v4()),
            payment_id: Set(payment.id),
            amount: Set(amount),
            currency: Set(currency),
            reason: Set(None),
            stripe_refund_id: Set(stripe_refund_id),
            status: Set(refund::RefundStatus::Succeeded),
            created_at: Set(now),
        };
        row.insert(txn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_accepted() {
        let now = 1_700_000_000;
        let payload = br#"{"id":"evt_1"}"#;
        let sig = sign("whsec_test", now, payload);
        let header = format!("t={now},v1={sig}");
        assert!(verify_signature("whsec_test", payload, &header, 300, now).is_ok());
    }

    #[test]
    fn wrong_secret_rejected() {
        let now = 1_700_000_000;
        let payload = br#"{"id":"evt_1"}"#;
        let sig = sign("whsec_other", now, payload);
        let header = format!("t={now},v1={sig}");
        let err = verify_signature("whsec_test", payload, &header, 300, now).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSignature(_)));
    }

    #[test]
    fn tampered_payload_rejected() {
        let now = 1_700_000_000;
        let sig = sign("whsec_test", now, br#"{"id":"evt_1"}"#);
        let header = format!("t={now},v1={sig}");
        let err =
            verify_signature("whsec_test", br#"{"id":"evt_2"}"#, &header, 300, now).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSignature(_)));
    }

    #[test]
    fn stale_timestamp_rejected() {
        let created = 1_700_000_000;
        let payload = br#"{}"#;
        let sig = sign("whsec_test", created, payload);
        let header = format!("t={created},v1={sig}");
        let err = verify_signature("whsec_test", payload, &header, 300, created + 301).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidSignature(_)));
    }

    #[test]
    fn malformed_header_rejected() {
        assert!(verify_signature("whsec_test", b"{}", "nonsense", 300, 0).is_err());
        assert!(verify_signature("whsec_test", b"{}", "t=notanumber,v1=aa", 300, 0).is_err());
        assert!(verify_signature("whsec_test", b"{}", "t=0", 300, 0).is_err());
    }

    #[test]
    fn multiple_v1_candidates_any_match() {
        // Processors send extra v1 entries after secret rotation
        let now = 1_700_000_000;
        let payload = br#"{"id":"evt_1"}"#;
        let good = sign("whsec_test", now, payload);
        let header = format!("t={now},v1=deadbeef,v1={good}");
        assert!(verify_signature("whsec_test", payload, &header, 300, now).is_ok());
    }

    #[test]
    fn minor_units_to_decimal() {
        assert_eq!(from_minor_units(2000), dec!(20.00));
        assert_eq!(from_minor_units(1), dec!(0.01));
        assert_eq!(from_minor_units(0), Decimal::ZERO);
    }

    #[test]
    fn event_payload_parses() {
        let raw = br#"{
            "id": "evt_123",
            "type": "checkout.session.completed",
            "created": 1700000000,
            "data": {"object": {"id": "cs_1", "payment_intent": "pi_1",
                     "amount_total": 2000, "currency": "usd",
                     "metadata": {"order_id": "7e7f6c8e-0000-0000-0000-000000000000"}}}
        }"#;
        let event: WebhookEvent = serde_json::from_slice(raw).unwrap();
        assert_eq!(event.event_type, "checkout.session.completed");
        assert_eq!(event.created, 1_700_000_000);
        assert_eq!(
            event.data.object["payment_intent"].as_str().unwrap(),
            "pi_1"
        );
    }

    #[test]
    fn stale_guard() {
        use chrono::Utc;
        let p = payment::Model {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            amount: dec!(20.00),
            currency: "USD".into(),
            stripe_payment_intent_id: "pi_1".into(),
            stripe_charge_id: None,
            status: payment::PaymentState::Succeeded,
            last_event_at: Some(100),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(WebhookService::is_stale(Some(&p), 99));
        assert!(!WebhookService::is_stale(Some(&p), 100));
        assert!(!WebhookService::is_stale(Some(&p), 101));
        assert!(!WebhookService::is_stale(None, 0));
    }
}
