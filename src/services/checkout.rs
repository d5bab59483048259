//! Checkout session broker: builds hosted-checkout line items from an
//! order's snapshots and hands the order's idempotency key to the gateway
//! so retried calls collapse into one session.

use crate::config::AppConfig;
use crate::entities::{order, order_item, Order, OrderItem};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::payment_gateway::{
    CheckoutLineItem, CheckoutSession, CreateSessionParams, PaymentGateway,
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Converts a major-unit Decimal amount to currency minor units.
/// Amounts with sub-cent precision are rejected rather than rounded.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    let minor = amount * Decimal::from(100);
    if !minor.fract().is_zero() {
        return Err(ServiceError::InvalidInput(format!(
            "amount {amount} has sub-cent precision"
        )));
    }
    minor
        .to_i64()
        .ok_or_else(|| ServiceError::InvalidInput(format!("amount {amount} out of range")))
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    events: EventSender,
    success_url: String,
    cancel_url: String,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            gateway,
            events,
            success_url: config.checkout_success_url.clone(),
            cancel_url: config.checkout_cancel_url.clone(),
            currency: config.default_currency.clone(),
        }
    }

    /// Creates (or re-requests) a hosted checkout session for a pending
    /// order. The only local write is persisting the returned session id;
    /// a gateway failure leaves the order untouched.
    #[instrument(skip(self), fields(order_id = %order_id, user_id = %user_id))]
    pub async fn create_session(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<CheckoutSession, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if order.status != order::OrderStatus::Pending {
            return Err(ServiceError::InvalidOperation(format!(
                "Order is not awaiting payment (status: {:?})",
                order.status
            )));
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        if items.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Order has no items".to_string(),
            ));
        }

        let mut line_items = Vec::with_capacity(items.len());
        for item in &items {
            line_items.push(CheckoutLineItem {
                name: item.product_name.clone(),
                description: None,
                unit_amount: to_minor_units(item.price_at_purchase)?,
                quantity: i64::from(item.quantity),
            });
        }

        let session = self
            .gateway
            .create_checkout_session(CreateSessionParams {
                order_id: order.id.to_string(),
                currency: self.currency.clone(),
                line_items,
                success_url: self.success_url.clone(),
                cancel_url: self.cancel_url.clone(),
                idempotency_key: order.idempotency_key.clone(),
            })
            .await?;

        let mut active: order::ActiveModel = order.into();
        active.stripe_session_id = Set(Some(session.id.clone()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(session_id = %session.id, "checkout session created");
        self.events
            .send(Event::CheckoutSessionCreated {
                order_id,
                session_id: session.id.clone(),
            })
            .await;

        Ok(session)
    }
}
