//! Payment/refund ledger reads. Rows are written only by the webhook
//! reconciler; this service exposes lookups for handlers and admin tooling.

use crate::entities::{payment, refund, Payment, Refund};
use crate::errors::ServiceError;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
}

impl PaymentService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn normalized(mut payment: payment::Model) -> payment::Model {
        payment.amount = super::money(payment.amount);
        payment
    }

    fn normalized_refund(mut refund: refund::Model) -> refund::Model {
        refund.amount = super::money(refund.amount);
        refund
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> Result<payment::Model, ServiceError> {
        Payment::find_by_id(payment_id)
            .one(&*self.db)
            .await?
            .map(Self::normalized)
            .ok_or_else(|| ServiceError::NotFound("Payment not found".to_string()))
    }

    pub async fn list_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<payment::Model>, ServiceError> {
        Ok(Payment::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .order_by_desc(payment::Column::CreatedAt)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(Self::normalized)
            .collect())
    }

    pub async fn list_refunds(
        &self,
        payment_id: Uuid,
    ) -> Result<Vec<refund::Model>, ServiceError> {
        Ok(Refund::find()
            .filter(refund::Column::PaymentId.eq(payment_id))
            .order_by_desc(refund::Column::CreatedAt)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(Self::normalized_refund)
            .collect())
    }
}
