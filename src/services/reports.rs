//! Product reports: anyone can file one, administrators triage them.

use crate::entities::{report, Product, Report};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    #[instrument(skip(self, reason), fields(product_id = %product_id, reporter_id = %reporter_id))]
    pub async fn create(
        &self,
        product_id: Uuid,
        reporter_id: Uuid,
        reason: String,
    ) -> Result<report::Model, ServiceError> {
        if reason.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "A reason is required".to_string(),
            ));
        }
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let now = Utc::now();
        let row = report::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            reporter_id: Set(reporter_id),
            reason: Set(reason),
            resolved: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = row.insert(&*self.db).await?;

        self.events
            .send(Event::ProductReported {
                product_id,
                report_id: created.id,
            })
            .await;
        Ok(created)
    }

    /// Admin listing; `resolved` filters by triage state when given.
    pub async fn list(&self, resolved: Option<bool>) -> Result<Vec<report::Model>, ServiceError> {
        let mut query = Report::find();
        if let Some(resolved) = resolved {
            query = query.filter(report::Column::Resolved.eq(resolved));
        }
        Ok(query
            .order_by_desc(report::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, report_id: Uuid) -> Result<report::Model, ServiceError> {
        Report::find_by_id(report_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Report not found".to_string()))
    }

    #[instrument(skip(self), fields(report_id = %report_id))]
    pub async fn resolve(&self, report_id: Uuid) -> Result<report::Model, ServiceError> {
        let report = self.get(report_id).await?;
        let mut active: report::ActiveModel = report.into();
        active.resolved = Set(true);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete(&self, report_id: Uuid) -> Result<(), ServiceError> {
        let report = self.get(report_id).await?;
        Report::delete_by_id(report.id).exec(&*self.db).await?;
        Ok(())
    }
}
