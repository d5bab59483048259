//! Product reviews: filtered listing plus author-scoped writes.

use crate::entities::{review, Product, Review};
use crate::errors::ServiceError;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct ReviewFilter {
    pub product_id: Option<Uuid>,
    pub min_rating: Option<i32>,
    pub max_rating: Option<i32>,
}

fn validate_rating(rating: i32) -> Result<(), ServiceError> {
    if !(1..=5).contains(&rating) {
        return Err(ServiceError::ValidationError(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: ReviewFilter) -> Result<Vec<review::Model>, ServiceError> {
        let mut query = Review::find();
        if let Some(product_id) = filter.product_id {
            query = query.filter(review::Column::ProductId.eq(product_id));
        }
        if let Some(min) = filter.min_rating {
            query = query.filter(review::Column::Rating.gte(min));
        }
        if let Some(max) = filter.max_rating {
            query = query.filter(review::Column::Rating.lte(max));
        }
        Ok(query
            .order_by_desc(review::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, comment), fields(product_id = %product_id, user_id = %user_id))]
    pub async fn add(
        &self,
        product_id: Uuid,
        user_id: Uuid,
        rating: i32,
        comment: Option<String>,
    ) -> Result<review::Model, ServiceError> {
        validate_rating(rating)?;
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        let now = Utc::now();
        let row = review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            user_id: Set(user_id),
            rating: Set(rating),
            comment: Set(comment),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(row.insert(&*self.db).await?)
    }

    /// Loads a review and checks the caller wrote it.
    async fn owned_review(
        &self,
        review_id: Uuid,
        user_id: Uuid,
    ) -> Result<review::Model, ServiceError> {
        let review = Review::find_by_id(review_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Review not found".to_string()))?;
        if review.user_id != user_id {
            return Err(ServiceError::Forbidden(
                "You can only modify your own reviews".to_string(),
            ));
        }
        Ok(review)
    }

    #[instrument(skip(self, comment), fields(review_id = %review_id))]
    pub async fn update(
        &self,
        review_id: Uuid,
        user_id: Uuid,
        rating: Option<i32>,
        comment: Option<Option<String>>,
    ) -> Result<review::Model, ServiceError> {
        if let Some(r) = rating {
            validate_rating(r)?;
        }
        let review = self.owned_review(review_id, user_id).await?;
        let mut active: review::ActiveModel = review.into();
        if let Some(r) = rating {
            active.rating = Set(r);
        }
        if let Some(c) = comment {
            active.comment = Set(c);
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    pub async fn delete(&self, review_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        let review = self.owned_review(review_id, user_id).await?;
        Review::delete_by_id(review.id).exec(&*self.db).await?;
        Ok(())
    }
}
