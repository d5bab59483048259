//! Catalog store: public filtered listing plus seller-scoped CRUD.

use crate::entities::{product, Product};
use crate::errors::ServiceError;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Listing filters; all optional, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub seller_id: Option<Uuid>,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Default)]
pub struct NewProduct {
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

/// Partial update; `None` leaves the field unchanged. `stock` and other
/// nullable columns use a double Option so "set to NULL" stays expressible.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
    pub stock: Option<Option<i32>>,
    pub status: Option<product::ProductStatus>,
    pub category: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
}

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn normalized(mut product: product::Model) -> product::Model {
        product.price = super::money(product.price);
        product
    }

    /// Public listing: available products matching the filters, paginated.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: ProductFilter,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut query =
            Product::find().filter(product::Column::Status.eq(product::ProductStatus::Available));
        if let Some(category) = &filter.category {
            query = query.filter(product::Column::Category.eq(category.as_str()));
        }
        if let Some(min) = filter.min_price {
            query = query.filter(product::Column::Price.gte(min));
        }
        if let Some(max) = filter.max_price {
            query = query.filter(product::Column::Price.lte(max));
        }
        if let Some(seller_id) = filter.seller_id {
            query = query.filter(product::Column::SellerId.eq(seller_id));
        }

        let per_page = filter.per_page.clamp(1, 100);
        let paginator = query
            .order_by_desc(product::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(filter.page.saturating_sub(1)).await?;
        Ok((products.into_iter().map(Self::normalized).collect(), total))
    }

    pub async fn get(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .map(Self::normalized)
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }

    #[instrument(skip(self, input), fields(seller_id = %seller_id))]
    pub async fn create(
        &self,
        seller_id: Uuid,
        input: NewProduct,
    ) -> Result<product::Model, ServiceError> {
        if input.price < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Price cannot be negative".to_string(),
            ));
        }
        if matches!(input.stock, Some(s) if s < 0) {
            return Err(ServiceError::InvalidInput(
                "Stock cannot be negative".to_string(),
            ));
        }
        let now = Utc::now();
        let row = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            seller_id: Set(seller_id),
            title: Set(input.title),
            description: Set(input.description),
            price: Set(input.price),
            stock: Set(input.stock),
            status: Set(product::ProductStatus::Available),
            category: Set(input.category),
            image_url: Set(input.image_url),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(Self::normalized(row.insert(&*self.db).await?))
    }

    /// Loads a product and checks the caller may manage it.
    async fn owned_product(
        &self,
        product_id: Uuid,
        caller_id: Uuid,
        is_admin: bool,
    ) -> Result<product::Model, ServiceError> {
        let product = self.get(product_id).await?;
        if !is_admin && product.seller_id != caller_id {
            return Err(ServiceError::Forbidden(
                "You do not own this product".to_string(),
            ));
        }
        Ok(product)
    }

    #[instrument(skip(self, update), fields(product_id = %product_id))]
    pub async fn update(
        &self,
        product_id: Uuid,
        caller_id: Uuid,
        is_admin: bool,
        update: ProductUpdate,
    ) -> Result<product::Model, ServiceError> {
        let product = self.owned_product(product_id, caller_id, is_admin).await?;

        if matches!(update.price, Some(p) if p < Decimal::ZERO) {
            return Err(ServiceError::InvalidInput(
                "Price cannot be negative".to_string(),
            ));
        }
        if matches!(update.stock, Some(Some(s)) if s < 0) {
            return Err(ServiceError::InvalidInput(
                "Stock cannot be negative".to_string(),
            ));
        }

        let mut active: product::ActiveModel = product.into();
        if let Some(title) = update.title {
            active.title = Set(title);
        }
        if let Some(description) = update.description {
            active.description = Set(description);
        }
        if let Some(price) = update.price {
            active.price = Set(price);
        }
        if let Some(stock) = update.stock {
            active.stock = Set(stock);
        }
        if let Some(status) = update.status {
            active.status = Set(status);
        }
        if let Some(category) = update.category {
            active.category = Set(category);
        }
        if let Some(image_url) = update.image_url {
            active.image_url = Set(image_url);
        }
        active.updated_at = Set(Utc::now());
        Ok(Self::normalized(active.update(&*self.db).await?))
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete(
        &self,
        product_id: Uuid,
        caller_id: Uuid,
        is_admin: bool,
    ) -> Result<(), ServiceError> {
        let product = self.owned_product(product_id, caller_id, is_admin).await?;
        Product::delete_by_id(product.id).exec(&*self.db).await?;
        Ok(())
    }
}
