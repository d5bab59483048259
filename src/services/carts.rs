//! Cart aggregation: one open cart per user, stored as (user, product)
//! rows. Business-rule checks happen before any write.

use crate::entities::{cart_item, product, CartItem, Product};
use crate::errors::ServiceError;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// One cart line joined with its product, plus the Decimal line total.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total: Decimal,
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Loads a product and applies the purchasability rules shared by
    /// add and update.
    async fn purchasable_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        if product.status != product::ProductStatus::Available {
            return Err(ServiceError::InvalidOperation(
                "Product is not available for purchase".to_string(),
            ));
        }
        if product.seller_id == user_id {
            return Err(ServiceError::InvalidOperation(
                "You cannot purchase your own product".to_string(),
            ));
        }
        Ok(product)
    }

    fn ensure_stock(product: &product::Model, requested: i32) -> Result<(), ServiceError> {
        // NULL stock means untracked quantity
        if let Some(stock) = product.stock {
            if requested > stock {
                return Err(ServiceError::InsufficientStock(format!(
                    "Only {} unit(s) of '{}' available",
                    stock, product.title
                )));
            }
        }
        Ok(())
    }

    /// Adds a product to the user's cart, merging with an existing line.
    /// The stock check covers the merged quantity.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let product = self.purchasable_product(user_id, product_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;

        let now = Utc::now();
        match existing {
            Some(line) => {
                let merged = line.quantity + quantity;
                Self::ensure_stock(&product, merged)?;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(merged);
                active.updated_at = Set(now);
                Ok(active.update(&*self.db).await?)
            }
            None => {
                Self::ensure_stock(&product, quantity)?;
                let line = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                Ok(line.insert(&*self.db).await?)
            }
        }
    }

    /// Replaces the quantity of an existing cart line.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let line = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;

        let product = self.purchasable_product(user_id, product_id).await?;
        Self::ensure_stock(&product, quantity)?;

        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    /// Removes a cart line.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove_item(&self, user_id: Uuid, product_id: Uuid) -> Result<(), ServiceError> {
        let line = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))?;
        CartItem::delete_by_id(line.id).exec(&*self.db).await?;
        Ok(())
    }

    /// Lists the cart joined with current product data and the Decimal
    /// grand total (Σ price × quantity).
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_with_total(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        let mut total = Decimal::ZERO;
        for (line, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError("cart line references missing product".to_string())
            })?;
            let quantity = Decimal::from(line.quantity);
            let line_total = super::money(product.price * quantity);
            total += line_total;
            items.push(CartLine {
                product_id: product.id,
                title: product.title,
                unit_price: super::money(product.price),
                quantity: line.quantity,
                line_total,
                image_url: product.image_url,
            });
        }
        Ok(CartView {
            items,
            total: super::money(total),
        })
    }
}
