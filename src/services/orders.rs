//! Order engine: converts a cart into an order inside one transaction.
//! Stock reservation uses a guarded relative decrement so concurrent
//! checkouts of the last unit cannot both succeed.

use crate::entities::{
    cart_item, order, order_item, product, CartItem, Order, OrderItem, Product,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Order with its line snapshots, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    fn normalized(mut order: order::Model) -> order::Model {
        order.total_amount = super::money(order.total_amount);
        order
    }

    fn normalized_item(mut item: order_item::Model) -> order_item::Model {
        item.price_at_purchase = super::money(item.price_at_purchase);
        item
    }

    /// Converts the user's cart into a pending order.
    ///
    /// Order insert, item snapshots, stock decrements and cart clearing all
    /// share one transaction; any failure rolls the whole conversion back.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create_from_cart(&self, user_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let lines = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Cannot create an order from an empty cart".to_string(),
            ));
        }

        let mut resolved = Vec::with_capacity(lines.len());
        for (line, product) in lines {
            let product = product.ok_or_else(|| {
                ServiceError::InternalError("cart line references missing product".to_string())
            })?;
            if product.status != product::ProductStatus::Available {
                return Err(ServiceError::InvalidOperation(format!(
                    "'{}' is no longer available",
                    product.title
                )));
            }
            resolved.push((line, product));
        }

        let txn = self.db.begin().await?;
        let now = Utc::now();

        // Reserve stock with a guarded relative decrement. Zero rows
        // affected means another order took the stock first.
        for (line, product) in &resolved {
            if product.stock.is_none() {
                continue;
            }
            let result = Product::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(line.quantity),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                .filter(product::Column::Id.eq(product.id))
                .filter(product::Column::Stock.is_not_null())
                .filter(product::Column::Stock.gte(line.quantity))
                .exec(&txn)
                .await?;
            if result.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "Not enough stock for '{}'",
                    product.title
                )));
            }
        }

        let total: Decimal = super::money(
            resolved
                .iter()
                .map(|(line, product)| product.price * Decimal::from(line.quantity))
                .sum(),
        );

        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            total_amount: Set(total),
            status: Set(order::OrderStatus::Pending),
            payment_status: Set(order::PaymentStatus::Pending),
            idempotency_key: Set(Uuid::new_v4().to_string()),
            stripe_session_id: Set(None),
            stripe_payment_intent_id: Set(None),
            paid_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&txn).await?;

        let mut items = Vec::with_capacity(resolved.len());
        for (line, product) in &resolved {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_name: Set(product.title.clone()),
                quantity: Set(line.quantity),
                price_at_purchase: Set(super::money(product.price)),
                created_at: Set(now),
            };
            items.push(Self::normalized_item(item.insert(&txn).await?));
        }

        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(order_id = %order_id, total = %total, "order created");
        self.events.send(Event::OrderCreated(order_id)).await;

        Ok(OrderWithItems {
            order: Self::normalized(order),
            items,
        })
    }

    /// Fetches an order with its items. Non-admin callers only see their own.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;
        if !is_admin && order.user_id != user_id {
            // Hide the order's existence from other users
            return Err(ServiceError::NotFound("Order not found".to_string()));
        }
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(Self::normalized_item)
            .collect();
        Ok(OrderWithItems {
            order: Self::normalized(order),
            items,
        })
    }

    /// Lists the caller's own orders, newest first.
    pub async fn list_my_orders(&self, user_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(Self::normalized)
            .collect())
    }

    /// Admin listing, paginated.
    pub async fn list_all_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let per_page = per_page.clamp(1, 100);
        let paginator = Order::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders.into_iter().map(Self::normalized).collect(), total))
    }

    /// Admin status override.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        status: order::OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let old_status = order.status;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.events
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: format!("{old_status:?}").to_lowercase(),
                new_status: format!("{status:?}").to_lowercase(),
            })
            .await;
        Ok(Self::normalized(updated))
    }
}
