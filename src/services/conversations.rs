//! Buyer/seller message threads about products.

use crate::entities::{conversation, message, Conversation, Message, Product};
use crate::errors::ServiceError;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct ConversationService {
    db: Arc<DatabaseConnection>,
}

impl ConversationService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists threads the user participates in, optionally for one product.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        product_id: Option<Uuid>,
    ) -> Result<Vec<conversation::Model>, ServiceError> {
        let mut query = Conversation::find().filter(
            Condition::any()
                .add(conversation::Column::BuyerId.eq(user_id))
                .add(conversation::Column::SellerId.eq(user_id)),
        );
        if let Some(product_id) = product_id {
            query = query.filter(conversation::Column::ProductId.eq(product_id));
        }
        Ok(query
            .order_by_desc(conversation::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Starts a thread with a product's seller, or returns the existing one.
    #[instrument(skip(self), fields(buyer_id = %buyer_id, product_id = %product_id))]
    pub async fn start_or_get(
        &self,
        buyer_id: Uuid,
        product_id: Uuid,
    ) -> Result<conversation::Model, ServiceError> {
        let product = Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

        if product.seller_id == buyer_id {
            return Err(ServiceError::InvalidOperation(
                "You cannot message yourself".to_string(),
            ));
        }

        let existing = Conversation::find()
            .filter(conversation::Column::BuyerId.eq(buyer_id))
            .filter(conversation::Column::SellerId.eq(product.seller_id))
            .filter(conversation::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;
        if let Some(thread) = existing {
            return Ok(thread);
        }

        let row = conversation::ActiveModel {
            id: Set(Uuid::new_v4()),
            buyer_id: Set(buyer_id),
            seller_id: Set(product.seller_id),
            product_id: Set(product_id),
            created_at: Set(Utc::now()),
        };
        Ok(row.insert(&*self.db).await?)
    }

    /// Loads a conversation the user participates in.
    async fn participant_thread(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<conversation::Model, ServiceError> {
        let thread = Conversation::find_by_id(conversation_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Conversation not found".to_string()))?;
        if thread.buyer_id != user_id && thread.seller_id != user_id {
            return Err(ServiceError::Forbidden(
                "You are not part of this conversation".to_string(),
            ));
        }
        Ok(thread)
    }

    /// Lists a thread's messages oldest-first; participants only.
    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<message::Model>, ServiceError> {
        self.participant_thread(conversation_id, user_id).await?;
        Ok(Message::find()
            .filter(message::Column::ConversationId.eq(conversation_id))
            .order_by_asc(message::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Appends a message; participants only.
    #[instrument(skip(self, body), fields(conversation_id = %conversation_id))]
    pub async fn send_message(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        body: String,
    ) -> Result<message::Model, ServiceError> {
        if body.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "Message body cannot be empty".to_string(),
            ));
        }
        self.participant_thread(conversation_id, sender_id).await?;

        let row = message::ActiveModel {
            id: Set(Uuid::new_v4()),
            conversation_id: Set(conversation_id),
            sender_id: Set(sender_id),
            body: Set(body),
            created_at: Set(Utc::now()),
        };
        Ok(row.insert(&*self.db).await?)
    }
}
