//! User accounts: registration, login, logout, password changes.

use crate::auth::{self, AuthService, TokenPair};
use crate::entities::{user, User};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    auth: AuthService,
    events: EventSender,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, auth: AuthService, events: EventSender) -> Self {
        Self { db, auth, events }
    }

    /// Registers a new account. Duplicate email is a Conflict.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        email: String,
        password: String,
        name: String,
    ) -> Result<user::Model, ServiceError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::InvalidInput(
                "A valid email address is required".to_string(),
            ));
        }
        if password.len() < 8 {
            return Err(ServiceError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let existing = User::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let now = Utc::now();
        let row = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            password_hash: Set(auth::hash_password(&password)?),
            name: Set(name),
            role: Set(user::UserRole::User),
            refresh_token: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = row.insert(&*self.db).await?;

        info!(user_id = %created.id, "user registered");
        self.events.send(Event::UserRegistered(created.id)).await;
        Ok(created)
    }

    /// Verifies credentials and issues a token pair. The refresh token is
    /// stored so logout can revoke it.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(user::Model, TokenPair), ServiceError> {
        let email = email.trim().to_lowercase();
        let user = User::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid credentials".to_string()))?;

        if !auth::verify_password(password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        }

        let tokens = self.auth.generate_tokens(&user)?;
        let mut active: user::ActiveModel = user.clone().into();
        active.refresh_token = Set(Some(tokens.refresh_token.clone()));
        active.updated_at = Set(Utc::now());
        let user = active.update(&*self.db).await?;

        Ok((user, tokens))
    }

    /// Clears the stored refresh token.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let user = self.get_profile(user_id).await?;
        let mut active: user::ActiveModel = user.into();
        active.refresh_token = Set(None);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }

    /// Changes the password after verifying the current one, and revokes
    /// the refresh token.
    #[instrument(skip(self, current_password, new_password), fields(user_id = %user_id))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        if new_password.len() < 8 {
            return Err(ServiceError::ValidationError(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        let user = self.get_profile(user_id).await?;
        if !auth::verify_password(current_password, &user.password_hash)? {
            return Err(ServiceError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(auth::hash_password(new_password)?);
        active.refresh_token = Set(None);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        User::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }
}
