//! Authentication and authorization: JWT issuance/validation, argon2
//! password hashing, and router middleware that puts an [`AuthUser`]
//! principal into request extensions.

use crate::entities::user::{self, UserRole};
use crate::errors::ServiceError;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::{self, Next},
    response::Response,
    Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claim structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated principal, extracted from a verified token and stored in
/// request extensions by [`auth_middleware`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Access + refresh token pair returned on login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Issues JWTs and verifies passwords. Cloneable; shared via `AppState`.
#[derive(Clone)]
pub struct AuthService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_expiration_secs: u64,
    refresh_expiration_secs: u64,
}

impl AuthService {
    pub fn new(jwt_secret: &str, access_expiration_secs: u64, refresh_expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            access_expiration_secs,
            refresh_expiration_secs,
        }
    }

    /// Generates an access/refresh token pair for a user.
    pub fn generate_tokens(&self, user: &user::Model) -> Result<TokenPair, ServiceError> {
        let access_token = self.sign_token(user, self.access_expiration_secs)?;
        let refresh_token = self.sign_token(user, self.refresh_expiration_secs)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_expiration_secs,
        })
    }

    fn sign_token(&self, user: &user::Model, ttl_secs: u64) -> Result<String, ServiceError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: match user.role {
                UserRole::Admin => "admin".to_string(),
                UserRole::User => "user".to_string(),
            },
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs as i64)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::InternalError(format!("token signing failed: {e}")))
    }

    /// Validates a token and extracts the principal.
    pub fn verify_token(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|_| ServiceError::Unauthorized("invalid or expired token".to_string()))?;
        let user_id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServiceError::Unauthorized("invalid token subject".to_string()))?;
        Ok(AuthUser {
            user_id,
            email: data.claims.email,
            role: data.claims.role,
        })
    }
}

/// Hashes a password with argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {e}")))
}

/// Verifies a password against a stored argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ServiceError::InternalError(format!("corrupt password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Requires a valid bearer token; inserts [`AuthUser`] into extensions.
pub async fn auth_middleware(
    State(auth): State<AuthService>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = bearer_token(&req)
        .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;
    let auth_user = auth.verify_token(token)?;
    req.extensions_mut().insert(auth_user);
    Ok(next.run(req).await)
}

/// Requires the authenticated principal to carry a specific role.
/// Must run after [`auth_middleware`].
pub async fn require_role(role: &'static str, req: Request, next: Next) -> Result<Response, ServiceError> {
    let auth_user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ServiceError::Unauthorized("missing authentication".to_string()))?;
    if auth_user.role != role {
        return Err(ServiceError::Forbidden(format!("requires role '{role}'")));
    }
    Ok(next.run(req).await)
}

/// Router extension for attaching auth layers in route definitions.
pub trait AuthRouterExt {
    /// Requires a valid token on every route.
    fn with_auth(self, auth: AuthService) -> Self;
    /// Requires a valid token carrying `role` on every route.
    fn with_role(self, auth: AuthService, role: &'static str) -> Self;
}

impl<S> AuthRouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self, auth: AuthService) -> Self {
        self.layer(middleware::from_fn_with_state(auth, auth_middleware))
    }

    fn with_role(self, auth: AuthService, role: &'static str) -> Self {
        self.layer(middleware::from_fn(move |req, next| {
            require_role(role, req, next)
        }))
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
    }
}
