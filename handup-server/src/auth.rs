//! Identity component and access-control gate.
//!
//! Registration and login issue a signed, time-limited bearer token
//! (JWT, HS256, process-wide secret); every mutating route resolves that
//! token back to a live user through the [`Identity`] extractor before the
//! lifecycle engine runs. Passwords are stored only as argon2id hashes.
//! There is no revocation list: logout is client-side token discard.

use std::sync::Arc;

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use handup_proto::user::{LoginRequest, RegisterRequest, User, UserId, UserProfile};

use crate::error::ApiError;
use crate::server::AppState;
use crate::store::{UserStore, UserStoreError};

/// Default credential validity in days.
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;

/// JWT claims: subject user id plus issue and expiry times.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issues and verifies credentials against the user store.
pub struct AuthService {
    users: Arc<UserStore>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_ttl_days: i64,
}

impl AuthService {
    /// Creates an auth service signing tokens with `secret`.
    #[must_use]
    pub fn new(users: Arc<UserStore>, secret: &str, token_ttl_days: i64) -> Self {
        Self {
            users,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl_days,
        }
    }

    /// Registers a new account and returns a signed token plus the public
    /// profile.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] on missing fields or duplicate email;
    /// [`ApiError::Internal`] if password hashing fails.
    pub async fn register(
        &self,
        request: RegisterRequest,
    ) -> Result<(String, UserProfile), ApiError> {
        let name = require_field(request.name, "name")?;
        let email = require_field(request.email, "email")?;
        let password = require_field(request.password, "password")?;

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            name,
            email,
            password_hash: hash_password(&password)?,
            created_at: now,
            updated_at: now,
        };
        let profile = UserProfile::from(&user);
        let id = user.id;

        self.users.insert(user).await.map_err(|e| match e {
            UserStoreError::DuplicateEmail => {
                ApiError::Validation("Email already registered".to_string())
            }
        })?;

        tracing::info!(user_id = %id, "user registered");
        let token = self.issue_token(&id)?;
        Ok((token, profile))
    }

    /// Verifies credentials and returns a fresh token plus the public
    /// profile.
    ///
    /// # Errors
    ///
    /// [`ApiError::Authentication`] on unknown email or password mismatch;
    /// the message does not reveal which of the two failed.
    pub async fn login(&self, request: LoginRequest) -> Result<(String, UserProfile), ApiError> {
        let email = require_field(request.email, "email")?;
        let password = require_field(request.password, "password")?;

        let invalid = || ApiError::Authentication("Invalid credentials".to_string());
        let user = self.users.find_by_email(&email).await.ok_or_else(invalid)?;
        if !verify_password(&password, &user.password_hash) {
            return Err(invalid());
        }

        tracing::info!(user_id = %user.id, "user logged in");
        let token = self.issue_token(&user.id)?;
        Ok((token, UserProfile::from(&user)))
    }

    /// Resolves a bearer token to the live user it names.
    ///
    /// # Errors
    ///
    /// [`ApiError::Authentication`] if the token is malformed, expired,
    /// or the subject user no longer exists.
    pub async fn verify_token(&self, token: &str) -> Result<User, ApiError> {
        let invalid = || ApiError::Authentication("Not authorized - invalid token".to_string());

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                invalid()
            })?;
        let uuid = Uuid::parse_str(&data.claims.sub).map_err(|_| invalid())?;

        self.users.get(&UserId::from_uuid(uuid)).await.ok_or_else(|| {
            ApiError::Authentication("User belonging to this token no longer exists".to_string())
        })
    }

    /// Signs a token for the given user, valid for the configured TTL.
    fn issue_token(&self, user_id: &UserId) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(self.token_ttl_days)).timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }
}

/// Hashes a password with argon2id and a fresh random salt.
fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
}

/// Checks a password against a stored argon2 hash.
fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Rejects a missing or empty request field with a validation error.
fn require_field(value: Option<String>, name: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ApiError::Validation(format!("Missing required field: {name}"))),
    }
}

/// The caller's resolved identity, threaded explicitly into every
/// authenticated operation.
pub struct Identity(pub User);

impl axum::extract::FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            ApiError::Authentication("Not authorized - no token provided".to_string())
        })?;
        let user = state.auth.verify_token(token).await?;
        Ok(Self(user))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
