use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use solace_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::service::blocking;
use crate::state::AppState;

/// Tokens are not refreshable; clients sign in again after this.
pub const TOKEN_TTL_HOURS: i64 = 6;

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let name = req.name.trim().to_string();
    let email = req.email.trim().to_lowercase();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Name, email and password are required".into()));
    }
    if !email.contains('@') {
        return Err(ApiError::Validation("Email address is invalid".into()));
    }

    let db = state.db.clone();
    let user_id = Uuid::new_v4();
    let (stored_name, stored_email) = (name.clone(), email.clone());
    let created = blocking(move || {
        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
            .to_string();

        // The unique email index decides concurrent sign-ups.
        Ok(db.create_user(&user_id, &stored_name, &stored_email, &password_hash)?)
    })
    .await?;

    if !created {
        return Err(ApiError::Validation("Email already exists".into()));
    }
    info!(user_id = %user_id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user_id,
            name,
            email,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let email = req.email.trim().to_lowercase();

    let db = state.db.clone();
    let user = blocking(move || {
        let user = db.get_user_by_email(&email)?.ok_or(ApiError::InvalidCredentials)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|e| anyhow::anyhow!("stored hash for {} is corrupt: {}", user.id, e))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::InvalidCredentials)?;

        Ok(user)
    })
    .await?;

    let user = user.into_user()?;
    let token = create_token(&state.jwt_secret, user.id)?;

    Ok(Json(LoginResponse { token }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user = blocking(move || {
        db.get_user_by_id(&claims.sub)?
            .ok_or(ApiError::NotFound("User"))?
            .into_user()
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(user))
}

pub fn create_token(secret: &str, user_id: Uuid) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        exp: (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
