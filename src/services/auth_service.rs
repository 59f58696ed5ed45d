use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse},
    error::{AppError, AppResult},
    middleware::auth::ROLE_CUSTOMER,
    models::{Customer, User},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Create the login account and the customer profile in one transaction.
pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<RegisterResponse>> {
    let RegisterRequest {
        username,
        password,
        name,
        phone,
        address,
        id_card,
    } = payload;

    if username.trim().is_empty() || password.is_empty() {
        return Err(AppError::InvalidArgument(
            "Username and password are required".into(),
        ));
    }

    let taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(username.as_str())
        .fetch_optional(&state.pool)
        .await?;
    if taken.is_some() {
        return Err(AppError::InvalidArgument(
            "Username is already taken".into(),
        ));
    }

    let card_taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM customers WHERE id_card = $1")
        .bind(id_card.as_str())
        .fetch_optional(&state.pool)
        .await?;
    if card_taken.is_some() {
        return Err(AppError::InvalidArgument(
            "Id card is already registered".into(),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();

    let mut txn = state.pool.begin().await?;

    let user: User = sqlx::query_as(
        "INSERT INTO users (id, username, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(username.as_str())
    .bind(password_hash)
    .bind(ROLE_CUSTOMER)
    .fetch_one(&mut *txn)
    .await?;

    let customer_id = Uuid::new_v4();
    let (created_at, updated_at): (DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
        r#"
        INSERT INTO customers (id, user_id, name, phone, address, id_card, money)
        VALUES ($1, $2, $3, $4, $5, $6, 0)
        RETURNING created_at, updated_at
        "#,
    )
    .bind(customer_id)
    .bind(user.id)
    .bind(name.as_str())
    .bind(phone.as_str())
    .bind(address.as_str())
    .bind(id_card.as_str())
    .fetch_one(&mut *txn)
    .await?;

    txn.commit().await?;

    let customer = Customer {
        id: customer_id,
        user_id: user.id,
        username: user.username.clone(),
        name,
        phone,
        address,
        id_card,
        money: Decimal::ZERO,
        created_at,
        updated_at,
    };

    if let Err(err) = log_audit(
        state,
        Some(user.id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id, "customer_id": customer.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "User created",
        RegisterResponse { user, customer },
        None,
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { username, password } = payload;
    let user: Option<User> = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username.as_str())
        .fetch_optional(&state.pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => {
            return Err(AppError::InvalidArgument(
                "Invalid username or password".into(),
            ));
        }
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::InvalidArgument(
            "Invalid username or password".into(),
        ));
    }

    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    let customer_id: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM customers WHERE user_id = $1")
            .bind(user.id)
            .fetch_optional(&state.pool)
            .await?;

    let resp = LoginResponse {
        token: format!("Bearer {}", token),
        role: user.role.clone(),
        customer_id: customer_id.map(|(id,)| id),
    };

    if let Err(err) = log_audit(
        state,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}
