use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::{OsRng, RngCore};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit::{self, AuditAction},
    config::AppConfig,
    dto::auth::{
        AuthResponse, Claims, ForgotPasswordRequest, LoginRequest, MessageResponse,
        ResetPasswordRequest, SignupRequest, UpdateProfileRequest,
    },
    error::{AppError, AppResult},
    models::{Profile, User, UserSummary},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If a user with this email exists, a password reset link has been sent";
const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

pub async fn signup(
    state: &AppState,
    payload: SignupRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    payload.validate()?;
    let SignupRequest {
        email,
        password,
        first_name,
        last_name,
    } = payload;
    let email = normalize_email(&email);

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(&state.pool)
        .await?;

    if exist.is_some() {
        return Err(AppError::Conflict("Email already exists".to_string()));
    }

    let password_hash = hash_password(&password)?;

    // The unique index still guards against a concurrent signup with the same email.
    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, first_name, last_name)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email.as_str())
    .bind(password_hash)
    .bind(first_name.trim())
    .bind(last_name.trim())
    .fetch_one(&state.pool)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict("Email already exists".to_string())
        }
        other => AppError::DbError(other),
    })?;

    audit::record(
        &state.orm,
        Some(user.id),
        AuditAction::UserSignup,
        serde_json::json!({ "user_id": user.id }),
    )
    .await;
    tracing::info!(user_id = %user.id, "user signed up");

    let access_token = issue_token(&state.config, &user)?;
    Ok(ApiResponse::success(
        "User created",
        AuthResponse {
            access_token,
            user: UserSummary::from(user),
        },
        Some(Meta::empty()),
    ))
}

pub async fn login(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    payload.validate()?;
    let LoginRequest { email, password } = payload;
    let user: Option<User> = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(normalize_email(&email))
        .fetch_optional(&state.pool)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into())),
    };

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let access_token = issue_token(&state.config, &user)?;

    audit::record(
        &state.orm,
        Some(user.id),
        AuditAction::UserLogin,
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        AuthResponse {
            access_token,
            user: UserSummary::from(user),
        },
        Some(Meta::empty()),
    ))
}

pub async fn forgot_password(
    state: &AppState,
    payload: ForgotPasswordRequest,
) -> AppResult<ApiResponse<MessageResponse>> {
    payload.validate()?;
    let email = normalize_email(&payload.email);
    let token = generate_reset_token();
    let expiry = Utc::now() + Duration::minutes(state.config.reset_token_ttl_minutes);

    let updated: Option<(Uuid,)> = sqlx::query_as(
        r#"
        UPDATE users
        SET reset_token = $2, reset_token_expiry = $3, updated_at = now()
        WHERE email = $1
        RETURNING id
        "#,
    )
    .bind(email.as_str())
    .bind(token.as_str())
    .bind(expiry)
    .fetch_optional(&state.pool)
    .await?;

    match updated {
        Some((user_id,)) => {
            // No mail transport: the link goes to the log instead.
            tracing::info!(
                %user_id,
                reset_link = %state.config.reset_link(&token),
                "password reset requested"
            );
            audit::record(
                &state.orm,
                Some(user_id),
                AuditAction::PasswordResetRequested,
                serde_json::json!({ "user_id": user_id }),
            )
            .await;
        }
        None => tracing::debug!("password reset requested for unknown email"),
    }

    Ok(ApiResponse::success(
        "OK",
        MessageResponse {
            message: FORGOT_PASSWORD_MESSAGE.into(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn reset_password(
    state: &AppState,
    payload: ResetPasswordRequest,
) -> AppResult<ApiResponse<MessageResponse>> {
    payload.validate()?;
    let password_hash = hash_password(&payload.new_password)?;

    // Match, check expiry and clear in one statement so a token can only be spent once.
    let updated: Option<(Uuid,)> = sqlx::query_as(
        r#"
        UPDATE users
        SET password_hash = $2, reset_token = NULL, reset_token_expiry = NULL, updated_at = now()
        WHERE reset_token = $1 AND reset_token_expiry > now()
        RETURNING id
        "#,
    )
    .bind(payload.token.as_str())
    .bind(password_hash)
    .fetch_optional(&state.pool)
    .await?;

    let (user_id,) = updated.ok_or_else(|| AppError::BadRequest(INVALID_RESET_TOKEN.into()))?;

    audit::record(
        &state.orm,
        Some(user_id),
        AuditAction::PasswordReset,
        serde_json::json!({ "user_id": user_id }),
    )
    .await;
    tracing::info!(%user_id, "password reset completed");

    Ok(ApiResponse::success(
        "OK",
        MessageResponse {
            message: "Password successfully reset".into(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_profile(state: &AppState, user_id: Uuid) -> AppResult<ApiResponse<Profile>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("Profile", Profile::from(user), None))
}

pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<Profile>> {
    payload.validate()?;
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            address = CASE WHEN $4::text IS NULL THEN address ELSE NULLIF(BTRIM($4), '') END,
            phone = CASE WHEN $5::text IS NULL THEN phone ELSE NULLIF(BTRIM($5), '') END,
            bio = CASE WHEN $6::text IS NULL THEN bio ELSE NULLIF(BTRIM($6), '') END,
            avatar = CASE WHEN $7::text IS NULL THEN avatar ELSE NULLIF(BTRIM($7), '') END,
            updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(payload.first_name.as_deref().map(str::trim))
    .bind(payload.last_name.as_deref().map(str::trim))
    .bind(payload.address)
    .bind(payload.phone)
    .bind(payload.bio)
    .bind(payload.avatar)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success(
        "Profile updated",
        Profile::from(user),
        Some(Meta::empty()),
    ))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn issue_token(config: &AppConfig, user: &User) -> AppResult<String> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::hours(config.jwt_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role,
        iat: now.timestamp() as usize,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

/// 32 random bytes, hex encoded.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entity::sea_orm_active_enums::UserRole, middleware::auth::decode_claims};
    use std::path::PathBuf;

    fn config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/test".into(),
            database_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 3000,
            jwt_secret: "unit-test-secret".into(),
            jwt_ttl_hours: 1,
            reset_token_ttl_minutes: 60,
            frontend_url: "http://localhost:5173".into(),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 1024,
        }
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "seller@pickleball.com".into(),
            password_hash: String::new(),
            first_name: "Pro".into(),
            last_name: "Seller".into(),
            role: UserRole::Seller,
            avatar: None,
            address: None,
            phone: None,
            bio: None,
            reset_token: None,
            reset_token_expiry: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn password_round_trips_through_argon2() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn token_carries_user_id_email_and_role() {
        let config = config();
        let user = user();
        let token = issue_token(&config, &user).unwrap();
        let claims = decode_claims(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, UserRole::Seller);
        assert!(decode_claims(&token, "another-secret").is_err());
    }

    #[test]
    fn reset_tokens_are_random_hex() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Buyer@Example.COM "), "buyer@example.com");
    }
}
