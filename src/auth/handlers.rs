use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, JwtKeys, LoginRequest,
            MessageResponse, PublicUser, RefreshRequest, ResetPasswordRequest, ResetTokenResponse,
            SignupRequest, VerifyResetOtpRequest,
        },
        extractors::AuthUser,
        repo_types::User,
        services::{hash_password, is_valid_email, verify_password, MIN_PASSWORD_LEN},
    },
    error::{is_unique_violation, AppError, AppResult},
    otp::{
        repo_types::OtpPurpose,
        services::{is_valid_code, normalize_phone, OtpError},
    },
    state::AppState,
};

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for this email, a reset code has been sent to its phone";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/forgot-password", post(forgot_password))
        .route("/verify-reset-otp", post(verify_reset_otp))
        .route("/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn issue_tokens(state: &AppState, user: &User) -> AppResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id, user.role()).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        AppError::Internal(e)
    })?;
    let refresh_token = keys.sign_refresh(user.id, user.role()).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        AppError::Internal(e)
    })?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    })
}

fn validate_name(name: &str) -> AppResult<()> {
    let len = name.chars().count();
    if !(2..=50).contains(&len) {
        return Err(AppError::BadRequest("Name must be 2-50 characters".into()));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();
    payload.name = payload.name.trim().to_string();

    validate_name(&payload.name)?;
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    let phone = normalize_phone(&payload.phone)
        .ok_or_else(|| AppError::BadRequest("Invalid phone number".into()))?;
    if payload.password.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::BadRequest("Password too short".into()));
    }

    if !state
        .otp
        .has_recent_verification(&phone, OtpPurpose::Signup)
        .await?
    {
        warn!("signup without verified phone");
        return Err(AppError::BadRequest("Phone number not verified".into()));
    }
    if !state
        .otp
        .has_recent_verification(&payload.email, OtpPurpose::EmailSignup)
        .await?
    {
        warn!(email = %payload.email, "signup without verified email");
        return Err(AppError::BadRequest("Email not verified".into()));
    }

    // Ensure email and phone are not taken
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }
    if User::find_by_phone(&state.db, &phone).await?.is_some() {
        warn!("phone already registered");
        return Err(AppError::Conflict("Phone number already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = match User::create(&state.db, &payload.name, &payload.email, &phone, &hash).await {
        Ok(u) => u,
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict("Account already exists".into()));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(AppError::Internal(e));
        }
    };

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| {
            warn!(error = %e, "refresh token rejected");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;

    // Reload so a role change takes effect on the next pair
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(issue_tokens(&state, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> AppResult<Json<ForgotPasswordResponse>> {
    let email = payload.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Invalid email".into()));
    }

    let mut code = None;
    match User::find_by_email(&state.db, &email).await? {
        Some(user) => {
            let issued = state.otp.resend(&user.phone, OtpPurpose::PasswordReset).await?;
            info!(user_id = %user.id, "password reset code issued");
            if state.config.otp.expose_code {
                code = Some(issued.code);
            }
        }
        None => warn!(email = %email, "password reset for unknown email"),
    }

    Ok(Json(ForgotPasswordResponse {
        message: FORGOT_PASSWORD_MESSAGE,
        code,
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_reset_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyResetOtpRequest>,
) -> AppResult<Json<ResetTokenResponse>> {
    let email = payload.email.trim().to_lowercase();
    if !is_valid_code(payload.otp.trim()) {
        return Err(OtpError::Invalid.into());
    }

    // Unknown emails look like a missing code
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or(OtpError::NotFound)?;

    state
        .otp
        .verify(&user.phone, OtpPurpose::PasswordReset, payload.otp.trim())
        .await??;

    let reset_token = JwtKeys::from_ref(&state).sign_reset(user.id)?;
    info!(user_id = %user.id, "password reset otp verified");
    Ok(Json(ResetTokenResponse { reset_token }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let claims = JwtKeys::from_ref(&state)
        .verify_reset(&payload.reset_token)
        .map_err(|_| AppError::Unauthorized("Invalid or expired reset token".into()))?;

    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest("Password too short".into()));
    }

    let hash = hash_password(&payload.password)?;
    if !User::update_password(&state.db, claims.sub, &hash).await? {
        return Err(AppError::NotFound("User not found".into()));
    }

    info!(user_id = %claims.sub, "password reset");
    Ok(Json(MessageResponse {
        message: "Password updated successfully",
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<PublicUser>> {
    let found = User::find_by_id(&state.db, user.id).await?.ok_or_else(|| {
        error!(user_id = %user.id, "user not found");
        AppError::Unauthorized("User not found".into())
    })?;
    Ok(Json(PublicUser::from(&found)))
}
