use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    auth::{extractors::AuthUser, repo_types::User, services::is_valid_email},
    error::{AppError, AppResult},
    otp::{
        dto::{
            EmailOtpRequest, EmailOtpVerifyRequest, OtpIssuedResponse, OtpRequest,
            OtpVerifiedResponse, OtpVerifyRequest,
        },
        repo_types::OtpPurpose,
        services::{is_valid_code, normalize_phone, OtpError},
    },
    state::AppState,
};

pub fn signup_routes() -> Router<AppState> {
    Router::new()
        .route("/otp/signup/generate", post(signup_generate))
        .route("/otp/signup/resend", post(signup_resend))
        .route("/otp/signup/verify", post(signup_verify))
        .route("/otp/signup/email/generate", post(email_generate))
        .route("/otp/signup/email/resend", post(email_resend))
        .route("/otp/signup/email/verify", post(email_verify))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/otp/order/generate", post(order_generate))
        .route("/otp/order/resend", post(order_resend))
        .route("/otp/order/verify", post(order_verify))
}

fn parse_phone(raw: &str) -> AppResult<String> {
    normalize_phone(raw).ok_or_else(|| {
        warn!("invalid phone number");
        AppError::BadRequest("Invalid phone number".into())
    })
}

/// Lowercased, trimmed address; the key email codes are stored under.
pub fn parse_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    Ok(email)
}

async fn issue(
    state: &AppState,
    recipient: &str,
    purpose: OtpPurpose,
    resend: bool,
) -> AppResult<OtpIssuedResponse> {
    let issued = if resend {
        state.otp.resend(recipient, purpose).await?
    } else {
        state.otp.generate(recipient, purpose).await?
    };
    Ok(OtpIssuedResponse {
        message: "OTP sent successfully",
        expires_at: issued.expires_at,
        code: state.config.otp.expose_code.then_some(issued.code),
    })
}

/// `user` binds the verification to a logged-in caller.
async fn check(
    state: &AppState,
    recipient: &str,
    code: &str,
    purpose: OtpPurpose,
    user: Option<AuthUser>,
) -> AppResult<OtpVerifiedResponse> {
    let code = code.trim();
    if !is_valid_code(code) {
        return Err(OtpError::Invalid.into());
    }
    match user {
        Some(user) => state.otp.verify_for(user.id, recipient, purpose, code).await??,
        None => state.otp.verify(recipient, purpose, code).await??,
    }
    Ok(OtpVerifiedResponse {
        message: "OTP verified successfully",
        verified: true,
    })
}

async fn ensure_phone_unregistered(state: &AppState, phone: &str) -> AppResult<()> {
    if User::find_by_phone(&state.db, phone).await?.is_some() {
        warn!("signup otp for registered phone");
        return Err(AppError::Conflict("Phone number already registered".into()));
    }
    Ok(())
}

async fn ensure_email_unregistered(state: &AppState, email: &str) -> AppResult<()> {
    if User::find_by_email(&state.db, email).await?.is_some() {
        warn!(email = %email, "signup otp for registered email");
        return Err(AppError::Conflict("Email already registered".into()));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn signup_generate(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequest>,
) -> AppResult<Json<OtpIssuedResponse>> {
    let phone = parse_phone(&payload.phone)?;
    ensure_phone_unregistered(&state, &phone).await?;
    Ok(Json(issue(&state, &phone, OtpPurpose::Signup, false).await?))
}

#[instrument(skip(state, payload))]
pub async fn signup_resend(
    State(state): State<AppState>,
    Json(payload): Json<OtpRequest>,
) -> AppResult<Json<OtpIssuedResponse>> {
    let phone = parse_phone(&payload.phone)?;
    ensure_phone_unregistered(&state, &phone).await?;
    Ok(Json(issue(&state, &phone, OtpPurpose::Signup, true).await?))
}

#[instrument(skip(state, payload))]
pub async fn signup_verify(
    State(state): State<AppState>,
    Json(payload): Json<OtpVerifyRequest>,
) -> AppResult<Json<OtpVerifiedResponse>> {
    let phone = parse_phone(&payload.phone)?;
    Ok(Json(
        check(&state, &phone, &payload.otp, OtpPurpose::Signup, None).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn email_generate(
    State(state): State<AppState>,
    Json(payload): Json<EmailOtpRequest>,
) -> AppResult<Json<OtpIssuedResponse>> {
    let email = parse_email(&payload.email)?;
    ensure_email_unregistered(&state, &email).await?;
    Ok(Json(issue(&state, &email, OtpPurpose::EmailSignup, false).await?))
}

#[instrument(skip(state, payload))]
pub async fn email_resend(
    State(state): State<AppState>,
    Json(payload): Json<EmailOtpRequest>,
) -> AppResult<Json<OtpIssuedResponse>> {
    let email = parse_email(&payload.email)?;
    ensure_email_unregistered(&state, &email).await?;
    Ok(Json(issue(&state, &email, OtpPurpose::EmailSignup, true).await?))
}

#[instrument(skip(state, payload))]
pub async fn email_verify(
    State(state): State<AppState>,
    Json(payload): Json<EmailOtpVerifyRequest>,
) -> AppResult<Json<OtpVerifiedResponse>> {
    let email = parse_email(&payload.email)?;
    Ok(Json(
        check(&state, &email, &payload.otp, OtpPurpose::EmailSignup, None).await?,
    ))
}

#[instrument(skip(state, payload))]
pub async fn order_generate(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<OtpRequest>,
) -> AppResult<Json<OtpIssuedResponse>> {
    let phone = parse_phone(&payload.phone)?;
    info!(user_id = %user.id, "order otp requested");
    Ok(Json(issue(&state, &phone, OtpPurpose::OrderVerification, false).await?))
}

#[instrument(skip(state, payload))]
pub async fn order_resend(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<OtpRequest>,
) -> AppResult<Json<OtpIssuedResponse>> {
    let phone = parse_phone(&payload.phone)?;
    info!(user_id = %user.id, "order otp resend requested");
    Ok(Json(issue(&state, &phone, OtpPurpose::OrderVerification, true).await?))
}

#[instrument(skip(state, payload))]
pub async fn order_verify(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<OtpVerifyRequest>,
) -> AppResult<Json<OtpVerifiedResponse>> {
    let phone = parse_phone(&payload.phone)?;
    let resp = check(
        &state,
        &phone,
        &payload.otp,
        OtpPurpose::OrderVerification,
        Some(user),
    )
    .await?;
    info!(user_id = %user.id, "order phone verified");
    Ok(Json(resp))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{Request, StatusCode},
        Router,
    };
    use tower::ServiceExt;

    use crate::auth::{dto::JwtKeys, repo_types::Role};
    use crate::otp::repo_types::OtpPurpose;
    use crate::state::AppState;

    async fn call(
        app: &Router,
        path: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = Request::post(path).header("content-type", "application/json");
        if let Some(t) = token {
            req = req.header("authorization", format!("Bearer {t}"));
        }
        let resp = app
            .clone()
            .oneshot(req.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn order_otp_flow_over_http() {
        let state = AppState::fake();
        let token = JwtKeys::from_ref(&state)
            .sign_access(uuid::Uuid::new_v4(), Role::User)
            .unwrap();
        let app = crate::app::build_app(state);
        let phone = serde_json::json!({ "phone": "+91 98765 43210" });

        let (status, json) = call(&app, "/api/otp/order/generate", Some(&token), phone).await;
        assert_eq!(status, StatusCode::OK);
        let code = json["code"].as_str().expect("fake state exposes codes").to_string();
        assert!(json["expires_at"].is_string());

        let wrong = if code == "111111" { "222222" } else { "111111" };
        let (status, json) = call(
            &app,
            "/api/otp/order/verify",
            Some(&token),
            serde_json::json!({ "phone": "9876543210", "otp": wrong }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid OTP");

        let (status, json) = call(
            &app,
            "/api/otp/order/verify",
            Some(&token),
            serde_json::json!({ "phone": "9876543210", "otp": code }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["verified"], true);

        let (status, json) = call(
            &app,
            "/api/otp/order/verify",
            Some(&token),
            serde_json::json!({ "phone": "9876543210", "otp": code }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid or expired OTP");
    }

    #[tokio::test]
    async fn order_verification_counts_only_for_the_verifying_user() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let (alice, bob) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
        let alice_token = keys.sign_access(alice, Role::User).unwrap();
        let otp = state.otp.clone();
        let app = crate::app::build_app(state);

        let (_, json) = call(
            &app,
            "/api/otp/order/generate",
            Some(&alice_token),
            serde_json::json!({ "phone": "9876543210" }),
        )
        .await;
        let code = json["code"].as_str().unwrap().to_string();
        let (status, _) = call(
            &app,
            "/api/otp/order/verify",
            Some(&alice_token),
            serde_json::json!({ "phone": "9876543210", "otp": code }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        assert!(otp
            .has_recent_verification_for(alice, "9876543210", OtpPurpose::OrderVerification)
            .await
            .unwrap());
        assert!(!otp
            .has_recent_verification_for(bob, "9876543210", OtpPurpose::OrderVerification)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn email_verify_normalizes_address() {
        let state = AppState::fake();
        let issued = state
            .otp
            .generate("ravi@example.com", OtpPurpose::EmailSignup)
            .await
            .unwrap();
        let otp = state.otp.clone();
        let app = crate::app::build_app(state);

        let (status, json) = call(
            &app,
            "/api/otp/signup/email/verify",
            None,
            serde_json::json!({ "email": "  Ravi@Example.com ", "otp": issued.code }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["verified"], true);
        assert!(otp
            .has_recent_verification("ravi@example.com", OtpPurpose::EmailSignup)
            .await
            .unwrap());

        let (status, json) = call(
            &app,
            "/api/otp/signup/email/verify",
            None,
            serde_json::json!({ "email": "not-an-email", "otp": "123456" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid email");
    }

    #[tokio::test]
    async fn order_otp_requires_login() {
        let app = crate::app::build_app(AppState::fake());
        let (status, _) = call(
            &app,
            "/api/otp/order/generate",
            None,
            serde_json::json!({ "phone": "9876543210" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_phone_and_code_are_rejected() {
        let app = crate::app::build_app(AppState::fake());
        let (status, json) = call(
            &app,
            "/api/otp/signup/verify",
            None,
            serde_json::json!({ "phone": "12345", "otp": "123456" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid phone number");

        let (status, json) = call(
            &app,
            "/api/otp/signup/verify",
            None,
            serde_json::json!({ "phone": "9876543210", "otp": "12ab" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid OTP");
    }
}
