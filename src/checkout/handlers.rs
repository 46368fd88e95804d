use anyhow::Context;
use axum::{extract::State, routing::post, Json, Router};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::extractors::AuthUser,
    campaigns::repo_types::{Campaign, NewCampaign, PaymentStatus},
    checkout::{
        dto::{
            InitiatePaymentRequest, InitiatePaymentResponse, ValidateResponse,
            VerifyPaymentRequest, VerifyPaymentResponse,
        },
        pricing::quote,
        validation::{CustomerInfo, ValidCustomerInfo},
        wizard::{Checkout, WizardError},
    },
    error::{AppError, AppResult},
    notifications::services::notify_payment,
    otp::repo_types::OtpPurpose,
    payments::gateway::{PaymentMethod, PaymentProof},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkout/validate", post(validate))
        .route("/payments/initiate", post(initiate_payment))
        .route("/payments/verify", post(verify_payment))
}

impl From<WizardError> for AppError {
    fn from(e: WizardError) -> Self {
        match e {
            WizardError::Invalid(fields) => AppError::Validation(fields),
            out_of_order => AppError::Conflict(out_of_order.to_string()),
        }
    }
}

fn submit(wizard: &mut Checkout, raw: &CustomerInfo) -> AppResult<ValidCustomerInfo> {
    match wizard.submit_info(raw) {
        Ok(info) => Ok(info),
        Err(e) => {
            warn!(error = %e, "customer info rejected");
            Err(e.into())
        }
    }
}

/// Settle the campaign's payment and tell the owner, in one transaction.
async fn settle(
    state: &AppState,
    campaign: &Campaign,
    accepted: bool,
    payment_id: &str,
) -> AppResult<Campaign> {
    let status = if accepted {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Failed
    };
    let mut tx = state.db.begin().await.context("begin payment tx")?;
    let settled = Campaign::record_payment(&mut *tx, campaign.id, status, Some(payment_id))
        .await?
        .ok_or_else(|| AppError::Conflict("Payment already settled".into()))?;
    notify_payment(&mut *tx, &settled, status).await?;
    tx.commit().await.context("commit payment tx")?;

    info!(
        campaign_id = %campaign.id,
        %payment_id,
        payment_status = status.as_str(),
        "payment decided"
    );
    Ok(settled)
}

#[instrument(skip(payload))]
pub async fn validate(
    _user: AuthUser,
    Json(payload): Json<CustomerInfo>,
) -> AppResult<Json<ValidateResponse>> {
    let mut wizard = Checkout::new();
    let info = submit(&mut wizard, &payload)?;
    Ok(Json(ValidateResponse {
        valid: true,
        step: wizard.step(),
        bottle_type: info.bottle_type,
        quantity: info.quantity,
        amount: quote(info.bottle_type, info.quantity),
    }))
}

#[instrument(skip(state, payload))]
pub async fn initiate_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InitiatePaymentRequest>,
) -> AppResult<Json<InitiatePaymentResponse>> {
    let mut wizard = Checkout::new();
    let info = submit(&mut wizard, &payload.customer)?;

    if !state
        .otp
        .has_recent_verification_for(user.id, &info.phone, OtpPurpose::OrderVerification)
        .await?
    {
        warn!(user_id = %user.id, "checkout without verified phone");
        return Err(AppError::BadRequest("Phone number not verified".into()));
    }
    wizard.phone_verified()?;

    let amount = quote(info.bottle_type, info.quantity);
    let campaign = Campaign::create(
        &state.db,
        &NewCampaign {
            user_id: user.id,
            customer_name: &info.name,
            phone: &info.phone,
            address: &info.address,
            city: &info.city,
            pincode: &info.pincode,
            bottle_type: info.bottle_type.as_str(),
            quantity: info.quantity,
            amount,
            payment_method: payload.method.as_str(),
        },
    )
    .await?;
    info!(campaign_id = %campaign.id, user_id = %user.id, amount, "campaign created");

    let order = state
        .gateway
        .create_order(amount, &campaign.id.to_string())
        .await
        .map_err(|e| {
            error!(error = %e, campaign_id = %campaign.id, gateway = state.gateway.name(), "create order failed");
            AppError::Internal(e)
        })?;
    Campaign::set_gateway_order(&state.db, campaign.id, &order.id).await?;

    let proof = match payload.payment {
        Some(proof) => Some(proof),
        None => state.gateway.collect(&order, payload.method).await?,
    };

    let mut payment_status = PaymentStatus::Pending;
    if let (PaymentMethod::Card, Some(proof)) = (payload.method, proof.as_ref()) {
        let accepted = state.gateway.verify(&order.id, proof).await;
        settle(&state, &campaign, accepted, &proof.payment_id).await?;
        wizard.payment_decided(accepted)?;
        if !accepted {
            return Err(AppError::Payment("Card payment was declined".into()));
        }
        payment_status = PaymentStatus::Paid;
    }

    Ok(Json(InitiatePaymentResponse {
        campaign_id: campaign.id,
        step: wizard.step(),
        payment_status,
        amount,
        currency: order.currency.clone(),
        gateway: state.gateway.name(),
        // A settled card payment needs no further proof from the client
        proof: proof.filter(|_| payment_status == PaymentStatus::Pending),
        order,
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<VerifyPaymentResponse>> {
    let campaign = Campaign::find_by_id(&state.db, payload.campaign_id)
        .await?
        .filter(|c| c.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Campaign not found".into()))?;

    if campaign.payment_status()? != PaymentStatus::Pending {
        return Err(AppError::Conflict("Payment already settled".into()));
    }
    let order_id = campaign
        .gateway_order_id
        .clone()
        .ok_or_else(|| AppError::Conflict("Payment was not initiated".into()))?;

    let mut wizard = Checkout::awaiting_payment();
    let proof = PaymentProof {
        payment_id: payload.payment_id.trim().to_string(),
        signature: payload.signature.trim().to_string(),
    };
    let accepted = state.gateway.verify(&order_id, &proof).await;
    let settled = settle(&state, &campaign, accepted, &proof.payment_id).await?;
    wizard.payment_decided(accepted)?;

    if !accepted {
        warn!(campaign_id = %campaign.id, "payment signature mismatch");
        return Err(AppError::Payment("Payment verification failed".into()));
    }
    Ok(Json(VerifyPaymentResponse {
        campaign_id: settled.id,
        step: wizard.step(),
        payment_status: settled.payment_status()?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{dto::JwtKeys, repo_types::Role};
    use crate::checkout::{validation::tests::good, wizard::CheckoutStep};
    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn post_as_user(
        state: AppState,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        post_as(state, uuid::Uuid::new_v4(), path, body).await
    }

    async fn post_as(
        state: AppState,
        user_id: uuid::Uuid,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let token = JwtKeys::from_ref(&state)
            .sign_access(user_id, Role::User)
            .unwrap();
        let resp = crate::app::build_app(state)
            .oneshot(
                Request::post(path)
                    .header("content-type", "application/json")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn customer_json(info: &CustomerInfo) -> serde_json::Value {
        serde_json::json!({
            "name": info.name,
            "phone": info.phone,
            "address": info.address,
            "city": info.city,
            "pincode": info.pincode,
            "bottle_type": info.bottle_type,
            "quantity": info.quantity,
        })
    }

    #[test]
    fn wizard_errors_map_to_http() {
        let err: AppError = WizardError::OutOfOrder {
            at: CheckoutStep::Confirmation,
            action: "settle payment",
        }
        .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let err: AppError = WizardError::Invalid(vec![]).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn validate_quotes_a_good_order() {
        let (status, json) =
            post_as_user(AppState::fake(), "/api/checkout/validate", customer_json(&good())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["step"], "phone_verification");
        assert_eq!(json["amount"], 600_000);
    }

    #[tokio::test]
    async fn validate_reports_bad_pincode() {
        let mut info = good();
        info.pincode = "012345".into();
        let (status, json) =
            post_as_user(AppState::fake(), "/api/checkout/validate", customer_json(&info)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["fields"][0]["field"], "pincode");
    }

    #[tokio::test]
    async fn initiate_requires_verified_phone() {
        let body = serde_json::json!({ "customer": customer_json(&good()), "method": "upi" });
        let (status, json) = post_as_user(AppState::fake(), "/api/payments/initiate", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Phone number not verified");
    }

    #[tokio::test]
    async fn verification_for_another_phone_does_not_count() {
        let state = AppState::fake();
        let issued = state
            .otp
            .generate("9123456780", OtpPurpose::OrderVerification)
            .await
            .unwrap();
        let user = uuid::Uuid::new_v4();
        state
            .otp
            .verify_for(user, "9123456780", OtpPurpose::OrderVerification, &issued.code)
            .await
            .unwrap()
            .unwrap();

        let body = serde_json::json!({ "customer": customer_json(&good()), "method": "card" });
        let (status, json) = post_as(state, user, "/api/payments/initiate", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Phone number not verified");
    }

    #[tokio::test]
    async fn another_users_verification_does_not_count() {
        let state = AppState::fake();
        let (alice, bob) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
        let phone = good().phone;
        let issued = state
            .otp
            .generate(&phone, OtpPurpose::OrderVerification)
            .await
            .unwrap();
        state
            .otp
            .verify_for(alice, &phone, OtpPurpose::OrderVerification, &issued.code)
            .await
            .unwrap()
            .unwrap();

        let body = serde_json::json!({ "customer": customer_json(&good()), "method": "upi" });
        let (status, json) = post_as(state, bob, "/api/payments/initiate", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Phone number not verified");
    }
}
