use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::campaigns::repo_types::PaymentStatus;
use crate::checkout::{pricing::BottleType, validation::CustomerInfo, wizard::CheckoutStep};
use crate::payments::gateway::{GatewayOrder, PaymentMethod, PaymentProof};

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub step: CheckoutStep,
    pub bottle_type: BottleType,
    pub quantity: i32,
    /// Paise.
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub customer: CustomerInfo,
    pub method: PaymentMethod,
    /// Card details already confirmed by the gateway widget.
    pub payment: Option<PaymentProof>,
}

#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    pub campaign_id: Uuid,
    pub step: CheckoutStep,
    pub payment_status: PaymentStatus,
    pub amount: i64,
    pub currency: String,
    pub gateway: &'static str,
    pub order: GatewayOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<PaymentProof>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    pub campaign_id: Uuid,
    #[serde(alias = "razorpay_payment_id")]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub campaign_id: Uuid,
    pub step: CheckoutStep,
    pub payment_status: PaymentStatus,
}
