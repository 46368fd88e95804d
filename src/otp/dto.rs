use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Deserialize)]
pub struct OtpRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyRequest {
    pub phone: String,
    #[serde(alias = "code")]
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailOtpRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailOtpVerifyRequest {
    pub email: String,
    #[serde(alias = "code")]
    pub otp: String,
}

#[derive(Debug, Serialize)]
pub struct OtpIssuedResponse {
    pub message: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// Only present when codes are exposed for development.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OtpVerifiedResponse {
    pub message: &'static str,
    pub verified: bool,
}
