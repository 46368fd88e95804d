use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// What an OTP was issued for. Codes never cross purposes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Signup,
    EmailSignup,
    OrderVerification,
    PasswordReset,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Signup => "signup",
            OtpPurpose::EmailSignup => "email_signup",
            OtpPurpose::OrderVerification => "order_verification",
            OtpPurpose::PasswordReset => "password_reset",
        }
    }
}

impl std::str::FromStr for OtpPurpose {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signup" => Ok(OtpPurpose::Signup),
            "email_signup" => Ok(OtpPurpose::EmailSignup),
            "order_verification" => Ok(OtpPurpose::OrderVerification),
            "password_reset" => Ok(OtpPurpose::PasswordReset),
            other => anyhow::bail!("unknown otp purpose {other:?}"),
        }
    }
}

/// OTP row as stored in `otps`. `recipient` is a normalized phone number,
/// or a lowercased email for `EmailSignup`.
#[derive(Debug, Clone, FromRow)]
pub struct OtpRecord {
    pub id: Uuid,
    pub recipient: String,
    pub code: String,
    pub purpose: String,
    pub used: bool,
    pub expires_at: OffsetDateTime,
    pub verified_at: Option<OffsetDateTime>, // set only by a successful verify
    pub verified_by: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl OtpRecord {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}
