use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub ttl_minutes: i64,
    /// How long a successful verification keeps a phone "verified" for signup/checkout.
    pub gate_minutes: i64,
    /// Development only: echo the issued code in the generate response.
    pub expose_code: bool,
    pub cleanup_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Live gateway credentials; `None` selects the simulator.
    pub razorpay: Option<RazorpayConfig>,
    pub sim_secret: String,
    pub sim_latency_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
    pub payment: PaymentConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "billboard".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "billboard-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let otp = OtpConfig {
            ttl_minutes: env_or("OTP_TTL_MINUTES", 10),
            gate_minutes: env_or("OTP_GATE_MINUTES", 30),
            expose_code: env_or("OTP_EXPOSE_CODE", false),
            cleanup_secs: env_or("OTP_CLEANUP_SECS", 15 * 60),
        };

        let razorpay = match (
            std::env::var("RAZORPAY_KEY_ID").ok().filter(|v| !v.is_empty()),
            std::env::var("RAZORPAY_KEY_SECRET").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(key_id), Some(key_secret)) => Some(RazorpayConfig {
                key_id,
                key_secret,
                base_url: std::env::var("RAZORPAY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.razorpay.com".into()),
            }),
            _ => None,
        };
        let payment = PaymentConfig {
            razorpay,
            sim_secret: std::env::var("PAYMENT_SIM_SECRET")
                .unwrap_or_else(|_| "billboard-simulated-gateway".into()),
            sim_latency_ms: env_or("PAYMENT_SIM_LATENCY_MS", 800),
        };

        Ok(Self {
            database_url,
            jwt,
            otp,
            payment,
        })
    }
}
