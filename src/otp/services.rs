use std::sync::Arc;

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OtpConfig;
use crate::otp::repo::OtpStore;
use crate::otp::repo_types::OtpPurpose;

/// Why a verification was refused. The messages are shown to users as-is.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpError {
    #[error("Invalid OTP")]
    Invalid,
    #[error("OTP has expired")]
    Expired,
    #[error("Invalid or expired OTP")]
    NotFound,
}

#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub code: String,
    pub expires_at: OffsetDateTime,
}

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^[6-9]\d{9}$").unwrap();
    static ref CODE_RE: Regex = Regex::new(r"^\d{6}$").unwrap();
}

/// Strip `+91`, spaces and dashes; `None` if what's left isn't an Indian mobile number.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();
    let digits = cleaned
        .strip_prefix("+91")
        .or_else(|| cleaned.strip_prefix("91").filter(|rest| rest.len() == 10))
        .unwrap_or(&cleaned);
    PHONE_RE.is_match(digits).then(|| digits.to_string())
}

pub fn is_valid_code(code: &str) -> bool {
    CODE_RE.is_match(code)
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    ttl: Duration,
    gate: Duration,
}

impl OtpService {
    pub fn new(store: Arc<dyn OtpStore>, cfg: &OtpConfig) -> Self {
        Self {
            store,
            ttl: Duration::minutes(cfg.ttl_minutes),
            gate: Duration::minutes(cfg.gate_minutes),
        }
    }

    pub async fn generate(&self, recipient: &str, purpose: OtpPurpose) -> anyhow::Result<IssuedOtp> {
        let code = generate_code();
        let expires_at = OffsetDateTime::now_utc() + self.ttl;
        let rec = self.store.insert(recipient, purpose, &code, expires_at).await?;
        info!(otp_id = %rec.id, purpose = purpose.as_str(), "otp issued");
        Ok(IssuedOtp { code, expires_at })
    }

    /// Invalidate every outstanding code for the pair, then issue a fresh one.
    pub async fn resend(&self, recipient: &str, purpose: OtpPurpose) -> anyhow::Result<IssuedOtp> {
        let n = self.store.invalidate_unused(recipient, purpose).await?;
        debug!(invalidated = n, purpose = purpose.as_str(), "previous otps invalidated");
        self.generate(recipient, purpose).await
    }

    /// Outer error is infrastructure; inner is the user-facing refusal.
    pub async fn verify(
        &self,
        recipient: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> anyhow::Result<Result<(), OtpError>> {
        self.consume_code(recipient, purpose, code, None).await
    }

    /// Like `verify`, but the verification only counts for `user_id`.
    pub async fn verify_for(
        &self,
        user_id: Uuid,
        recipient: &str,
        purpose: OtpPurpose,
        code: &str,
    ) -> anyhow::Result<Result<(), OtpError>> {
        self.consume_code(recipient, purpose, code, Some(user_id)).await
    }

    async fn consume_code(
        &self,
        recipient: &str,
        purpose: OtpPurpose,
        code: &str,
        verified_by: Option<Uuid>,
    ) -> anyhow::Result<Result<(), OtpError>> {
        let Some(rec) = self.store.latest_unused(recipient, purpose).await? else {
            warn!(purpose = purpose.as_str(), "no outstanding otp");
            return Ok(Err(OtpError::NotFound));
        };

        let now = OffsetDateTime::now_utc();
        if rec.is_expired_at(now) {
            warn!(otp_id = %rec.id, "otp expired");
            return Ok(Err(OtpError::Expired));
        }
        if rec.code != code {
            warn!(otp_id = %rec.id, "otp mismatch");
            return Ok(Err(OtpError::Invalid));
        }

        if !self.store.consume(rec.id, now, verified_by).await? {
            warn!(otp_id = %rec.id, "otp consumed concurrently");
            return Ok(Err(OtpError::NotFound));
        }
        info!(otp_id = %rec.id, purpose = purpose.as_str(), "otp verified");
        Ok(Ok(()))
    }

    /// Whether the recipient passed verification for `purpose` within the gate window.
    pub async fn has_recent_verification(
        &self,
        recipient: &str,
        purpose: OtpPurpose,
    ) -> anyhow::Result<bool> {
        let since = OffsetDateTime::now_utc() - self.gate;
        self.store.verified_since(recipient, purpose, since, None).await
    }

    /// Only verifications made through `verify_for` by this user count.
    pub async fn has_recent_verification_for(
        &self,
        user_id: Uuid,
        recipient: &str,
        purpose: OtpPurpose,
    ) -> anyhow::Result<bool> {
        let since = OffsetDateTime::now_utc() - self.gate;
        self.store
            .verified_since(recipient, purpose, since, Some(user_id))
            .await
    }

    /// Drop rows that expired longer ago than the gate window.
    pub async fn cleanup_expired(&self) -> anyhow::Result<u64> {
        let cutoff = OffsetDateTime::now_utc() - self.gate;
        self.store.delete_expired(cutoff).await
    }
}

/// Periodically purge stale OTP rows until the runtime shuts down.
pub fn spawn_cleanup(service: OtpService, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match service.cleanup_expired().await {
                Ok(0) => {}
                Ok(n) => info!(deleted = n, "expired otps cleaned up"),
                Err(e) => warn!(error = %e, "otp cleanup failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::repo::memory::MemoryOtpStore;

    const PHONE: &str = "9876543210";

    fn cfg() -> OtpConfig {
        OtpConfig {
            ttl_minutes: 10,
            gate_minutes: 30,
            expose_code: false,
            cleanup_secs: 60,
        }
    }

    fn service() -> (Arc<MemoryOtpStore>, OtpService) {
        let store = Arc::new(MemoryOtpStore::default());
        let svc = OtpService::new(store.clone(), &cfg());
        (store, svc)
    }

    fn wrong(code: &str) -> String {
        if code == "123456" { "654321".into() } else { "123456".into() }
    }

    #[tokio::test]
    async fn wrong_then_right_then_reused() {
        let (_, svc) = service();
        let issued = svc.generate(PHONE, OtpPurpose::Signup).await.unwrap();
        assert_eq!(issued.code.len(), 6);

        let r = svc.verify(PHONE, OtpPurpose::Signup, &wrong(&issued.code)).await.unwrap();
        assert_eq!(r, Err(OtpError::Invalid));
        assert_eq!(r.unwrap_err().to_string(), "Invalid OTP");

        let r = svc.verify(PHONE, OtpPurpose::Signup, &issued.code).await.unwrap();
        assert_eq!(r, Ok(()));

        let r = svc.verify(PHONE, OtpPurpose::Signup, &issued.code).await.unwrap();
        assert_eq!(r.unwrap_err().to_string(), "Invalid or expired OTP");
    }

    #[tokio::test]
    async fn expired_code_fails_even_when_it_matches() {
        let (store, svc) = service();
        let issued = svc.generate(PHONE, OtpPurpose::OrderVerification).await.unwrap();
        let rec = store
            .latest_unused(PHONE, OtpPurpose::OrderVerification)
            .await
            .unwrap()
            .unwrap();
        store.set_expiry(rec.id, OffsetDateTime::now_utc() - Duration::seconds(1));

        let r = svc
            .verify(PHONE, OtpPurpose::OrderVerification, &issued.code)
            .await
            .unwrap();
        assert_eq!(r, Err(OtpError::Expired));
        assert!(!svc
            .has_recent_verification(PHONE, OtpPurpose::OrderVerification)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn resend_invalidates_previous_codes() {
        let (store, svc) = service();
        svc.generate(PHONE, OtpPurpose::Signup).await.unwrap();
        svc.generate(PHONE, OtpPurpose::Signup).await.unwrap();
        let fresh = svc.resend(PHONE, OtpPurpose::Signup).await.unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.unused_count(PHONE, OtpPurpose::Signup), 1);

        let latest = store
            .latest_unused(PHONE, OtpPurpose::Signup)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.code, fresh.code);
        // invalidation is not verification
        assert!(!svc
            .has_recent_verification(PHONE, OtpPurpose::Signup)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn resent_code_verifies() {
        let (_, svc) = service();
        svc.generate(PHONE, OtpPurpose::Signup).await.unwrap();
        let fresh = svc.resend(PHONE, OtpPurpose::Signup).await.unwrap();
        let r = svc.verify(PHONE, OtpPurpose::Signup, &fresh.code).await.unwrap();
        assert_eq!(r, Ok(()));
        assert!(svc.has_recent_verification(PHONE, OtpPurpose::Signup).await.unwrap());
    }

    #[tokio::test]
    async fn purposes_do_not_mix() {
        let (_, svc) = service();
        let issued = svc.generate(PHONE, OtpPurpose::Signup).await.unwrap();
        let r = svc
            .verify(PHONE, OtpPurpose::OrderVerification, &issued.code)
            .await
            .unwrap();
        assert_eq!(r, Err(OtpError::NotFound));
        assert!(!svc.has_recent_verification(PHONE, OtpPurpose::Signup).await.unwrap());
    }

    #[tokio::test]
    async fn only_one_concurrent_consume_wins() {
        let (store, svc) = service();
        svc.generate(PHONE, OtpPurpose::Signup).await.unwrap();
        // both requests read the same outstanding row before either writes
        let a = store.latest_unused(PHONE, OtpPurpose::Signup).await.unwrap().unwrap();
        let b = store.latest_unused(PHONE, OtpPurpose::Signup).await.unwrap().unwrap();
        assert_eq!(a.id, b.id);

        let now = OffsetDateTime::now_utc();
        let (wa, wb) = tokio::join!(store.consume(a.id, now, None), store.consume(b.id, now, None));
        assert_ne!(wa.unwrap(), wb.unwrap());
    }

    #[tokio::test]
    async fn concurrent_verifies_exactly_one_succeeds() {
        let (_, svc) = service();
        let issued = svc.generate(PHONE, OtpPurpose::Signup).await.unwrap();

        let (a, b) = tokio::join!(
            svc.verify(PHONE, OtpPurpose::Signup, &issued.code),
            svc.verify(PHONE, OtpPurpose::Signup, &issued.code),
        );
        let mut results = [a.unwrap(), b.unwrap()];
        results.sort_by_key(|r| r.is_err());
        assert_eq!(results, [Ok(()), Err(OtpError::NotFound)]);
    }

    #[tokio::test]
    async fn verification_older_than_gate_window_stops_counting() {
        let (store, svc) = service();
        let issued = svc.generate(PHONE, OtpPurpose::OrderVerification).await.unwrap();
        let rec = store
            .latest_unused(PHONE, OtpPurpose::OrderVerification)
            .await
            .unwrap()
            .unwrap();
        svc.verify(PHONE, OtpPurpose::OrderVerification, &issued.code)
            .await
            .unwrap()
            .unwrap();

        store.set_verified_at(rec.id, OffsetDateTime::now_utc() - Duration::minutes(29));
        assert!(svc
            .has_recent_verification(PHONE, OtpPurpose::OrderVerification)
            .await
            .unwrap());

        store.set_verified_at(rec.id, OffsetDateTime::now_utc() - Duration::minutes(31));
        assert!(!svc
            .has_recent_verification(PHONE, OtpPurpose::OrderVerification)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn verification_is_bound_to_the_verifying_user() {
        let (_, svc) = service();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let issued = svc.generate(PHONE, OtpPurpose::OrderVerification).await.unwrap();
        svc.verify_for(alice, PHONE, OtpPurpose::OrderVerification, &issued.code)
            .await
            .unwrap()
            .unwrap();

        assert!(svc
            .has_recent_verification_for(alice, PHONE, OtpPurpose::OrderVerification)
            .await
            .unwrap());
        assert!(!svc
            .has_recent_verification_for(bob, PHONE, OtpPurpose::OrderVerification)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn email_codes_are_keyed_by_address() {
        let (_, svc) = service();
        let issued = svc.generate("ravi@example.com", OtpPurpose::EmailSignup).await.unwrap();
        let r = svc
            .verify("ravi@example.com", OtpPurpose::Signup, &issued.code)
            .await
            .unwrap();
        assert_eq!(r, Err(OtpError::NotFound));
        let r = svc
            .verify("ravi@example.com", OtpPurpose::EmailSignup, &issued.code)
            .await
            .unwrap();
        assert_eq!(r, Ok(()));
        assert!(svc
            .has_recent_verification("ravi@example.com", OtpPurpose::EmailSignup)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn cleanup_keeps_rows_inside_gate_window() {
        let (store, svc) = service();
        svc.generate(PHONE, OtpPurpose::Signup).await.unwrap();
        let stale = svc.generate("9123456789", OtpPurpose::Signup).await.unwrap();
        let rec = store
            .latest_unused("9123456789", OtpPurpose::Signup)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.code, stale.code);
        store.set_expiry(rec.id, OffsetDateTime::now_utc() - Duration::hours(2));

        assert_eq!(svc.cleanup_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn cleanup_keeps_recent_verification_of_expired_code() {
        let (store, svc) = service();
        let issued = svc.generate(PHONE, OtpPurpose::Signup).await.unwrap();
        let rec = store
            .latest_unused(PHONE, OtpPurpose::Signup)
            .await
            .unwrap()
            .unwrap();
        svc.verify(PHONE, OtpPurpose::Signup, &issued.code)
            .await
            .unwrap()
            .unwrap();
        // code lapsed 20 minutes ago, verified shortly before that
        let now = OffsetDateTime::now_utc();
        store.set_expiry(rec.id, now - Duration::minutes(20));
        store.set_verified_at(rec.id, now - Duration::minutes(25));

        assert_eq!(svc.cleanup_expired().await.unwrap(), 0);
        assert_eq!(store.len(), 1);
        assert!(svc.has_recent_verification(PHONE, OtpPurpose::Signup).await.unwrap());
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(normalize_phone("+91 98765-43210").as_deref(), Some("9876543210"));
        assert_eq!(normalize_phone("919876543210").as_deref(), Some("9876543210"));
        assert_eq!(normalize_phone("9876543210").as_deref(), Some("9876543210"));
        assert_eq!(normalize_phone("5876543210"), None);
        assert_eq!(normalize_phone("98765"), None);
        assert_eq!(normalize_phone("98765432a0"), None);
    }

    #[test]
    fn code_shape() {
        assert!(is_valid_code("012345"));
        assert!(!is_valid_code("12345"));
        assert!(!is_valid_code("12345a"));
        for _ in 0..100 {
            let c = generate_code();
            assert!(is_valid_code(&c));
            assert!(!c.starts_with('0'));
        }
    }
}
