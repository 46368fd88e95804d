use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::otp::repo_types::{OtpPurpose, OtpRecord};

/// Persistence for OTP rows.
///
/// `consume` is the only write that decides a verification; it must flip
/// `used` atomically so two concurrent verifies cannot both succeed.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert(
        &self,
        recipient: &str,
        purpose: OtpPurpose,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<OtpRecord>;

    /// Most recently created unused row for the pair.
    async fn latest_unused(
        &self,
        recipient: &str,
        purpose: OtpPurpose,
    ) -> anyhow::Result<Option<OtpRecord>>;

    /// Mark the row used if it still is unused. Returns whether this call won.
    /// `verified_by` records the logged-in user who proved ownership, if any.
    async fn consume(
        &self,
        id: uuid::Uuid,
        now: OffsetDateTime,
        verified_by: Option<uuid::Uuid>,
    ) -> anyhow::Result<bool>;

    /// Mark every unused row for the pair used, without recording a verification.
    async fn invalidate_unused(&self, recipient: &str, purpose: OtpPurpose) -> anyhow::Result<u64>;

    /// With `verified_by` set, only a verification by that user counts.
    async fn verified_since(
        &self,
        recipient: &str,
        purpose: OtpPurpose,
        since: OffsetDateTime,
        verified_by: Option<uuid::Uuid>,
    ) -> anyhow::Result<bool>;

    /// Delete rows that expired before `cutoff`, used or not.
    async fn delete_expired(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgOtpStore {
    db: PgPool,
}

impl PgOtpStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OtpStore for PgOtpStore {
    async fn insert(
        &self,
        recipient: &str,
        purpose: OtpPurpose,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<OtpRecord> {
        let row = sqlx::query_as::<_, OtpRecord>(
            r#"
            INSERT INTO otps (recipient, code, purpose, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, recipient, code, purpose, used, expires_at, verified_at, verified_by, created_at
            "#,
        )
        .bind(recipient)
        .bind(code)
        .bind(purpose.as_str())
        .bind(expires_at)
        .fetch_one(&self.db)
        .await
        .context("insert otp")?;
        Ok(row)
    }

    async fn latest_unused(
        &self,
        recipient: &str,
        purpose: OtpPurpose,
    ) -> anyhow::Result<Option<OtpRecord>> {
        let row = sqlx::query_as::<_, OtpRecord>(
            r#"
            SELECT id, recipient, code, purpose, used, expires_at, verified_at, verified_by, created_at
              FROM otps
             WHERE recipient = $1 AND purpose = $2 AND used = FALSE
             ORDER BY created_at DESC
             LIMIT 1
            "#,
        )
        .bind(recipient)
        .bind(purpose.as_str())
        .fetch_optional(&self.db)
        .await
        .context("select latest unused otp")?;
        Ok(row)
    }

    async fn consume(
        &self,
        id: uuid::Uuid,
        now: OffsetDateTime,
        verified_by: Option<uuid::Uuid>,
    ) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE otps
               SET used = TRUE, verified_at = $2, verified_by = $3
             WHERE id = $1 AND used = FALSE
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(verified_by)
        .execute(&self.db)
        .await
        .context("consume otp")?;
        Ok(res.rows_affected() == 1)
    }

    async fn invalidate_unused(&self, recipient: &str, purpose: OtpPurpose) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE otps
               SET used = TRUE
             WHERE recipient = $1 AND purpose = $2 AND used = FALSE
            "#,
        )
        .bind(recipient)
        .bind(purpose.as_str())
        .execute(&self.db)
        .await
        .context("invalidate unused otps")?;
        Ok(res.rows_affected())
    }

    async fn verified_since(
        &self,
        recipient: &str,
        purpose: OtpPurpose,
        since: OffsetDateTime,
        verified_by: Option<uuid::Uuid>,
    ) -> anyhow::Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM otps
                 WHERE recipient = $1 AND purpose = $2 AND verified_at >= $3
                   AND ($4::uuid IS NULL OR verified_by = $4)
            )
            "#,
        )
        .bind(recipient)
        .bind(purpose.as_str())
        .bind(since)
        .bind(verified_by)
        .fetch_one(&self.db)
        .await
        .context("check recent otp verification")?;
        Ok(exists)
    }

    async fn delete_expired(&self, cutoff: OffsetDateTime) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM otps WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.db)
            .await
            .context("delete expired otps")?;
        Ok(res.rows_affected())
    }
}
