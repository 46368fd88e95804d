use anyhow::Context;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::campaigns::repo_types::{Campaign, CampaignStatus, NewCampaign, PaymentStatus};

const CAMPAIGN_COLUMNS: &str = "id, user_id, customer_name, phone, address, city, pincode, \
     bottle_type, quantity, amount, status, payment_status, payment_method, gateway_order_id, \
     gateway_payment_id, rejection_reason, tracking_number, created_at, updated_at";

impl Campaign {
    /// New campaigns start `pending` with payment `pending`.
    pub async fn create(db: &PgPool, new: &NewCampaign<'_>) -> anyhow::Result<Campaign> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            INSERT INTO campaigns (user_id, customer_name, phone, address, city, pincode,
                                   bottle_type, quantity, amount, payment_method)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.customer_name)
        .bind(new.phone)
        .bind(new.address)
        .bind(new.city)
        .bind(new.pincode)
        .bind(new.bottle_type)
        .bind(new.quantity)
        .bind(new.amount)
        .bind(new.payment_method)
        .fetch_one(db)
        .await
        .context("insert campaign")?;
        Ok(campaign)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find campaign")?;
        Ok(campaign)
    }

    /// `owner = None` lists every customer's campaigns.
    pub async fn list(
        db: &PgPool,
        owner: Option<Uuid>,
        status: Option<CampaignStatus>,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Campaign>> {
        let rows = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS}
            FROM campaigns
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(owner)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list campaigns")?;
        Ok(rows)
    }

    /// Moves the campaign only if it is still in `from`. `None` means someone
    /// else changed it first.
    pub async fn update_status<'e, E: PgExecutor<'e>>(
        db: E,
        id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
        rejection_reason: Option<&str>,
        tracking_number: Option<&str>,
    ) -> anyhow::Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            UPDATE campaigns
            SET status = $3,
                rejection_reason = COALESCE($4, rejection_reason),
                tracking_number = COALESCE($5, tracking_number),
                updated_at = now()
            WHERE id = $1 AND status = $2
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(rejection_reason)
        .bind(tracking_number)
        .fetch_optional(db)
        .await
        .context("update campaign status")?;
        Ok(campaign)
    }

    pub async fn set_gateway_order(db: &PgPool, id: Uuid, order_id: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE campaigns SET gateway_order_id = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(order_id)
            .execute(db)
            .await
            .context("set gateway order")?;
        Ok(())
    }

    /// Settles a pending payment. `None` when it was already settled.
    pub async fn record_payment<'e, E: PgExecutor<'e>>(
        db: E,
        id: Uuid,
        status: PaymentStatus,
        payment_id: Option<&str>,
    ) -> anyhow::Result<Option<Campaign>> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            UPDATE campaigns
            SET payment_status = $2,
                gateway_payment_id = COALESCE($3, gateway_payment_id),
                updated_at = now()
            WHERE id = $1 AND payment_status = 'pending'
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(payment_id)
        .fetch_optional(db)
        .await
        .context("record payment")?;
        Ok(campaign)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM campaigns WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .context("delete campaign")?;
        Ok(res.rows_affected() == 1)
    }
}
