use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Pending,
    Approved,
    Rejected,
    InProduction,
    Shipped,
    Delivered,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Pending => "pending",
            CampaignStatus::Approved => "approved",
            CampaignStatus::Rejected => "rejected",
            CampaignStatus::InProduction => "in_production",
            CampaignStatus::Shipped => "shipped",
            CampaignStatus::Delivered => "delivered",
        }
    }

    /// Forward-only lifecycle. Rejection is possible until production starts.
    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, InProduction)
                | (Approved, Rejected)
                | (InProduction, Shipped)
                | (Shipped, Delivered)
        )
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CampaignStatus::Pending),
            "approved" => Ok(CampaignStatus::Approved),
            "rejected" => Ok(CampaignStatus::Rejected),
            "in_production" => Ok(CampaignStatus::InProduction),
            "shipped" => Ok(CampaignStatus::Shipped),
            "delivered" => Ok(CampaignStatus::Delivered),
            other => anyhow::bail!("unknown campaign status {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => anyhow::bail!("unknown payment status {other:?}"),
        }
    }
}

/// Campaign row. Enum columns are TEXT; use the typed accessors.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub bottle_type: String,
    pub quantity: i32,
    /// Paise.
    pub amount: i64,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub rejection_reason: Option<String>,
    pub tracking_number: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Campaign {
    pub fn status(&self) -> anyhow::Result<CampaignStatus> {
        self.status.parse()
    }

    pub fn payment_status(&self) -> anyhow::Result<PaymentStatus> {
        self.payment_status.parse()
    }
}

/// Fields for a freshly placed order.
#[derive(Debug)]
pub struct NewCampaign<'a> {
    pub user_id: Uuid,
    pub customer_name: &'a str,
    pub phone: &'a str,
    pub address: &'a str,
    pub city: &'a str,
    pub pincode: &'a str,
    pub bottle_type: &'a str,
    pub quantity: i32,
    pub amount: i64,
    pub payment_method: &'a str,
}
