use sqlx::PgExecutor;

use crate::campaigns::repo_types::{Campaign, CampaignStatus, PaymentStatus};
use crate::notifications::repo_types::Notification;

/// Title and body shown to the owner when their campaign changes status.
pub fn status_message(campaign: &Campaign, status: CampaignStatus) -> (String, String) {
    let short = short_id(campaign);
    match status {
        CampaignStatus::Pending => (
            "Campaign received".into(),
            format!("Campaign {short} is awaiting review."),
        ),
        CampaignStatus::Approved => (
            "Campaign approved".into(),
            format!("Campaign {short} has been approved."),
        ),
        CampaignStatus::Rejected => (
            "Campaign rejected".into(),
            match campaign.rejection_reason.as_deref() {
                Some(reason) => format!("Campaign {short} was rejected: {reason}"),
                None => format!("Campaign {short} was rejected."),
            },
        ),
        CampaignStatus::InProduction => (
            "Campaign in production".into(),
            format!(
                "Printing has started for {} bottles in campaign {short}.",
                campaign.quantity
            ),
        ),
        CampaignStatus::Shipped => (
            "Campaign shipped".into(),
            match campaign.tracking_number.as_deref() {
                Some(tracking) => format!("Campaign {short} has shipped. Tracking number: {tracking}"),
                None => format!("Campaign {short} has shipped."),
            },
        ),
        CampaignStatus::Delivered => (
            "Campaign delivered".into(),
            format!("Campaign {short} has been delivered."),
        ),
    }
}

pub fn payment_message(campaign: &Campaign, status: PaymentStatus) -> (String, String) {
    let short = short_id(campaign);
    let rupees = format!("{}.{:02}", campaign.amount / 100, campaign.amount % 100);
    match status {
        PaymentStatus::Paid => (
            "Payment received".into(),
            format!("We received ₹{rupees} for campaign {short}."),
        ),
        PaymentStatus::Failed => (
            "Payment failed".into(),
            format!("Payment of ₹{rupees} for campaign {short} did not go through."),
        ),
        PaymentStatus::Pending => (
            "Payment pending".into(),
            format!("Payment of ₹{rupees} for campaign {short} is pending."),
        ),
    }
}

fn short_id(campaign: &Campaign) -> String {
    campaign.id.simple().to_string()[..8].to_uppercase()
}

pub async fn notify_status<'e, E: PgExecutor<'e>>(
    db: E,
    campaign: &Campaign,
    status: CampaignStatus,
) -> anyhow::Result<Notification> {
    let (title, message) = status_message(campaign, status);
    Notification::create(db, campaign.user_id, &title, &message).await
}

pub async fn notify_payment<'e, E: PgExecutor<'e>>(
    db: E,
    campaign: &Campaign,
    status: PaymentStatus,
) -> anyhow::Result<Notification> {
    let (title, message) = payment_message(campaign, status);
    Notification::create(db, campaign.user_id, &title, &message).await
}
