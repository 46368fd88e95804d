use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    campaigns::{
        dto::{CampaignQuery, UpdateStatusRequest},
        repo_types::{Campaign, CampaignStatus},
    },
    error::{AppError, AppResult},
    notifications::services::notify_status,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/campaigns", get(list_campaigns))
        .route("/campaigns/:id", get(get_campaign).delete(delete_campaign))
        .route("/campaigns/:id/status", patch(update_status))
}

fn parse_status(raw: &str) -> AppResult<CampaignStatus> {
    raw.trim().parse().map_err(|_| {
        warn!(status = %raw, "unknown campaign status");
        AppError::BadRequest("Unknown campaign status".into())
    })
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

#[instrument(skip(state))]
pub async fn list_campaigns(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<CampaignQuery>,
) -> AppResult<Json<Vec<Campaign>>> {
    let status = q.status.as_deref().map(parse_status).transpose()?;
    // Customers only ever see their own orders
    let owner = (!user.role.is_staff()).then_some(user.id);
    let items = Campaign::list(
        &state.db,
        owner,
        status,
        q.limit.clamp(1, 100),
        q.offset.max(0),
    )
    .await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_campaign(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Campaign>> {
    let campaign = Campaign::find_by_id(&state.db, id)
        .await?
        .filter(|c| c.user_id == user.id || user.role.is_staff())
        .ok_or_else(|| AppError::NotFound("Campaign not found".into()))?;
    Ok(Json(campaign))
}

#[instrument(skip(state, payload))]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<Campaign>> {
    user.require_staff()?;
    let to = parse_status(&payload.status)?;

    let reason = non_empty(payload.rejection_reason.as_deref());
    let tracking = non_empty(payload.tracking_number.as_deref());
    if to == CampaignStatus::Rejected && reason.is_none() {
        return Err(AppError::BadRequest("Rejection reason is required".into()));
    }
    if to == CampaignStatus::Shipped && tracking.is_none() {
        return Err(AppError::BadRequest("Tracking number is required".into()));
    }

    let campaign = Campaign::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Campaign not found".into()))?;
    let from = campaign.status()?;
    if !from.can_transition_to(to) {
        warn!(campaign_id = %id, from = from.as_str(), to = to.as_str(), "illegal campaign transition");
        return Err(AppError::Conflict(format!(
            "Cannot move campaign from {} to {}",
            from.as_str(),
            to.as_str()
        )));
    }

    let mut tx = state.db.begin().await.context("begin status tx")?;
    let updated = Campaign::update_status(
        &mut *tx,
        id,
        from,
        to,
        reason.filter(|_| to == CampaignStatus::Rejected),
        tracking.filter(|_| to == CampaignStatus::Shipped),
    )
    .await?
    .ok_or_else(|| AppError::Conflict("Campaign was changed by someone else".into()))?;
    notify_status(&mut *tx, &updated, to).await?;
    tx.commit().await.context("commit status tx")?;

    info!(
        campaign_id = %id,
        by = %user.id,
        from = from.as_str(),
        to = to.as_str(),
        "campaign status changed"
    );
    Ok(Json(updated))
}

#[instrument(skip(state))]
pub async fn delete_campaign(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_admin()?;
    if !Campaign::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Campaign not found".into()));
    }
    info!(campaign_id = %id, by = %user.id, "campaign deleted");
    Ok(StatusCode::NO_CONTENT)
}
