use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    notifications::{
        dto::{MarkedReadResponse, NotificationQuery},
        repo_types::Notification,
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", patch(mark_all_read))
        .route("/notifications/:id/read", patch(mark_read))
        .route("/notifications/:id", delete(delete_notification))
}

#[instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<NotificationQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let items = Notification::list(
        &state.db,
        user.id,
        q.unread_only,
        q.limit.clamp(1, 100),
        q.offset.max(0),
    )
    .await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !Notification::mark_read(&state.db, user.id, id).await? {
        return Err(AppError::NotFound("Notification not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<MarkedReadResponse>> {
    let updated = Notification::mark_all_read(&state.db, user.id).await?;
    info!(user_id = %user.id, updated, "notifications marked read");
    Ok(Json(MarkedReadResponse { updated }))
}

#[instrument(skip(state))]
pub async fn delete_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    if !Notification::delete(&state.db, user.id, id).await? {
        return Err(AppError::NotFound("Notification not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::state::AppState;

    #[tokio::test]
    async fn every_route_requires_login() {
        let id = uuid::Uuid::new_v4();
        let cases = [
            ("GET", "/api/notifications".to_string()),
            ("PATCH", "/api/notifications/read-all".to_string()),
            ("PATCH", format!("/api/notifications/{id}/read")),
            ("DELETE", format!("/api/notifications/{id}")),
        ];
        let app = crate::app::build_app(AppState::fake());
        for (method, path) in cases {
            let resp = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(&path)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {path}");
        }
    }
}
