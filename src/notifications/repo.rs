use anyhow::Context;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::notifications::repo_types::Notification;

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, read, created_at";

// Every read and write is scoped by user_id; a foreign id behaves like a missing one.
impl Notification {
    pub async fn create<'e, E: PgExecutor<'e>>(
        db: E,
        user_id: Uuid,
        title: &str,
        message: &str,
    ) -> anyhow::Result<Notification> {
        let n = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (user_id, title, message)
            VALUES ($1, $2, $3)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(title)
        .bind(message)
        .fetch_one(db)
        .await
        .context("insert notification")?;
        Ok(n)
    }

    pub async fn list(
        db: &PgPool,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR read = FALSE)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list notifications")?;
        Ok(rows)
    }

    pub async fn mark_read(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await
            .context("mark notification read")?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn mark_all_read(db: &PgPool, user_id: Uuid) -> anyhow::Result<u64> {
        let res =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE")
                .bind(user_id)
                .execute(db)
                .await
                .context("mark all notifications read")?;
        Ok(res.rows_affected())
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await
            .context("delete notification")?;
        Ok(res.rows_affected() == 1)
    }
}
