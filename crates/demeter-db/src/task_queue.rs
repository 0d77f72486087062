use sqlx::PgPool;

use demeter_core::error::AppError;
use demeter_core::task::Task;
use demeter_core::traits::TaskQueue;

/// PostgreSQL-backed task queue using `DELETE ... FOR UPDATE SKIP LOCKED`.
///
/// Each channel is a slice of one `tasks` table; `id` is a bigserial, so
/// pop order follows push order per channel. A popped row is gone: delivery
/// is at-most-once, and redelivery after a fetch failure happens through
/// the explicit retry push.
#[derive(Clone)]
pub struct PgTaskQueue {
    pool: PgPool,
}

impl PgTaskQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TaskQueue for PgTaskQueue {
    async fn push(&self, task: &Task) -> Result<(), AppError> {
        let payload = serde_json::to_value(task)?;
        sqlx::query(r#"INSERT INTO tasks (channel, payload) VALUES ($1, $2)"#)
            .bind(Task::channel(&task.item_type))
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn pop(&self, item_type: &str) -> Result<Option<Task>, AppError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r#"
            DELETE FROM tasks
            WHERE id = (
                SELECT id FROM tasks
                WHERE channel = $1
                ORDER BY id
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING payload
            "#,
        )
        .bind(Task::channel(item_type))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        match row {
            None => Ok(None),
            Some((payload,)) => Ok(Some(serde_json::from_value(payload)?)),
        }
    }
}
