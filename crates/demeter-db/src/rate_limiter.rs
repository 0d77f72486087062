use chrono::{Duration, Utc};
use sqlx::PgPool;

use demeter_core::error::AppError;
use demeter_core::traits::RateLimiter;

/// Trailing window length shared by every limiter key.
const WINDOW_SECONDS: i64 = 60;

/// PostgreSQL-backed sliding-window rate limiter.
///
/// Admissions are timestamped rows; the check-and-record runs inside a
/// transaction holding `pg_advisory_xact_lock` on the key, so concurrent
/// workers across processes serialize per key and the window can never be
/// oversubscribed. Admission timestamps come from the caller's clock; clock
/// skew between worker hosts shifts the window edge, not its length.
#[derive(Clone)]
pub struct PgRateLimiter {
    pool: PgPool,
}

impl PgRateLimiter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RateLimiter for PgRateLimiter {
    async fn admit(&self, key: &str, limit: u32) -> Result<bool, AppError> {
        let key = format!("rate_limit:{key}");
        // One timestamp serves both the prune cutoff and the admission row,
        // so each admission stays visible for exactly the window length.
        let now = Utc::now();
        let cutoff = now - Duration::seconds(WINDOW_SECONDS);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        sqlx::query(r#"SELECT pg_advisory_xact_lock(hashtext($1))"#)
            .bind(&key)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        // Expire admissions that slid out of the window.
        sqlx::query(
            r#"
            DELETE FROM rate_limit_admissions
            WHERE key = $1 AND admitted_at < $2
            "#,
        )
        .bind(&key)
        .bind(cutoff)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let (count,): (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM rate_limit_admissions WHERE key = $1"#)
                .bind(&key)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        let admitted = count < i64::from(limit);
        if admitted {
            sqlx::query(r#"INSERT INTO rate_limit_admissions (key, admitted_at) VALUES ($1, $2)"#)
                .bind(&key)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(admitted)
    }
}
