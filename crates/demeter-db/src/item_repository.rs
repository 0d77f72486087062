use sqlx::{PgPool, Postgres, QueryBuilder};

use demeter_core::error::AppError;
use demeter_core::item::{BasicRecord, ItemPhase, ItemStats};
use demeter_core::traits::ItemStore;

/// PostgreSQL-backed item store.
///
/// One row per `(item_type, item_id)`, both metadata documents as JSONB.
#[derive(Clone)]
pub struct ItemRepository {
    pool: PgPool,
}

impl ItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ItemStore for ItemRepository {
    async fn bulk_upsert_basic(
        &self,
        item_type: &str,
        records: &[BasicRecord],
    ) -> Result<(), AppError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO items (item_type, item_id, basic_metadata, phase, updated_at) ",
        );
        builder.push_values(records, |mut row, record| {
            row.push_bind(item_type)
                .push_bind(&record.item_id)
                .push_bind(&record.metadata)
                .push_bind(ItemPhase::Basic.as_str())
                .push("NOW()");
        });
        // Rescrape overwrites the basic document and demotes the item back
        // to the basic phase; any stored extended document is kept.
        builder.push(
            " ON CONFLICT (item_type, item_id) DO UPDATE SET \
             basic_metadata = EXCLUDED.basic_metadata, \
             phase = EXCLUDED.phase, \
             updated_at = NOW()",
        );
        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn upsert_extended(
        &self,
        item_type: &str,
        item_id: &str,
        metadata: &serde_json::Value,
    ) -> Result<(), AppError> {
        // Point update: ids that never made it through phase 1 stay absent.
        sqlx::query(
            r#"
            UPDATE items
            SET extended_metadata = $3, phase = 'extended', updated_at = NOW()
            WHERE item_type = $1 AND item_id = $2
            "#,
        )
        .bind(item_type)
        .bind(item_id)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn phase(&self, item_type: &str, item_id: &str) -> Result<Option<ItemPhase>, AppError> {
        let row: Option<(String,)> =
            sqlx::query_as(r#"SELECT phase FROM items WHERE item_type = $1 AND item_id = $2"#)
                .bind(item_type)
                .bind(item_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        match row {
            None => Ok(None),
            Some((phase,)) => phase
                .parse()
                .map(Some)
                .map_err(AppError::DatabaseError),
        }
    }

    async fn list_authors(&self, item_types: &[&str]) -> Result<Vec<String>, AppError> {
        let item_types: Vec<String> = item_types.iter().map(|t| t.to_string()).collect();
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT basic_metadata->>'author' AS author
            FROM items
            WHERE item_type = ANY($1) AND basic_metadata->>'author' IS NOT NULL
            ORDER BY author
            "#,
        )
        .bind(&item_types)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|(author,)| author).collect())
    }

    async fn list_item_ids(&self, item_type: &str) -> Result<Vec<String>, AppError> {
        let rows: Vec<(String,)> =
            sqlx::query_as(r#"SELECT item_id FROM items WHERE item_type = $1 ORDER BY item_id"#)
                .bind(item_type)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn stats(&self, item_type: &str) -> Result<ItemStats, AppError> {
        let (total, basic, extended): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE phase = 'basic'),
                   COUNT(*) FILTER (WHERE phase = 'extended')
            FROM items
            WHERE item_type = $1
            "#,
        )
        .bind(item_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(ItemStats {
            total,
            basic,
            extended,
        })
    }
}
