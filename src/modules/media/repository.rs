use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use super::model::{EncodeStatus, JobId, VideoStatus, VideoStatusRow};
use crate::common::error::StatusError;

/// Persistence for per-video encode status records.
///
/// The encode queue is the only writer of transitions for a given name;
/// lookups may come from anywhere at any time.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Create the initial `pending` record for a job.
    async fn insert_pending(&self, name: &JobId) -> Result<VideoStatus, StatusError>;

    /// Move a record to `next`, refreshing `updated_at`.
    ///
    /// Applies only when the stored status is `next.predecessor()`.
    async fn transition(
        &self,
        name: &JobId,
        next: EncodeStatus,
        message: Option<&str>,
    ) -> Result<(), StatusError>;

    async fn find(&self, name: &str) -> Result<Option<VideoStatus>, StatusError>;
}

#[derive(Clone)]
pub struct PgStatusStore {
    pool: PgPool,
    table: String,
}

impl PgStatusStore {
    /// `table` must already be a validated identifier (see `AppConfig`).
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    fn index_name(&self) -> String {
        format!("{}_name_key", self.table)
    }

    fn create_table_sql(&self) -> String {
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id UUID PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table
        )
    }

    fn create_index_sql(&self) -> String {
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} (name)",
            self.index_name(),
            self.table
        )
    }

    /// Binds: id, name, status, message, created_at, updated_at. Returns no
    /// row when the name is already taken.
    fn insert_pending_sql(&self) -> String {
        format!(
            r#"
            INSERT INTO {} (id, name, status, message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (name) DO NOTHING
            RETURNING id, name, status, message, created_at, updated_at
            "#,
            self.table
        )
    }

    /// Binds: name, next status, message, required current status.
    fn transition_sql(&self) -> String {
        format!(
            r#"
            UPDATE {}
            SET status = $2, message = $3, updated_at = NOW()
            WHERE name = $1 AND status = $4
            "#,
            self.table
        )
    }

    fn find_sql(&self) -> String {
        format!(
            "SELECT id, name, status, message, created_at, updated_at FROM {} WHERE name = $1",
            self.table
        )
    }

    pub async fn ensure_schema(&self) -> Result<(), StatusError> {
        sqlx::query(&self.create_table_sql())
            .execute(&self.pool)
            .await?;
        self.ensure_index().await
    }

    pub async fn exists_index(&self) -> Result<bool, StatusError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pg_indexes WHERE tablename = $1 AND indexname = $2)",
        )
        .bind(&self.table)
        .bind(self.index_name())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn ensure_index(&self) -> Result<(), StatusError> {
        if self.exists_index().await? {
            return Ok(());
        }

        sqlx::query(&self.create_index_sql())
            .execute(&self.pool)
            .await?;
        info!(table = %self.table, "Created unique index on video status name");
        Ok(())
    }
}

/// Why a guarded update touched no row, given what is stored for `name` now.
fn refused_transition(
    name: &JobId,
    current: Option<&VideoStatus>,
    next: EncodeStatus,
) -> StatusError {
    match current {
        Some(current) => StatusError::InvalidTransition {
            name: name.to_string(),
            from: current.status,
            to: next,
        },
        None => StatusError::NotFound(name.to_string()),
    }
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn insert_pending(&self, name: &JobId) -> Result<VideoStatus, StatusError> {
        let record = VideoStatus::pending(name);
        let row: Option<VideoStatusRow> = sqlx::query_as(&self.insert_pending_sql())
            .bind(record.id)
            .bind(&record.name)
            .bind(record.status.as_str())
            .bind(&record.message)
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => Err(StatusError::Duplicate(name.to_string())),
        }
    }

    async fn transition(
        &self,
        name: &JobId,
        next: EncodeStatus,
        message: Option<&str>,
    ) -> Result<(), StatusError> {
        if let Some(from) = next.predecessor() {
            let result = sqlx::query(&self.transition_sql())
                .bind(name.as_str())
                .bind(next.as_str())
                .bind(message.unwrap_or_default())
                .bind(from.as_str())
                .execute(&self.pool)
                .await?;

            if result.rows_affected() > 0 {
                return Ok(());
            }
        }

        let current = self.find(name.as_str()).await?;
        Err(refused_transition(name, current.as_ref(), next))
    }

    async fn find(&self, name: &str) -> Result<Option<VideoStatus>, StatusError> {
        let row: Option<VideoStatusRow> = sqlx::query_as(&self.find_sql())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(VideoStatus::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::media::model::derive_job_id;
    use sqlx::postgres::PgPoolOptions;
    use std::path::Path;

    fn lazy_store(table: &str) -> PgStatusStore {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        PgStatusStore::new(pool, table)
    }

    fn compact(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn index_is_named_after_the_table() {
        let store = lazy_store("video_status");
        assert_eq!(store.index_name(), "video_status_name_key");
        assert_eq!(
            store.create_index_sql(),
            "CREATE UNIQUE INDEX IF NOT EXISTS video_status_name_key ON video_status (name)"
        );
    }

    #[tokio::test]
    async fn statements_target_the_configured_table() {
        let store = lazy_store("encodes");
        for sql in [
            store.create_table_sql(),
            store.insert_pending_sql(),
            store.transition_sql(),
            store.find_sql(),
        ] {
            assert!(compact(&sql).contains(" encodes "), "{sql}");
            assert!(!sql.contains("video_status"), "{sql}");
        }
    }

    #[tokio::test]
    async fn insert_skips_names_that_are_taken() {
        let sql = compact(&lazy_store("video_status").insert_pending_sql());
        assert!(sql.contains("ON CONFLICT (name) DO NOTHING"));
        assert!(sql.ends_with("RETURNING id, name, status, message, created_at, updated_at"));
    }

    #[tokio::test]
    async fn update_is_guarded_on_the_current_status() {
        let sql = compact(&lazy_store("video_status").transition_sql());
        assert_eq!(
            sql,
            "UPDATE video_status SET status = $2, message = $3, updated_at = NOW() \
             WHERE name = $1 AND status = $4"
        );
    }

    #[test]
    fn refused_update_reports_the_stored_status() {
        let name = derive_job_id(Path::new("a.mp4")).unwrap();
        let stored = VideoStatus::pending(&name);

        let err = refused_transition(&name, Some(&stored), EncodeStatus::Success);
        assert!(matches!(
            err,
            StatusError::InvalidTransition {
                from: EncodeStatus::Pending,
                to: EncodeStatus::Success,
                ..
            }
        ));

        let err = refused_transition(&name, None, EncodeStatus::Processing);
        assert!(matches!(err, StatusError::NotFound(n) if n == "a"));
    }

    /// Needs a disposable database: `DATABASE_URL=... cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn postgres_store_round_trip() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = PgPoolOptions::new().connect(&url).await.unwrap();
        let table = format!("video_status_test_{}", uuid::Uuid::new_v4().simple());
        let store = PgStatusStore::new(pool.clone(), &table);
        store.ensure_schema().await.unwrap();
        assert!(store.exists_index().await.unwrap());

        let a = derive_job_id(Path::new("a.mp4")).unwrap();
        store.insert_pending(&a).await.unwrap();
        assert!(matches!(
            store.insert_pending(&a).await,
            Err(StatusError::Duplicate(_))
        ));
        assert!(matches!(
            store.transition(&a, EncodeStatus::Success, None).await,
            Err(StatusError::InvalidTransition { .. })
        ));

        store
            .transition(&a, EncodeStatus::Processing, None)
            .await
            .unwrap();
        store
            .transition(&a, EncodeStatus::Failed, Some("boom"))
            .await
            .unwrap();
        let record = store.find("a").await.unwrap().unwrap();
        assert_eq!(record.status, EncodeStatus::Failed);
        assert_eq!(record.message, "boom");

        let ghost = derive_job_id(Path::new("ghost.mp4")).unwrap();
        assert!(matches!(
            store.transition(&ghost, EncodeStatus::Processing, None).await,
            Err(StatusError::NotFound(_))
        ));

        sqlx::query(&format!("DROP TABLE {table}"))
            .execute(&pool)
            .await
            .unwrap();
    }
}
