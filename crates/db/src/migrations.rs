use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "tenants",
        "sessions",
        "messages",
        "escalation_tickets",
        "document_chunks",
        "idx_sessions_tenant_id",
        "idx_sessions_participant_id",
        "idx_messages_session_id",
        "idx_messages_created_at",
        "idx_escalation_tickets_tenant_id",
        "idx_escalation_tickets_session_id",
        "idx_document_chunks_tenant_id",
        "idx_document_chunks_tenant_source",
    ];

    #[tokio::test]
    async fn migrations_create_baseline_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let row = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE name = ?1",
            )
            .bind(object)
            .fetch_one(&pool)
            .await
            .expect("query sqlite_master");
            let count: i64 = row.get("count");
            assert_eq!(count, 1, "expected schema object `{object}` after migrations");
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
        pool.close().await;
    }
}
