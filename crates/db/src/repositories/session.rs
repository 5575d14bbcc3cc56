use chrono::{DateTime, Utc};
use sqlx::Row;

use parley_core::domain::session::{ParticipantId, Session, SessionId};
use parley_core::domain::tenant::TenantId;

use super::{RepositoryError, SessionRepository};
use crate::DbPool;

pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, participant_id, origin, device, locale, referrer, \
             country, city, created_at, last_message_at, total_messages, \
             participant_messages, agent_messages, duration_seconds, \
             first_response_latency_seconds, summary, intent, summary_generated_at \
             FROM sessions WHERE id = ?1",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(decode_session))
    }

    async fn save(&self, session: Session) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO sessions \
             (id, tenant_id, participant_id, origin, device, locale, referrer, country, city, \
              created_at, last_message_at, total_messages, participant_messages, agent_messages, \
              duration_seconds, first_response_latency_seconds, summary, intent, summary_generated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19) \
             ON CONFLICT(id) DO UPDATE SET \
             origin = excluded.origin, \
             device = excluded.device, \
             locale = excluded.locale, \
             referrer = excluded.referrer, \
             country = excluded.country, \
             city = excluded.city, \
             last_message_at = excluded.last_message_at, \
             total_messages = excluded.total_messages, \
             participant_messages = excluded.participant_messages, \
             agent_messages = excluded.agent_messages, \
             duration_seconds = excluded.duration_seconds, \
             first_response_latency_seconds = \
                 COALESCE(sessions.first_response_latency_seconds, excluded.first_response_latency_seconds)",
        )
        .bind(&session.id.0)
        .bind(&session.tenant_id.0)
        .bind(&session.participant_id.0)
        .bind(&session.origin)
        .bind(&session.device)
        .bind(&session.locale)
        .bind(&session.referrer)
        .bind(&session.country)
        .bind(&session.city)
        .bind(session.created_at)
        .bind(session.last_message_at)
        .bind(session.total_messages)
        .bind(session.participant_messages)
        .bind(session.agent_messages)
        .bind(session.duration_seconds)
        .bind(session.first_response_latency_seconds)
        .bind(&session.summary)
        .bind(&session.intent)
        .bind(session.summary_generated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_analysis(
        &self,
        id: &SessionId,
        summary: &str,
        intent: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE sessions \
             SET summary = ?2, intent = ?3, summary_generated_at = ?4 \
             WHERE id = ?1",
        )
        .bind(&id.0)
        .bind(summary)
        .bind(intent)
        .bind(generated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn decode_session(row: sqlx::sqlite::SqliteRow) -> Session {
    Session {
        id: SessionId(row.get("id")),
        tenant_id: TenantId(row.get("tenant_id")),
        participant_id: ParticipantId(row.get("participant_id")),
        origin: row.get("origin"),
        device: row.get("device"),
        locale: row.get("locale"),
        referrer: row.get("referrer"),
        country: row.get("country"),
        city: row.get("city"),
        created_at: row.get("created_at"),
        last_message_at: row.get("last_message_at"),
        total_messages: row.get("total_messages"),
        participant_messages: row.get("participant_messages"),
        agent_messages: row.get("agent_messages"),
        duration_seconds: row.get("duration_seconds"),
        first_response_latency_seconds: row.get("first_response_latency_seconds"),
        summary: row.get("summary"),
        intent: row.get("intent"),
        summary_generated_at: row.get("summary_generated_at"),
    }
}
