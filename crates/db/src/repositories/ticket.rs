use sqlx::Row;

use parley_core::domain::session::SessionId;
use parley_core::domain::tenant::TenantId;
use parley_core::domain::ticket::{EscalationTicket, TicketId, TicketStatus};

use super::{RepositoryError, TicketRepository};
use crate::DbPool;

pub struct SqlTicketRepository {
    pool: DbPool,
}

impl SqlTicketRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TicketRepository for SqlTicketRepository {
    async fn save(&self, ticket: EscalationTicket) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO escalation_tickets (id, tenant_id, session_id, status, summary, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&ticket.id.0)
        .bind(&ticket.tenant_id.0)
        .bind(&ticket.session_id.0)
        .bind(ticket.status.as_str())
        .bind(&ticket.summary)
        .bind(ticket.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<EscalationTicket>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, session_id, status, summary, created_at \
             FROM escalation_tickets WHERE session_id = ?1 ORDER BY created_at ASC",
        )
        .bind(&session_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_ticket).collect()
    }

    async fn update_status(
        &self,
        id: &TicketId,
        status: TicketStatus,
    ) -> Result<bool, RepositoryError> {
        // The transition guard lives in the statement so concurrent updates
        // cannot move a ticket backwards between read and write.
        let result = sqlx::query(
            "UPDATE escalation_tickets SET status = ?2 \
             WHERE id = ?1 AND ( \
                 (status = 'pending' AND ?2 IN ('in_progress', 'resolved')) \
                 OR (status = 'in_progress' AND ?2 = 'resolved'))",
        )
        .bind(&id.0)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn decode_ticket(row: sqlx::sqlite::SqliteRow) -> Result<EscalationTicket, RepositoryError> {
    let status_raw: String = row.get("status");
    let status = status_raw
        .parse::<TicketStatus>()
        .map_err(|err| RepositoryError::Decode(format!("escalation_tickets.status: {err}")))?;

    Ok(EscalationTicket {
        id: TicketId(row.get("id")),
        tenant_id: TenantId(row.get("tenant_id")),
        session_id: SessionId(row.get("session_id")),
        status,
        summary: row.get("summary"),
        created_at: row.get("created_at"),
    })
}
