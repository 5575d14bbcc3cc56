use sqlx::Row;

use parley_core::domain::message::{Message, MessageId, Sender};
use parley_core::domain::session::{ParticipantId, SessionId};

use super::{MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn append(&self, message: Message) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO messages (id, session_id, participant_id, sender, text, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&message.id.0)
        .bind(&message.session_id.0)
        .bind(&message.participant_id.0)
        .bind(message.sender.as_str())
        .bind(&message.text)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, session_id, participant_id, sender, text, created_at \
             FROM messages WHERE session_id = ?1 ORDER BY created_at ASC",
        )
        .bind(&session_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_message).collect()
    }
}

fn decode_message(row: sqlx::sqlite::SqliteRow) -> Result<Message, RepositoryError> {
    let sender_raw: String = row.get("sender");
    let sender = sender_raw
        .parse::<Sender>()
        .map_err(|err| RepositoryError::Decode(format!("messages.sender: {err}")))?;

    Ok(Message {
        id: MessageId(row.get("id")),
        session_id: SessionId(row.get("session_id")),
        participant_id: ParticipantId(row.get("participant_id")),
        sender,
        text: row.get("text"),
        created_at: row.get("created_at"),
    })
}
