use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use parley_core::domain::message::Message;
use parley_core::domain::session::{Session, SessionId};
use parley_core::domain::tenant::{Tenant, TenantId};
use parley_core::domain::ticket::{EscalationTicket, TicketId, TicketStatus};

pub mod memory;
pub mod message;
pub mod session;
pub mod tenant;
pub mod ticket;

pub use memory::{
    InMemoryMessageRepository, InMemorySessionRepository, InMemoryTenantRepository,
    InMemoryTicketRepository,
};
pub use message::SqlMessageRepository;
pub use session::SqlSessionRepository;
pub use tenant::SqlTenantRepository;
pub use ticket::SqlTicketRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for parley_core::errors::CoreError {
    fn from(err: RepositoryError) -> Self {
        Self::provider("store", err)
    }
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError>;
    async fn save(&self, tenant: Tenant) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError>;
    async fn save(&self, session: Session) -> Result<(), RepositoryError>;

    /// Idempotent last-write-wins overwrite of the analysis result.
    /// Returns false when the session no longer exists.
    async fn update_analysis(
        &self,
        id: &SessionId,
        summary: &str,
        intent: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(&self, message: Message) -> Result<(), RepositoryError>;
    async fn list_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Message>, RepositoryError>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn save(&self, ticket: EscalationTicket) -> Result<(), RepositoryError>;
    async fn list_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<EscalationTicket>, RepositoryError>;

    /// Applies a forward-only status transition. Returns false when the
    /// ticket does not exist or the transition would move backwards.
    async fn update_status(
        &self,
        id: &TicketId,
        status: TicketStatus,
    ) -> Result<bool, RepositoryError>;
}
