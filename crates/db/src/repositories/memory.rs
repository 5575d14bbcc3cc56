use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use parley_core::domain::message::Message;
use parley_core::domain::session::{Session, SessionId};
use parley_core::domain::tenant::{Tenant, TenantId};
use parley_core::domain::ticket::{EscalationTicket, TicketId, TicketStatus};

use super::{
    MessageRepository, RepositoryError, SessionRepository, TenantRepository, TicketRepository,
};

#[derive(Default)]
pub struct InMemoryTenantRepository {
    tenants: RwLock<HashMap<String, Tenant>>,
}

#[async_trait::async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        let tenants = self.tenants.read().await;
        Ok(tenants.get(&id.0).cloned())
    }

    async fn save(&self, tenant: Tenant) -> Result<(), RepositoryError> {
        let mut tenants = self.tenants.write().await;
        tenants.insert(tenant.id.0.clone(), tenant);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_id(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id.0).cloned())
    }

    async fn save(&self, session: Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        // Mirror the SQL upsert: a latency value that is already set wins.
        let mut session = session;
        if let Some(existing) = sessions.get(&session.id.0) {
            if existing.first_response_latency_seconds.is_some() {
                session.first_response_latency_seconds = existing.first_response_latency_seconds;
            }
        }
        sessions.insert(session.id.0.clone(), session);
        Ok(())
    }

    async fn update_analysis(
        &self,
        id: &SessionId,
        summary: &str,
        intent: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id.0) {
            Some(session) => {
                session.summary = Some(summary.to_string());
                session.intent = Some(intent.to_string());
                session.summary_generated_at = Some(generated_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, message: Message) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        messages.push(message);
        Ok(())
    }

    async fn list_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        let mut matching: Vec<Message> = messages
            .iter()
            .filter(|message| message.session_id == *session_id)
            .cloned()
            .collect();
        matching.sort_by_key(|message| message.created_at);
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryTicketRepository {
    tickets: RwLock<HashMap<String, EscalationTicket>>,
}

#[async_trait::async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn save(&self, ticket: EscalationTicket) -> Result<(), RepositoryError> {
        let mut tickets = self.tickets.write().await;
        tickets.insert(ticket.id.0.clone(), ticket);
        Ok(())
    }

    async fn list_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<EscalationTicket>, RepositoryError> {
        let tickets = self.tickets.read().await;
        let mut matching: Vec<EscalationTicket> = tickets
            .values()
            .filter(|ticket| ticket.session_id == *session_id)
            .cloned()
            .collect();
        matching.sort_by_key(|ticket| ticket.created_at);
        Ok(matching)
    }

    async fn update_status(
        &self,
        id: &TicketId,
        status: TicketStatus,
    ) -> Result<bool, RepositoryError> {
        let mut tickets = self.tickets.write().await;
        match tickets.get_mut(&id.0) {
            Some(ticket) if ticket.status.can_transition_to(status) => {
                ticket.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
