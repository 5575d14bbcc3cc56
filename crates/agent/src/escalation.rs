use std::sync::Arc;

use tracing::{info, warn};

use parley_core::domain::session::SessionId;
use parley_core::domain::ticket::{EscalationTicket, TicketId, TicketStatus};
use parley_core::errors::{CoreError, CoreResult};
use parley_db::repositories::{SessionRepository, TenantRepository, TicketRepository};

use crate::notify::Notifier;

/// Fixed reply when the tenant has escalation switched off. A decline is a
/// normal conversational outcome, not an error; the conversation continues.
pub const ESCALATION_DECLINED_REPLY: &str =
    "I'm sorry, but I can't connect you to a human agent right now. \
     I'll do my best to help you here instead.";

/// Fixed reply once a ticket has been created.
pub const ESCALATION_CONFIRMED_REPLY: &str =
    "I've passed your request on to the support team. Someone will follow up with you shortly.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscalationOutcome {
    Escalated { ticket_id: TicketId, status: TicketStatus },
    Declined,
}

/// Deterministic hop chain session -> participant -> tenant, gated on the
/// tenant's escalation flag, with ticket creation and best-effort
/// notification. Repeated triggers within one session create repeated
/// tickets; dedup is a product decision that has not been made.
pub struct EscalationWorkflow {
    sessions: Arc<dyn SessionRepository>,
    tenants: Arc<dyn TenantRepository>,
    tickets: Arc<dyn TicketRepository>,
    notifier: Arc<dyn Notifier>,
}

impl EscalationWorkflow {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        tenants: Arc<dyn TenantRepository>,
        tickets: Arc<dyn TicketRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { sessions, tenants, tickets, notifier }
    }

    /// Resolves the hop chain and, when the tenant allows it, persists a
    /// pending ticket and notifies the configured recipients. A missing hop
    /// is a terminal `NotFound`. Notification failure is logged only and
    /// never rolls back the ticket.
    pub async fn escalate(
        &self,
        session_id: &SessionId,
        reason: &str,
        last_participant_text: &str,
    ) -> CoreResult<EscalationOutcome> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| CoreError::not_found("session", session_id.0.clone()))?;

        let tenant = self
            .tenants
            .find_by_id(&session.tenant_id)
            .await?
            .ok_or_else(|| CoreError::not_found("tenant", session.tenant_id.0.clone()))?;

        if !tenant.escalation_enabled {
            info!(
                event_name = "escalation.declined",
                tenant_id = %tenant.id,
                session_id = %session_id,
            );
            return Ok(EscalationOutcome::Declined);
        }

        let summary = format!("{reason}\nLast participant message: {last_participant_text}");
        let ticket = EscalationTicket::new(tenant.id.clone(), session_id.clone(), summary);
        self.tickets.save(ticket.clone()).await?;

        info!(
            event_name = "escalation.ticket_created",
            tenant_id = %tenant.id,
            session_id = %session_id,
            ticket_id = %ticket.id,
        );

        if !tenant.escalation_recipients.is_empty() {
            let subject = format!("Escalation from a {} conversation", tenant.name);
            let body = format!(
                "Session: {session_id}\nParticipant: {}\nReason: {reason}\n\
                 Last participant message: {last_participant_text}",
                session.participant_id,
            );

            let sent = self.notifier.send(&tenant.escalation_recipients, &subject, &body).await;
            if !sent {
                warn!(
                    event_name = "escalation.notify_failed",
                    tenant_id = %tenant.id,
                    session_id = %session_id,
                    ticket_id = %ticket.id,
                );
            }
        }

        Ok(EscalationOutcome::Escalated { ticket_id: ticket.id, status: ticket.status })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use parley_core::domain::session::{ParticipantId, Session, SessionId};
    use parley_core::domain::tenant::Tenant;
    use parley_core::domain::ticket::TicketStatus;
    use parley_core::errors::CoreError;
    use parley_db::repositories::{
        InMemorySessionRepository, InMemoryTenantRepository, InMemoryTicketRepository,
        SessionRepository, TenantRepository, TicketRepository,
    };

    use crate::notify::Notifier;

    use super::{EscalationOutcome, EscalationWorkflow};

    #[derive(Default)]
    struct RecordingNotifier {
        sends: AtomicUsize,
        accept: bool,
    }

    impl RecordingNotifier {
        fn accepting() -> Self {
            Self { sends: AtomicUsize::new(0), accept: true }
        }

        fn failing() -> Self {
            Self { sends: AtomicUsize::new(0), accept: false }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, _recipients: &[String], _subject: &str, _body: &str) -> bool {
            self.sends.fetch_add(1, Ordering::SeqCst);
            self.accept
        }
    }

    struct Fixture {
        workflow: EscalationWorkflow,
        tickets: Arc<InMemoryTicketRepository>,
        notifier: Arc<RecordingNotifier>,
        session_id: SessionId,
    }

    async fn fixture(tenant: Tenant, notifier: RecordingNotifier) -> Fixture {
        let sessions = Arc::new(InMemorySessionRepository::default());
        let tenants = Arc::new(InMemoryTenantRepository::default());
        let tickets = Arc::new(InMemoryTicketRepository::default());
        let notifier = Arc::new(notifier);

        let session = Session::new(
            SessionId("s-1".to_string()),
            tenant.id.clone(),
            ParticipantId("p-1".to_string()),
        );
        let session_id = session.id.clone();
        sessions.save(session).await.expect("seed session");
        tenants.save(tenant).await.expect("seed tenant");

        let workflow = EscalationWorkflow::new(
            sessions,
            tenants,
            tickets.clone(),
            notifier.clone(),
        );
        Fixture { workflow, tickets, notifier, session_id }
    }

    #[tokio::test]
    async fn disabled_tenant_declines_and_creates_no_ticket() {
        let tenant = Tenant::new("t-1", "Acme");
        let fx = fixture(tenant, RecordingNotifier::accepting()).await;

        let outcome = fx
            .workflow
            .escalate(&fx.session_id, "participant asked for a human", "get me a person")
            .await
            .expect("escalate");

        assert_eq!(outcome, EscalationOutcome::Declined);
        assert!(fx.tickets.list_for_session(&fx.session_id).await.expect("list").is_empty());
        assert_eq!(fx.notifier.sends.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn enabled_tenant_with_no_recipients_creates_ticket_without_notifying() {
        let mut tenant = Tenant::new("t-1", "Acme");
        tenant.escalation_enabled = true;
        let fx = fixture(tenant, RecordingNotifier::accepting()).await;

        let outcome = fx
            .workflow
            .escalate(&fx.session_id, "negative sentiment", "this is useless")
            .await
            .expect("escalate");

        assert!(matches!(
            outcome,
            EscalationOutcome::Escalated { status: TicketStatus::Pending, .. }
        ));
        let tickets = fx.tickets.list_for_session(&fx.session_id).await.expect("list");
        assert_eq!(tickets.len(), 1);
        assert!(tickets[0].summary.contains("negative sentiment"));
        assert!(tickets[0].summary.contains("this is useless"));
        assert_eq!(fx.notifier.sends.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn notification_failure_never_rolls_back_the_ticket() {
        let mut tenant = Tenant::new("t-1", "Acme");
        tenant.escalation_enabled = true;
        tenant.escalation_recipients = vec!["ops@acme.test".to_string()];
        let fx = fixture(tenant, RecordingNotifier::failing()).await;

        let outcome = fx
            .workflow
            .escalate(&fx.session_id, "participant asked for a human", "I need a person")
            .await
            .expect("escalate");

        assert!(matches!(outcome, EscalationOutcome::Escalated { .. }));
        assert_eq!(fx.tickets.list_for_session(&fx.session_id).await.expect("list").len(), 1);
        assert_eq!(fx.notifier.sends.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn repeated_triggers_create_repeated_tickets() {
        let mut tenant = Tenant::new("t-1", "Acme");
        tenant.escalation_enabled = true;
        let fx = fixture(tenant, RecordingNotifier::accepting()).await;

        fx.workflow.escalate(&fx.session_id, "first", "one").await.expect("first");
        fx.workflow.escalate(&fx.session_id, "second", "two").await.expect("second");

        assert_eq!(fx.tickets.list_for_session(&fx.session_id).await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn missing_session_is_a_terminal_not_found() {
        let tenant = Tenant::new("t-1", "Acme");
        let fx = fixture(tenant, RecordingNotifier::accepting()).await;

        let error = fx
            .workflow
            .escalate(&SessionId("missing".to_string()), "reason", "text")
            .await
            .expect_err("missing session must fail");
        assert!(matches!(error, CoreError::NotFound { kind: "session", .. }));
    }
}
