use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use parley_core::domain::message::{Message, Sender};
use parley_core::domain::session::{ContextHints, ParticipantId, Session, SessionId};
use parley_core::domain::tenant::{Tenant, TenantId};
use parley_core::errors::{CoreError, CoreResult};
use parley_db::repositories::{MessageRepository, SessionRepository, TenantRepository};
use parley_retrieval::RetrievalService;

use crate::analysis::AnalysisScheduler;
use crate::escalation::{
    EscalationOutcome, EscalationWorkflow, ESCALATION_CONFIRMED_REPLY, ESCALATION_DECLINED_REPLY,
};
use crate::geo::{is_private_or_loopback, GeoLookup, UNRESOLVABLE_IP};
use crate::guardrails::GuardrailChain;
use crate::llm::LlmClient;
use crate::router::{IntentRouter, RoutedIntent};

/// Instruction used when a tenant has not written its own.
pub const DEFAULT_AGENT_INSTRUCTION: &str =
    "You are a helpful, friendly, and professional customer support assistant. \
     Always address the user politely, reference the business name where appropriate, and \
     provide concise, accurate answers based on the provided context. \
     If you do not know the answer, admit it and suggest how the user might obtain the \
     information. Maintain a tone that reflects the brand's values and ensure data privacy.";

/// Worst-case reply; a turn never surfaces a raw internal error.
pub const GENERIC_APOLOGY_REPLY: &str =
    "I'm sorry, something went wrong on my end. Could you try asking that again?";

/// Returned when the tenant has no provider credential. Only the affected
/// capability fails; the turn itself still completes.
pub const CAPABILITY_UNAVAILABLE_REPLY: &str =
    "I'm unable to look that up right now. Please try again later or contact the business \
     directly.";

pub const FAREWELL_REPLY: &str = "Goodbye! Have a great day.";

const MAX_MESSAGE_CHARS: usize = 4000;

/// One completed turn: the persisted inbound message and its reply.
#[derive(Clone, Debug)]
pub struct TurnOutcome {
    pub inbound: Message,
    pub outbound: Message,
}

/// Orchestrates one request/response turn: session lifecycle, message
/// persistence, guardrailed model invocation with retrieval and escalation
/// as callable handlers, aggregate updates, and the fire-and-forget analysis
/// trigger.
pub struct ConversationTurnProcessor {
    tenants: Arc<dyn TenantRepository>,
    sessions: Arc<dyn SessionRepository>,
    messages: Arc<dyn MessageRepository>,
    retrieval: Arc<RetrievalService>,
    llm: Arc<dyn LlmClient>,
    guardrails: GuardrailChain,
    router: IntentRouter,
    escalation: Arc<EscalationWorkflow>,
    analysis: AnalysisScheduler,
    geo: Arc<dyn GeoLookup>,
}

impl ConversationTurnProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        sessions: Arc<dyn SessionRepository>,
        messages: Arc<dyn MessageRepository>,
        retrieval: Arc<RetrievalService>,
        llm: Arc<dyn LlmClient>,
        guardrails: GuardrailChain,
        escalation: Arc<EscalationWorkflow>,
        analysis: AnalysisScheduler,
        geo: Arc<dyn GeoLookup>,
    ) -> Self {
        Self {
            tenants,
            sessions,
            messages,
            retrieval,
            llm,
            guardrails,
            router: IntentRouter::new(),
            escalation,
            analysis,
            geo,
        }
    }

    /// Looks up or creates the session for a widget conversation. Client
    /// hints win over IP geolocation, which runs only while country is still
    /// unset and never for private or loopback addresses.
    pub async fn start_or_resume_session(
        &self,
        tenant_id: &TenantId,
        participant_id: &ParticipantId,
        session_id: Option<&SessionId>,
        hints: ContextHints,
    ) -> CoreResult<Session> {
        self.tenants
            .find_by_id(tenant_id)
            .await?
            .ok_or_else(|| CoreError::not_found("tenant", tenant_id.0.clone()))?;

        let mut session = match session_id {
            Some(id) => match self.sessions.find_by_id(id).await? {
                // A session id from another tenant is indistinguishable from
                // an unknown one.
                Some(session) if session.tenant_id == *tenant_id => session,
                _ => return Err(CoreError::not_found("session", id.0.clone())),
            },
            None => {
                let id = SessionId(uuid::Uuid::new_v4().to_string());
                info!(
                    event_name = "session.created",
                    tenant_id = %tenant_id,
                    session_id = %id,
                );
                Session::new(id, tenant_id.clone(), participant_id.clone())
            }
        };

        merge_hints(&mut session, &hints);

        if session.country.is_none() {
            if let Some(ip) = hints.remote_ip.as_deref() {
                self.resolve_location(&mut session, ip).await;
            }
        }

        self.sessions.save(session.clone()).await?;
        Ok(session)
    }

    /// Processes one inbound participant message and produces the reply.
    /// Once the outbound message persists, analysis is scheduled and the
    /// call returns; the participant never waits on analysis.
    pub async fn submit_turn(&self, session_id: &SessionId, text: &str) -> CoreResult<TurnOutcome> {
        if text.trim().is_empty() {
            return Err(CoreError::Validation("message text must not be empty".to_string()));
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(CoreError::Validation(format!(
                "message text exceeds {MAX_MESSAGE_CHARS} characters"
            )));
        }

        let mut session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| CoreError::not_found("session", session_id.0.clone()))?;

        let tenant = self
            .tenants
            .find_by_id(&session.tenant_id)
            .await?
            .ok_or_else(|| CoreError::not_found("tenant", session.tenant_id.0.clone()))?;

        let inbound = Message::new(
            session.id.clone(),
            session.participant_id.clone(),
            Sender::Participant,
            text,
        );
        self.messages.append(inbound.clone()).await?;

        let reply = match self.guardrails.inspect(text) {
            Some(safe_reply) => {
                info!(
                    event_name = "turn.blocked",
                    tenant_id = %tenant.id,
                    session_id = %session_id,
                );
                safe_reply.to_string()
            }
            None => {
                let routed = self.router.classify(text);
                debug!(
                    event_name = "turn.routed",
                    session_id = %session_id,
                    intent = ?routed,
                );
                match routed {
                    RoutedIntent::Greeting => greeting_reply(&tenant.name),
                    RoutedIntent::Farewell => FAREWELL_REPLY.to_string(),
                    RoutedIntent::EscalationRequest => {
                        self.handle_escalation(session_id, text).await
                    }
                    RoutedIntent::Question => self.answer_question(&tenant, text).await,
                }
            }
        };
        let reply = self.guardrails.sanitize(&reply).unwrap_or(reply);

        let outbound = Message::new(
            session.id.clone(),
            session.participant_id.clone(),
            Sender::Agent,
            reply,
        );
        self.messages.append(outbound.clone()).await?;

        session.record_turn(inbound.created_at, outbound.created_at);
        self.sessions.save(session).await?;

        self.analysis.schedule(session_id.clone());

        Ok(TurnOutcome { inbound, outbound })
    }

    async fn handle_escalation(&self, session_id: &SessionId, text: &str) -> String {
        let result = self
            .escalation
            .escalate(session_id, "Participant asked for a human agent", text)
            .await;

        match result {
            Ok(EscalationOutcome::Escalated { .. }) => ESCALATION_CONFIRMED_REPLY.to_string(),
            Ok(EscalationOutcome::Declined) => ESCALATION_DECLINED_REPLY.to_string(),
            Err(err) => {
                warn!(
                    event_name = "turn.escalation_failed",
                    session_id = %session_id,
                    error = %err,
                );
                GENERIC_APOLOGY_REPLY.to_string()
            }
        }
    }

    async fn answer_question(&self, tenant: &Tenant, text: &str) -> String {
        let Some(api_key) = tenant.api_key.as_ref() else {
            warn!(
                event_name = "turn.capability_unavailable",
                tenant_id = %tenant.id,
                capability = "completion",
            );
            return CAPABILITY_UNAVAILABLE_REPLY.to_string();
        };
        let api_key = api_key.expose_secret();

        let passages = self.retrieval.query(&tenant.id, text, Some(api_key)).await;
        let context = passages
            .iter()
            .map(|passage| passage.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = build_question_prompt(tenant, &context, text);
        match self.llm.complete(&prompt, api_key).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    event_name = "turn.completion_failed",
                    tenant_id = %tenant.id,
                    error = %err,
                );
                GENERIC_APOLOGY_REPLY.to_string()
            }
        }
    }

    async fn resolve_location(&self, session: &mut Session, ip: &str) {
        if is_private_or_loopback(ip) {
            debug!(
                event_name = "session.geo_skipped",
                session_id = %session.id,
                resolved_ip = UNRESOLVABLE_IP,
            );
            return;
        }

        match self.geo.lookup(ip).await {
            Ok(info) => {
                if session.country.is_none() {
                    session.country = info.country;
                }
                if session.city.is_none() {
                    session.city = info.city;
                }
            }
            Err(err) => {
                warn!(
                    event_name = "session.geo_failed",
                    session_id = %session.id,
                    error = %err,
                );
            }
        }
    }
}

fn greeting_reply(tenant_name: &str) -> String {
    format!("Hello! Welcome to {tenant_name}. How can I help you today?")
}

fn merge_hints(session: &mut Session, hints: &ContextHints) {
    if session.origin.is_none() {
        session.origin = hints.origin.clone();
    }
    if session.device.is_none() {
        session.device = hints.device.clone();
    }
    if session.locale.is_none() {
        session.locale = hints.locale.clone();
    }
    if session.referrer.is_none() {
        session.referrer = hints.referrer.clone();
    }
    if session.country.is_none() {
        session.country = hints.country.clone();
    }
    if session.city.is_none() {
        session.city = hints.city.clone();
    }
}

fn build_question_prompt(tenant: &Tenant, context: &str, question: &str) -> String {
    let instruction = tenant.agent_instruction.as_deref().unwrap_or(DEFAULT_AGENT_INSTRUCTION);
    let context = if context.is_empty() { "(no supporting documents found)" } else { context };

    format!(
        "{instruction}\n\nBusiness: {name}\n\nCONTEXT:\n{context}\n\n\
         User question: {question}\n\n\
         Answer using only the context above. If the context does not contain the answer, \
         say you do not know and suggest contacting {name} directly.",
        name = tenant.name,
    )
}
