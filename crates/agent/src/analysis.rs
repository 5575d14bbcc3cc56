use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, info, warn};

use parley_core::config::AnalysisConfig;
use parley_core::domain::message::{Message, Sender};
use parley_core::domain::session::{Session, SessionId};
use parley_core::errors::{CoreError, CoreResult};
use parley_db::repositories::{MessageRepository, SessionRepository, TenantRepository};

use crate::llm::LlmClient;

/// Detached post-turn analysis: summarize the conversation and classify its
/// intent, without the participant ever waiting on it.
///
/// One unit of work: settle delay (read-after-write guard against the message
/// store), read the full transcript, one completion call, parse
/// `{summary, intent}`, persist idempotently. The whole unit runs under a
/// hard timeout; timeouts and provider errors are logged and swallowed,
/// never retried. The repositories here are their own pool handles, so the
/// unit survives the originating request completing first.
#[derive(Clone)]
pub struct AnalysisScheduler {
    sessions: Arc<dyn SessionRepository>,
    messages: Arc<dyn MessageRepository>,
    tenants: Arc<dyn TenantRepository>,
    llm: Arc<dyn LlmClient>,
    settle_delay: Duration,
    timeout: Duration,
}

impl AnalysisScheduler {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        messages: Arc<dyn MessageRepository>,
        tenants: Arc<dyn TenantRepository>,
        llm: Arc<dyn LlmClient>,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            sessions,
            messages,
            tenants,
            llm,
            settle_delay: Duration::from_secs(config.settle_delay_secs),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Fire and forget. There is no cancellation handle on purpose; the
    /// timeout inside `run_once` bounds the unit's lifetime.
    pub fn schedule(&self, session_id: SessionId) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_once(session_id).await;
        });
    }

    /// Runs one analysis unit to completion or timeout. Never returns an
    /// error; every failure path ends in a log line.
    pub async fn run_once(&self, session_id: SessionId) {
        let outcome = tokio::time::timeout(self.timeout, self.analyze(&session_id)).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(
                    event_name = "analysis.failed",
                    session_id = %session_id,
                    error = %err,
                );
            }
            Err(_) => {
                let err = CoreError::Timeout { seconds: self.timeout.as_secs() };
                warn!(
                    event_name = "analysis.timed_out",
                    session_id = %session_id,
                    error = %err,
                );
            }
        }
    }

    async fn analyze(&self, session_id: &SessionId) -> CoreResult<()> {
        tokio::time::sleep(self.settle_delay).await;

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

        let Some(api_key) = tenant.api_key.as_ref() else {
            return Err(CoreError::Configuration(
                "no completion credential configured for tenant".to_string(),
            ));
        };

        let transcript = self.messages.list_for_session(session_id).await?;
        if transcript.is_empty() {
            debug!(event_name = "analysis.skipped_empty", session_id = %session_id);
            return Ok(());
        }

        let taxonomy = tenant.intent_taxonomy();
        let prompt = build_prompt(&session, &transcript, &taxonomy);
        let raw = self.llm.complete(&prompt, api_key.expose_secret()).await?;

        let parsed = parse_analysis(&raw)?;
        let intent = coerce_intent(&parsed.intent, &taxonomy);

        let updated = self
            .sessions
            .update_analysis(session_id, &parsed.summary, &intent, Utc::now())
            .await?;
        if updated {
            info!(
                event_name = "analysis.persisted",
                session_id = %session_id,
                intent = %intent,
            );
        } else {
            warn!(event_name = "analysis.session_vanished", session_id = %session_id);
        }

        Ok(())
    }
}

fn build_prompt(session: &Session, transcript: &[Message], taxonomy: &[String]) -> String {
    let mut conversation = String::new();
    for message in transcript {
        let role = match message.sender {
            Sender::Participant => "User",
            Sender::Agent => "Agent",
        };
        conversation.push_str(role);
        conversation.push_str(": ");
        conversation.push_str(&message.text);
        conversation.push('\n');
    }

    format!(
        "You are an expert conversation analyst. Analyze the following chat \
         transcript between a User and an AI Agent.\n\n\
         Existing summary: {}\n\
         Existing intent: {}\n\n\
         TRANSCRIPT:\n{conversation}\n\
         INSTRUCTIONS:\n\
         1. Generate a concise summary of the conversation (max 2-3 sentences), \
         e.g. \"User asked about X, Agent provided Y.\"\n\
         2. Determine the top intent from this list: {}.\n\
         3. If an existing summary exists, use it as context but update it to \
         reflect the full conversation.\n\n\
         Output correctly formatted JSON only:\n\
         {{\"summary\": \"...\", \"intent\": \"...\"}}",
        session.summary.as_deref().unwrap_or("None"),
        session.intent.as_deref().unwrap_or("None"),
        taxonomy.join(", "),
    )
}

#[derive(Debug, Deserialize)]
struct AnalysisResult {
    summary: String,
    intent: String,
}

/// Providers often wrap JSON in markdown code fences despite instructions.
fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

fn parse_analysis(raw: &str) -> CoreResult<AnalysisResult> {
    let stripped = strip_code_fences(raw);
    serde_json::from_str(&stripped)
        .map_err(|err| CoreError::provider("analysis", format!("unparseable result: {err}")))
}

/// Validates the model's label against the taxonomy. Unknown labels fall
/// back to `General` when present, otherwise the taxonomy's last entry.
fn coerce_intent(candidate: &str, taxonomy: &[String]) -> String {
    if taxonomy.iter().any(|intent| intent == candidate) {
        return candidate.to_string();
    }
    if let Some(general) = taxonomy.iter().find(|intent| *intent == "General") {
        return general.clone();
    }
    taxonomy.last().cloned().unwrap_or_else(|| "General".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use parley_core::config::AnalysisConfig;
    use parley_core::domain::message::{Message, Sender};
    use parley_core::domain::session::{ParticipantId, Session, SessionId};
    use parley_core::domain::tenant::Tenant;
    use parley_core::errors::CoreResult;
    use parley_db::repositories::{
        InMemoryMessageRepository, InMemorySessionRepository, InMemoryTenantRepository,
        MessageRepository, SessionRepository, TenantRepository,
    };

    use crate::llm::LlmClient;

    use super::{coerce_intent, parse_analysis, strip_code_fences, AnalysisScheduler};

    struct ScriptedLlm {
        reply: String,
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _prompt: &str, _api_key: &str) -> CoreResult<String> {
            Ok(self.reply.clone())
        }
    }

    struct NeverLlm;

    #[async_trait]
    impl LlmClient for NeverLlm {
        async fn complete(&self, _prompt: &str, _api_key: &str) -> CoreResult<String> {
            std::future::pending().await
        }
    }

    struct Fixture {
        scheduler: AnalysisScheduler,
        sessions: Arc<InMemorySessionRepository>,
        session_id: SessionId,
    }

    async fn fixture(tenant: Tenant, llm: Arc<dyn LlmClient>) -> Fixture {
        let sessions = Arc::new(InMemorySessionRepository::default());
        let messages = Arc::new(InMemoryMessageRepository::default());
        let tenants = Arc::new(InMemoryTenantRepository::default());

        let mut session = Session::new(
            SessionId("s-1".to_string()),
            tenant.id.clone(),
            ParticipantId("p-1".to_string()),
        );
        session.summary = Some("earlier summary".to_string());
        session.intent = Some("Support".to_string());
        let session_id = session.id.clone();
        sessions.save(session).await.expect("seed session");
        tenants.save(tenant).await.expect("seed tenant");

        messages
            .append(Message::new(
                session_id.clone(),
                ParticipantId("p-1".to_string()),
                Sender::Participant,
                "where is my refund?",
            ))
            .await
            .expect("seed message");

        let scheduler = AnalysisScheduler::new(
            sessions.clone(),
            messages,
            tenants,
            llm,
            &AnalysisConfig { settle_delay_secs: 0, timeout_secs: 1 },
        );
        Fixture { scheduler, sessions, session_id }
    }

    fn keyed_tenant() -> Tenant {
        let mut tenant = Tenant::new("t-1", "Acme");
        tenant.api_key = Some("test-key".to_string().into());
        tenant
    }

    #[tokio::test]
    async fn persists_summary_and_valid_intent() {
        let llm = Arc::new(ScriptedLlm {
            reply: "```json\n{\"summary\": \"User asked about a refund.\", \"intent\": \"Support\"}\n```"
                .to_string(),
        });
        let fx = fixture(keyed_tenant(), llm).await;

        fx.scheduler.run_once(fx.session_id.clone()).await;

        let session =
            fx.sessions.find_by_id(&fx.session_id).await.expect("find").expect("exists");
        assert_eq!(session.summary.as_deref(), Some("User asked about a refund."));
        assert_eq!(session.intent.as_deref(), Some("Support"));
        assert!(session.summary_generated_at.is_some());
    }

    #[tokio::test]
    async fn unknown_intent_is_coerced_to_general() {
        let llm = Arc::new(ScriptedLlm {
            reply: "{\"summary\": \"s\", \"intent\": \"Quantum Billing\"}".to_string(),
        });
        let fx = fixture(keyed_tenant(), llm).await;

        fx.scheduler.run_once(fx.session_id.clone()).await;

        let session =
            fx.sessions.find_by_id(&fx.session_id).await.expect("find").expect("exists");
        assert_eq!(session.intent.as_deref(), Some("General"));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_provider_is_bounded_and_leaves_prior_analysis_untouched() {
        let fx = fixture(keyed_tenant(), Arc::new(NeverLlm)).await;

        // Virtual time: the 1s timeout elapses as soon as the runtime idles.
        fx.scheduler.run_once(fx.session_id.clone()).await;

        let session =
            fx.sessions.find_by_id(&fx.session_id).await.expect("find").expect("exists");
        assert_eq!(session.summary.as_deref(), Some("earlier summary"));
        assert_eq!(session.intent.as_deref(), Some("Support"));
        assert!(session.summary_generated_at.is_none());
    }

    #[tokio::test]
    async fn missing_credential_skips_persistence() {
        let llm = Arc::new(ScriptedLlm {
            reply: "{\"summary\": \"s\", \"intent\": \"Support\"}".to_string(),
        });
        let fx = fixture(Tenant::new("t-1", "Acme"), llm).await;

        fx.scheduler.run_once(fx.session_id.clone()).await;

        let session =
            fx.sessions.find_by_id(&fx.session_id).await.expect("find").expect("exists");
        assert_eq!(session.summary.as_deref(), Some("earlier summary"));
    }

    #[test]
    fn code_fences_are_stripped_before_parsing() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{}"), "{}");

        let parsed =
            parse_analysis("```json\n{\"summary\": \"s\", \"intent\": \"i\"}\n```").expect("parse");
        assert_eq!(parsed.summary, "s");
        assert_eq!(parsed.intent, "i");
    }

    #[test]
    fn intent_coercion_prefers_general_then_last_entry() {
        let with_general =
            vec!["Support".to_string(), "General".to_string(), "Sales".to_string()];
        assert_eq!(coerce_intent("Sales", &with_general), "Sales");
        assert_eq!(coerce_intent("Nonsense", &with_general), "General");

        let without_general = vec!["Order Status".to_string(), "Returns".to_string()];
        assert_eq!(coerce_intent("Nonsense", &without_general), "Returns");
    }
}
