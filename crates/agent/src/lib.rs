//! Conversational core: the per-turn pipeline shared by every tenant's chat
//! widget.
//!
//! A turn enters [`turn::ConversationTurnProcessor`], which may call the
//! retrieval service and the [`escalation::EscalationWorkflow`] while
//! producing a reply through the [`guardrails::GuardrailChain`]. Once the
//! outbound message persists, the processor fires the
//! [`analysis::AnalysisScheduler`] and returns; the caller never waits on
//! analysis.
//!
//! Routing is explicit: [`router::IntentRouter`] classifies each utterance
//! and the processor dispatches in code, instead of letting the model decide
//! which behavior handles an utterance through prompt text.

pub mod analysis;
pub mod escalation;
pub mod geo;
pub mod guardrails;
pub mod llm;
pub mod notify;
pub mod router;
pub mod turn;

pub use analysis::AnalysisScheduler;
pub use escalation::{EscalationOutcome, EscalationWorkflow};
pub use geo::{GeoInfo, GeoLookup, HttpGeoClient};
pub use guardrails::GuardrailChain;
pub use llm::{HttpLlmClient, LlmClient};
pub use notify::{LogNotifier, Notifier};
pub use router::{IntentRouter, RoutedIntent};
pub use turn::{ConversationTurnProcessor, TurnOutcome};
