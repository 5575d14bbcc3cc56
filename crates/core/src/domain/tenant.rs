use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Intent taxonomy applied when a tenant has not declared its own.
pub const DEFAULT_INTENTS: &[&str] = &["Support", "Sales", "Feedback", "Bug Report", "General"];

/// One isolated customer account. All indexed content, sessions, and
/// tickets are partitioned by `id`; omitting that filter anywhere in the
/// persistence layer is a correctness bug.
#[derive(Clone, Debug)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub agent_instruction: Option<String>,
    /// Declared intent taxonomy; empty means use `DEFAULT_INTENTS`.
    pub intents: Vec<String>,
    pub escalation_enabled: bool,
    pub escalation_recipients: Vec<String>,
    /// Per-tenant model provider credential. Absence disables retrieval and
    /// analysis for this tenant but never aborts a live turn.
    pub api_key: Option<SecretString>,
}

impl Tenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TenantId(id.into()),
            name: name.into(),
            agent_instruction: None,
            intents: Vec::new(),
            escalation_enabled: false,
            escalation_recipients: Vec::new(),
            api_key: None,
        }
    }

    /// The taxonomy analysis results are validated against.
    pub fn intent_taxonomy(&self) -> Vec<String> {
        if self.intents.is_empty() {
            DEFAULT_INTENTS.iter().map(|intent| (*intent).to_string()).collect()
        } else {
            self.intents.clone()
        }
    }
}
