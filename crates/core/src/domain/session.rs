use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-supplied context captured when a session starts. Country/city from
/// the client win over IP geolocation, which runs only when country is unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextHints {
    pub origin: Option<String>,
    pub device: Option<String>,
    pub locale: Option<String>,
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub remote_ip: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub tenant_id: TenantId,
    pub participant_id: ParticipantId,
    pub origin: Option<String>,
    pub device: Option<String>,
    pub locale: Option<String>,
    pub referrer: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub total_messages: i64,
    pub participant_messages: i64,
    pub agent_messages: i64,
    pub duration_seconds: i64,
    /// Set exactly once, on the first inbound/outbound pair.
    pub first_response_latency_seconds: Option<f64>,
    pub summary: Option<String>,
    pub intent: Option<String>,
    pub summary_generated_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: SessionId, tenant_id: TenantId, participant_id: ParticipantId) -> Self {
        Self {
            id,
            tenant_id,
            participant_id,
            origin: None,
            device: None,
            locale: None,
            referrer: None,
            country: None,
            city: None,
            created_at: Utc::now(),
            last_message_at: None,
            total_messages: 0,
            participant_messages: 0,
            agent_messages: 0,
            duration_seconds: 0,
            first_response_latency_seconds: None,
            summary: None,
            intent: None,
            summary_generated_at: None,
        }
    }

    /// Applies one completed turn to the aggregate counters. Both timestamps
    /// are absolute instants, so the subtraction cannot mix naive and aware
    /// clocks the way the source system once did.
    pub fn record_turn(&mut self, inbound_at: DateTime<Utc>, outbound_at: DateTime<Utc>) {
        self.total_messages += 2;
        self.participant_messages += 1;
        self.agent_messages += 1;
        self.last_message_at = Some(outbound_at);
        self.duration_seconds = (outbound_at - self.created_at).num_seconds().max(0);

        if self.first_response_latency_seconds.is_none() {
            let gap = (outbound_at - inbound_at).num_milliseconds().max(0);
            self.first_response_latency_seconds = Some(gap as f64 / 1000.0);
        }
    }
}
