use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionId;
use super::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(pub String);

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    InProgress,
    Resolved,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }

    /// Tickets only move forward: pending -> in_progress -> resolved.
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, TicketStatus::InProgress)
                | (Self::Pending, TicketStatus::Resolved)
                | (Self::InProgress, TicketStatus::Resolved)
        )
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            other => Err(format!("unknown ticket status `{other}`")),
        }
    }
}

/// Handoff record for a conversation escalated to a human operator.
/// A session may accumulate more than one ticket when escalation triggers
/// repeatedly; that is observed product behavior and is kept as-is.
#[derive(Clone, Debug, PartialEq)]
pub struct EscalationTicket {
    pub id: TicketId,
    pub tenant_id: TenantId,
    pub session_id: SessionId,
    pub status: TicketStatus,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl EscalationTicket {
    pub fn new(tenant_id: TenantId, session_id: SessionId, summary: impl Into<String>) -> Self {
        Self {
            id: TicketId(uuid::Uuid::new_v4().to_string()),
            tenant_id,
            session_id,
            status: TicketStatus::Pending,
            summary: summary.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TicketStatus;

    #[test]
    fn transitions_only_move_forward() {
        assert!(TicketStatus::Pending.can_transition_to(TicketStatus::InProgress));
        assert!(TicketStatus::Pending.can_transition_to(TicketStatus::Resolved));
        assert!(TicketStatus::InProgress.can_transition_to(TicketStatus::Resolved));

        assert!(!TicketStatus::Resolved.can_transition_to(TicketStatus::Pending));
        assert!(!TicketStatus::Resolved.can_transition_to(TicketStatus::InProgress));
        assert!(!TicketStatus::InProgress.can_transition_to(TicketStatus::Pending));
    }
}
