use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::{ParticipantId, SessionId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Participant,
    Agent,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Participant => "participant",
            Self::Agent => "agent",
        }
    }
}

impl std::str::FromStr for Sender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "participant" => Ok(Self::Participant),
            "agent" => Ok(Self::Agent),
            other => Err(format!("unknown sender `{other}`")),
        }
    }
}

/// Append-only transcript entry. Messages are never edited or deleted.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub participant_id: ParticipantId,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        session_id: SessionId,
        participant_id: ParticipantId,
        sender: Sender,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId(uuid::Uuid::new_v4().to_string()),
            session_id,
            participant_id,
            sender,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Sender;

    #[test]
    fn sender_round_trips_through_str() {
        for sender in [Sender::Participant, Sender::Agent] {
            assert_eq!(sender.as_str().parse::<Sender>(), Ok(sender));
        }
        assert!("robot".parse::<Sender>().is_err());
    }
}
