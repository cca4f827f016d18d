use serde::{Deserialize, Serialize};

use crate::domain::identity::UserIdentity;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyChoice {
    Accept,
    Decline,
}

impl PolicyChoice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Text(String),
    Start,
    PolicyChoice(PolicyChoice),
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Start => "start",
            Self::PolicyChoice(PolicyChoice::Accept) => "policy_accept",
            Self::PolicyChoice(PolicyChoice::Decline) => "policy_decline",
        }
    }
}

/// One transport-delivered occurrence, already stripped of transport detail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub identity: UserIdentity,
    pub chat_id: i64,
    pub correlation_id: String,
    pub kind: EventKind,
}

impl ChatEvent {
    pub fn new(
        identity: UserIdentity,
        chat_id: i64,
        correlation_id: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self { identity, chat_id, correlation_id: correlation_id.into(), kind }
    }
}
