use serde::{Deserialize, Serialize};

use crate::domain::event::{EventKind, PolicyChoice};
use crate::domain::session::SessionRecord;

/// Where a user stands relative to the privacy-policy gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    Unbootstrapped,
    PendingPolicy,
    Active,
}

impl GateState {
    pub fn of(record: Option<&SessionRecord>) -> Self {
        match record {
            None => Self::Unbootstrapped,
            Some(record) if !record.policy_accepted => Self::PendingPolicy,
            Some(_) => Self::Active,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateEvent {
    Text,
    Start,
    Accept,
    Decline,
}

impl From<&EventKind> for GateEvent {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Text(_) => Self::Text,
            EventKind::Start => Self::Start,
            EventKind::PolicyChoice(PolicyChoice::Accept) => Self::Accept,
            EventKind::PolicyChoice(PolicyChoice::Decline) => Self::Decline,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateAction {
    /// Look the user up on the backend, creating a session if none exists.
    Bootstrap,
    PromptPolicy,
    Welcome,
    ForwardMessage,
    RecordAcceptance,
    RecordDecline,
}

impl GateAction {
    /// `Bootstrap` changes the state but produces no reply; the caller plans again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Bootstrap)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: GateState,
    pub event: GateEvent,
    pub action: GateAction,
}
