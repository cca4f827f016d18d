use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Backend-controlled conversation parameter. Stored and echoed back verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(pub Number);

impl From<i64> for Threshold {
    fn from(value: i64) -> Self {
        Self(Number::from(value))
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-user conversational state kept between events.
///
/// `threshold` is only ever written from a successful backend response; it is
/// `None` until the backend has reported one. `policy_accepted` only becomes
/// `true` after a confirmed acceptance call or a backend record that already
/// says so.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Option<String>,
    pub threshold: Option<Threshold>,
    pub policy_accepted: bool,
}

impl SessionRecord {
    pub fn apply(&mut self, patch: SessionPatch) {
        if let Some(session_id) = patch.session_id {
            self.session_id = Some(session_id);
        }
        if let Some(threshold) = patch.threshold {
            self.threshold = Some(threshold);
        }
        if let Some(policy_accepted) = patch.policy_accepted {
            self.policy_accepted = policy_accepted;
        }
    }
}

/// Partial update for a [`SessionRecord`]; unset fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub session_id: Option<String>,
    pub threshold: Option<Threshold>,
    pub policy_accepted: Option<bool>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn policy_accepted(mut self, accepted: bool) -> Self {
        self.policy_accepted = Some(accepted);
        self
    }
}
