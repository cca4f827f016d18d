use std::fmt;

use async_trait::async_trait;
use kampe_core::{ApplicationError, Threshold, UserId, UserIdentity};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    CreateSession,
    SendMessage,
    GetUserInfo,
    AcceptPolicy,
}

impl BackendOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateSession => "create_session",
            Self::SendMessage => "send_message",
            Self::GetUserInfo => "get_user_info",
            Self::AcceptPolicy => "accept_policy",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::CreateSession => "/create-session",
            Self::SendMessage => "/send-message",
            Self::GetUserInfo => "/get-user-info",
            Self::AcceptPolicy => "/accept-policy",
        }
    }
}

impl fmt::Display for BackendOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedSession {
    pub session_id: Option<String>,
    pub threshold: Threshold,
    pub policy_accepted: bool,
}

/// What the backend needs to route a message to the right conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: UserId,
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelReply {
    pub message: String,
    pub threshold: Threshold,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserRecord {
    pub user_id: String,
    pub threshold: Threshold,
    pub chat_history: Value,
    pub profile: Value,
    pub policy_accepted: bool,
}

/// A missing record is an expected outcome for new users, not a failure.
#[derive(Clone, Debug, PartialEq)]
pub enum UserLookup {
    Found(UserRecord),
    NotFound,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend http client could not be built: {0}")]
    Setup(#[source] reqwest::Error),
    #[error("backend {operation} request failed: {source}")]
    Request {
        operation: BackendOperation,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend {operation} returned HTTP {status}")]
    Status { operation: BackendOperation, status: u16 },
    #[error("backend {operation} response could not be decoded: {message}")]
    Decode { operation: BackendOperation, message: String },
}

impl BackendError {
    pub fn operation(&self) -> Option<BackendOperation> {
        match self {
            Self::Setup(_) => None,
            Self::Request { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. } => Some(*operation),
        }
    }
}

impl From<BackendError> for ApplicationError {
    fn from(value: BackendError) -> Self {
        match value {
            BackendError::Setup(_) => Self::Configuration(value.to_string()),
            _ => Self::Integration(value.to_string()),
        }
    }
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn create_session(&self, identity: &UserIdentity)
        -> Result<CreatedSession, BackendError>;

    async fn send_message(
        &self,
        session: &SessionContext,
        text: &str,
    ) -> Result<ModelReply, BackendError>;

    async fn fetch_user_record(&self, user_id: UserId) -> Result<UserLookup, BackendError>;

    async fn record_policy_acceptance(&self, user_id: UserId) -> Result<(), BackendError>;
}
