use kampe_core::{Threshold, UserIdentity};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{CreatedSession, ModelReply, UserRecord};

#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub user_id: i64,
    pub username: Option<&'a str>,
    pub name: String,
    pub language: Option<&'a str>,
    pub is_bot: bool,
}

impl<'a> From<&'a UserIdentity> for CreateSessionRequest<'a> {
    fn from(identity: &'a UserIdentity) -> Self {
        Self {
            user_id: identity.id.0,
            username: identity.username.as_deref(),
            name: identity.display_name(),
            language: identity.language_code.as_deref(),
            is_bot: identity.is_bot,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionResponse {
    #[serde(default, deserialize_with = "optional_id")]
    pub session_id: Option<String>,
    pub threshold: Threshold,
    #[serde(default, rename = "policyAccepted", alias = "accepted_policy")]
    pub policy_accepted: Option<bool>,
}

impl From<CreateSessionResponse> for CreatedSession {
    fn from(value: CreateSessionResponse) -> Self {
        Self {
            session_id: value.session_id,
            threshold: value.threshold,
            policy_accepted: value.policy_accepted.unwrap_or(false),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessageRequest<'a> {
    pub user_id: String,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageResponse {
    pub message: String,
    pub threshold: Threshold,
}

impl From<SendMessageResponse> for ModelReply {
    fn from(value: SendMessageResponse) -> Self {
        Self { message: value.message, threshold: value.threshold }
    }
}

/// `GET /get-user-info` body. `user_info` is a positional row:
/// `[user_id, threshold, chat_history, profile, accepted_policy]`.
#[derive(Debug, Deserialize)]
pub struct UserInfoResponse {
    #[serde(default)]
    pub user_info: Option<UserInfoRow>,
}

#[derive(Debug, Deserialize)]
pub struct UserInfoRow(pub Value, pub Threshold, pub Value, pub Value, pub Value);

impl From<UserInfoRow> for UserRecord {
    fn from(row: UserInfoRow) -> Self {
        let UserInfoRow(user_id, threshold, chat_history, profile, accepted) = row;
        Self {
            user_id: id_text(&user_id),
            threshold,
            chat_history,
            profile,
            policy_accepted: truthy(&accepted),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserIdQuery {
    pub user_id: i64,
}

fn id_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Row stores sometimes hand booleans back as 0/1 or as text.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    }
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(de::Error::custom(format!("unexpected session id `{other}`"))),
    }
}
