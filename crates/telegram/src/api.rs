use std::time::Duration;

use kampe_core::config::TelegramConfig;
use kampe_core::{UserId, UserIdentity};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::keyboard::InlineKeyboardMarkup;

/// Extra time granted to the HTTP client on top of the long-poll timeout.
const POLL_GRACE_SECS: u64 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl From<&User> for UserIdentity {
    fn from(user: &User) -> Self {
        Self {
            id: UserId(user.id),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            language_code: user.language_code.clone(),
            is_bot: user.is_bot,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
struct SendMessageParams<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct EditMessageTextParams<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQueryParams<'a> {
    callback_query_id: &'a str,
}

#[derive(Debug, Serialize)]
struct SendChatActionParams<'a> {
    chat_id: i64,
    action: &'a str,
}

#[derive(Debug, Serialize)]
struct NoParams {}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("telegram http client could not be built: {0}")]
    Setup(#[source] reqwest::Error),
    #[error("telegram {method} request failed: {source}")]
    Request {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// Telegram refuses concurrent `getUpdates` consumers for one bot token.
    #[error("telegram {method} conflict: {description}")]
    Conflict { method: &'static str, description: String },
    #[error("telegram {method} failed with code {code}: {description}")]
    Api { method: &'static str, code: i64, description: String },
    #[error("telegram {method} response could not be decoded: {message}")]
    Decode { method: &'static str, message: String },
}

impl ApiError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Thin client for the handful of Bot API methods the relay uses.
#[derive(Clone)]
pub struct BotApi {
    client: Client,
    base_url: String,
    token: SecretString,
}

impl BotApi {
    pub fn new(
        base_url: impl Into<String>,
        token: SecretString,
        poll_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(poll_timeout + Duration::from_secs(POLL_GRACE_SECS))
            .build()
            .map_err(ApiError::Setup)?;
        let base_url = base_url.into().trim().trim_end_matches('/').to_owned();
        Ok(Self { client, base_url, token })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self, ApiError> {
        Self::new(
            &config.api_base_url,
            config.bot_token.clone(),
            Duration::from_secs(config.poll_timeout_secs),
        )
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token.expose_secret())
    }

    async fn call<P, T>(&self, method: &'static str, params: &P) -> Result<T, ApiError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // reqwest errors embed the request URL, which carries the bot token.
        let response = self
            .client
            .post(self.method_url(method))
            .json(params)
            .send()
            .await
            .map_err(|source| ApiError::Request { method, source: source.without_url() })?;

        let status = response.status();
        let envelope = response.json::<ApiEnvelope<T>>().await.map_err(|error| {
            if status == StatusCode::CONFLICT {
                ApiError::Conflict { method, description: format!("HTTP {status}") }
            } else {
                ApiError::Decode { method, message: error.without_url().to_string() }
            }
        })?;

        debug!(event_name = "telegram.api.call", method, status = status.as_u16(), ok = envelope.ok);

        if !envelope.ok {
            let code = envelope.error_code.unwrap_or_else(|| i64::from(status.as_u16()));
            let description = envelope.description.unwrap_or_else(|| "no description".to_owned());
            if code == 409 {
                return Err(ApiError::Conflict { method, description });
            }
            return Err(ApiError::Api { method, code, description });
        }

        envelope.result.ok_or_else(|| ApiError::Decode {
            method,
            message: "response was ok but carried no result".to_owned(),
        })
    }

    pub async fn get_me(&self) -> Result<User, ApiError> {
        self.call("getMe", &NoParams {}).await
    }

    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ApiError> {
        let params = GetUpdatesParams {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        self.call("getUpdates", &params).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message, ApiError> {
        self.call("sendMessage", &SendMessageParams { chat_id, text, reply_markup }).await
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), ApiError> {
        // Telegram answers with the edited message or `true` for inline messages.
        let _: Value = self
            .call(
                "editMessageText",
                &EditMessageTextParams { chat_id, message_id, text, reply_markup },
            )
            .await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), ApiError> {
        let _: bool =
            self.call("answerCallbackQuery", &AnswerCallbackQueryParams { callback_query_id })
                .await?;
        Ok(())
    }

    pub async fn send_typing(&self, chat_id: i64) -> Result<(), ApiError> {
        let _: bool =
            self.call("sendChatAction", &SendChatActionParams { chat_id, action: "typing" }).await?;
        Ok(())
    }
}
