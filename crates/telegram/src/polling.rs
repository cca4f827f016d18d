use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use kampe_core::{ApplicationError, InterfaceError};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, BotApi};
use crate::events::{
    BotCommand, CommandEvent, EventContext, EventDispatcher, HandlerResult, TelegramEnvelope,
    TelegramEvent,
};
use crate::keyboard::OutboundMessage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("another bot instance is polling with this token: {0}")]
    Conflict(String),
    #[error("bot token rejected: {0}")]
    Unauthorized(String),
    #[error("callback acknowledgement failed: {0}")]
    Acknowledge(String),
    #[error("message delivery failed: {0}")]
    Deliver(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

impl TransportError {
    /// Errors a reconnect cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Unauthorized(_))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("polling stopped: {0}")]
    Fatal(TransportError),
    #[error("polling gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
}

impl From<RunnerError> for ApplicationError {
    fn from(value: RunnerError) -> Self {
        match value {
            RunnerError::Fatal(TransportError::Conflict(description)) => {
                Self::DuplicateInstance(description)
            }
            RunnerError::Fatal(error) => Self::Configuration(error.to_string()),
            exhausted @ RunnerError::RetriesExhausted { .. } => {
                Self::Integration(exhausted.to_string())
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 8, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait UpdateTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the stream is closed; an empty batch means the poll timed out idle.
    async fn next_updates(&self) -> Result<Option<Vec<TelegramEnvelope>>, TransportError>;
    async fn acknowledge_callback(&self, callback_query_id: &str) -> Result<(), TransportError>;
    async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError>;
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopUpdateTransport;

#[async_trait]
impl UpdateTransport for NoopUpdateTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_updates(&self) -> Result<Option<Vec<TelegramEnvelope>>, TransportError> {
        Ok(None)
    }

    async fn acknowledge_callback(&self, _callback_query_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_typing(&self, _chat_id: i64) -> Result<(), TransportError> {
        Ok(())
    }

    async fn deliver(&self, _message: &OutboundMessage) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Long-polling transport over the Bot API. Tracks the `getUpdates` offset so every
/// update is handed out once.
pub struct BotApiTransport {
    api: BotApi,
    poll_timeout_secs: u64,
    offset: Mutex<Option<i64>>,
}

impl BotApiTransport {
    pub fn new(api: BotApi, poll_timeout_secs: u64) -> Self {
        Self { api, poll_timeout_secs, offset: Mutex::new(None) }
    }
}

fn classify(error: ApiError, fallback: fn(String) -> TransportError) -> TransportError {
    match error {
        ApiError::Conflict { description, .. } => TransportError::Conflict(description),
        ApiError::Api { code: 401, description, .. } => TransportError::Unauthorized(description),
        other => fallback(other.to_string()),
    }
}

#[async_trait]
impl UpdateTransport for BotApiTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let me = self.api.get_me().await.map_err(|error| classify(error, TransportError::Connect))?;
        info!(
            event_name = "telegram.connected",
            bot_id = me.id,
            bot_username = me.username.as_deref().unwrap_or("unknown"),
            "bot identity confirmed"
        );
        Ok(())
    }

    async fn next_updates(&self) -> Result<Option<Vec<TelegramEnvelope>>, TransportError> {
        let mut offset = self.offset.lock().await;
        let updates = self
            .api
            .get_updates(*offset, self.poll_timeout_secs)
            .await
            .map_err(|error| classify(error, TransportError::Receive))?;

        if let Some(last) = updates.iter().map(|update| update.update_id).max() {
            *offset = Some(last + 1);
        }

        Ok(Some(updates.into_iter().map(TelegramEnvelope::from_update).collect()))
    }

    async fn acknowledge_callback(&self, callback_query_id: &str) -> Result<(), TransportError> {
        self.api
            .answer_callback_query(callback_query_id)
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError> {
        self.api.send_typing(chat_id).await.map_err(|error| TransportError::Deliver(error.to_string()))
    }

    async fn deliver(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let result = match message.edit_message_id {
            Some(message_id) => {
                self.api
                    .edit_message_text(
                        message.chat_id,
                        message_id,
                        &message.text,
                        message.reply_markup.as_ref(),
                    )
                    .await
            }
            None => self
                .api
                .send_message(message.chat_id, &message.text, message.reply_markup.as_ref())
                .await
                .map(|_| ()),
        };
        result.map_err(|error| TransportError::Deliver(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Per-user chain of in-flight update tasks. A user's next update waits for the previous
/// one; different users run side by side.
#[derive(Default)]
struct UserLanes {
    tails: HashMap<i64, JoinHandle<()>>,
    detached: Vec<JoinHandle<()>>,
}

impl UserLanes {
    fn enqueue<F>(&mut self, user_id: Option<i64>, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tails.retain(|_, tail| !tail.is_finished());
        self.detached.retain(|task| !task.is_finished());

        let Some(user_id) = user_id else {
            self.detached.push(tokio::spawn(work));
            return;
        };

        let previous = self.tails.remove(&user_id);
        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                // A panicked predecessor has already answered for itself.
                let _ = previous.await;
            }
            work.await;
        });
        self.tails.insert(user_id, task);
    }

    async fn drain(&mut self) {
        let tasks = self.tails.drain().map(|(_, task)| task).chain(self.detached.drain(..));
        for task in tasks.collect::<Vec<_>>() {
            let _ = task.await;
        }
    }
}

pub struct PollingRunner {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), reconnect_policy }
    }

    /// Runs until the transport closes its stream, then waits for in-flight updates.
    /// Transient failures reconnect with backoff; the retry budget resets once a poll
    /// succeeds again.
    pub async fn start(&self) -> Result<(), RunnerError> {
        let mut lanes = UserLanes::default();
        let mut attempt = 0_u32;
        loop {
            let mut made_progress = false;
            match self.connect_and_pump(attempt, &mut made_progress, &mut lanes).await {
                Ok(()) => {
                    lanes.drain().await;
                    return Ok(());
                }
                Err(transport_error) if transport_error.is_fatal() => {
                    error!(
                        event_name = "telegram.polling.fatal",
                        error = %transport_error,
                        "polling cannot continue"
                    );
                    return Err(RunnerError::Fatal(transport_error));
                }
                Err(transport_error) => {
                    if made_progress {
                        attempt = 0;
                    }
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "polling transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        return Err(RunnerError::RetriesExhausted {
                            attempts: attempt + 1,
                            last_error: transport_error,
                        });
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        made_progress: &mut bool,
        lanes: &mut UserLanes,
    ) -> Result<(), TransportError> {
        info!(attempt, "opening telegram polling transport");
        self.transport.connect().await?;
        info!(attempt, "telegram polling transport connected");

        loop {
            let Some(batch) = self.transport.next_updates().await? else {
                info!(attempt, "telegram update stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            *made_progress = true;

            for envelope in batch {
                let user_id = envelope.event.user_id();
                let worker = UpdateWorker {
                    transport: self.transport.clone(),
                    dispatcher: self.dispatcher.clone(),
                };
                lanes.enqueue(user_id, worker.process(envelope));
            }
        }
    }
}

/// Everything one update needs, owned so it can run on its own task.
struct UpdateWorker {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: Arc<EventDispatcher>,
}

impl UpdateWorker {
    async fn process(self, envelope: TelegramEnvelope) {
        let context = EventContext { correlation_id: envelope.correlation_id() };
        let event_type = envelope.event.event_type();

        info!(
            event_name = "ingress.telegram.update_received",
            update_id = envelope.update_id,
            event_type = ?event_type,
            user_id = envelope.event.user_id().unwrap_or_default(),
            correlation_id = %context.correlation_id,
            "received telegram update"
        );

        self.prepare(&envelope, &context).await;

        let chat_id = envelope.event.chat_id();
        let dispatcher = self.dispatcher.clone();
        let task_context = context.clone();
        let outcome =
            tokio::spawn(async move { dispatcher.dispatch(&envelope, &task_context).await }).await;

        let response = match outcome {
            Ok(Ok(HandlerResult::Responded(message))) => Some(message),
            Ok(Ok(HandlerResult::Processed | HandlerResult::Ignored)) => None,
            Ok(Err(dispatch_error)) => {
                warn!(
                    correlation_id = %context.correlation_id,
                    error = %dispatch_error,
                    "event dispatch failed; continuing polling loop"
                );
                chat_id.map(|chat_id| fallback_message(chat_id, &context))
            }
            Err(join_error) => {
                error!(
                    event_name = "ingress.telegram.handler_panicked",
                    correlation_id = %context.correlation_id,
                    panicked = join_error.is_panic(),
                    "event handler aborted; sending generic failure reply"
                );
                chat_id.map(|chat_id| fallback_message(chat_id, &context))
            }
        };

        let Some(message) = response else {
            return;
        };
        if let Err(error) = self.transport.deliver(&message).await {
            warn!(
                event_name = "egress.telegram.delivery_failed",
                correlation_id = %context.correlation_id,
                chat_id = message.chat_id,
                error = %error,
                "failed to deliver reply"
            );
        } else {
            debug!(
                event_name = "egress.telegram.reply_sent",
                correlation_id = %context.correlation_id,
                chat_id = message.chat_id,
                edited = message.edit_message_id.is_some(),
                "delivered reply"
            );
        }
    }

    /// Answers button presses before any backend work and shows the typing indicator
    /// for messages the conversation will answer.
    async fn prepare(&self, envelope: &TelegramEnvelope, context: &EventContext) {
        match &envelope.event {
            TelegramEvent::CallbackQuery(query) => {
                if let Err(error) =
                    self.transport.acknowledge_callback(&query.callback_query_id).await
                {
                    warn!(
                        event_name = "ingress.telegram.callback_ack",
                        correlation_id = %context.correlation_id,
                        error = %error,
                        "failed to answer callback query"
                    );
                }
            }
            TelegramEvent::Command(CommandEvent { command: BotCommand::Unknown(_), .. }) => {}
            TelegramEvent::TextMessage(_) | TelegramEvent::Command(_) => {
                if !self.dispatcher.handles(&envelope.event) {
                    return;
                }
                let Some(chat_id) = envelope.event.chat_id() else {
                    return;
                };
                if let Err(error) = self.transport.send_typing(chat_id).await {
                    debug!(
                        correlation_id = %context.correlation_id,
                        error = %error,
                        "typing indicator failed"
                    );
                }
            }
            TelegramEvent::Unsupported { event_type } => {
                debug!(
                    correlation_id = %context.correlation_id,
                    event_type = %event_type,
                    "skipping unsupported update"
                );
            }
        }
    }
}

fn fallback_message(chat_id: i64, context: &EventContext) -> OutboundMessage {
    let failure = InterfaceError::Internal {
        message: "event handler did not complete".to_owned(),
        correlation_id: context.correlation_id.clone(),
    };
    OutboundMessage::text(chat_id, failure.user_message())
}
