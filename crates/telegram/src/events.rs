use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use kampe_core::{ChatEvent, EventKind, Reply, UserIdentity};
use thiserror::Error;

use crate::api::{CallbackQuery, Message, Update};
use crate::keyboard::{parse_callback_data, render_reply, OutboundMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelegramEnvelope {
    pub update_id: i64,
    pub event: TelegramEvent,
}

impl TelegramEnvelope {
    pub fn from_update(update: Update) -> Self {
        let update_id = update.update_id;
        let event = match (update.message, update.callback_query) {
            (Some(message), _) => TelegramEvent::from_message(message),
            (None, Some(query)) => TelegramEvent::from_callback_query(query),
            (None, None) => TelegramEvent::Unsupported { event_type: "update".to_owned() },
        };
        Self { update_id, event }
    }

    pub fn correlation_id(&self) -> String {
        format!("update-{}", self.update_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TelegramEvent {
    Command(CommandEvent),
    TextMessage(TextMessageEvent),
    CallbackQuery(CallbackQueryEvent),
    Unsupported { event_type: String },
}

impl TelegramEvent {
    pub fn event_type(&self) -> TelegramEventType {
        match self {
            Self::Command(_) => TelegramEventType::Command,
            Self::TextMessage(_) => TelegramEventType::TextMessage,
            Self::CallbackQuery(_) => TelegramEventType::CallbackQuery,
            Self::Unsupported { .. } => TelegramEventType::Unsupported,
        }
    }

    /// Chat the event came from, when there is one to answer in.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::Command(event) => Some(event.chat_id),
            Self::TextMessage(event) => Some(event.chat_id),
            Self::CallbackQuery(event) => Some(event.reply_chat_id()),
            Self::Unsupported { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::Command(CommandEvent { from, .. })
            | Self::TextMessage(TextMessageEvent { from, .. })
            | Self::CallbackQuery(CallbackQueryEvent { from, .. }) => Some(from.id.0),
            Self::Unsupported { .. } => None,
        }
    }

    fn from_message(message: Message) -> Self {
        let Some(from) = message.from.as_ref() else {
            return Self::Unsupported { event_type: "message.anonymous".to_owned() };
        };
        let Some(text) = message.text else {
            return Self::Unsupported { event_type: "message.non_text".to_owned() };
        };
        let from = UserIdentity::from(from);

        match parse_command(&text) {
            Some((command, args)) => Self::Command(CommandEvent {
                chat_id: message.chat.id,
                message_id: message.message_id,
                from,
                command,
                args,
            }),
            None => Self::TextMessage(TextMessageEvent {
                chat_id: message.chat.id,
                message_id: message.message_id,
                from,
                text,
            }),
        }
    }

    fn from_callback_query(query: CallbackQuery) -> Self {
        Self::CallbackQuery(CallbackQueryEvent {
            callback_query_id: query.id,
            chat_id: query.message.as_ref().map(|message| message.chat.id),
            message_id: query.message.as_ref().map(|message| message.message_id),
            from: UserIdentity::from(&query.from),
            data: query.data,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TelegramEventType {
    Command,
    TextMessage,
    CallbackQuery,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Unknown(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEvent {
    pub chat_id: i64,
    pub message_id: i64,
    pub from: UserIdentity,
    pub command: BotCommand,
    pub args: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub chat_id: i64,
    pub message_id: i64,
    pub from: UserIdentity,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackQueryEvent {
    pub callback_query_id: String,
    pub chat_id: Option<i64>,
    pub message_id: Option<i64>,
    pub from: UserIdentity,
    pub data: Option<String>,
}

impl CallbackQueryEvent {
    /// Falls back to the user's private chat when the button message is gone.
    pub fn reply_chat_id(&self) -> i64 {
        self.chat_id.unwrap_or(self.from.id.0)
    }
}

/// `/start`, `/start@kampe_bot payload` → (command, args). `/yes` and `/no` re-open the
/// policy gate the same way `/start` does.
fn parse_command(text: &str) -> Option<(BotCommand, String)> {
    let trimmed = text.trim_start();
    let rest = trimmed.strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim().to_owned()),
        None => (rest, String::new()),
    };
    let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }

    let command = match name.as_str() {
        "start" | "yes" | "no" => BotCommand::Start,
        _ => BotCommand::Unknown(name),
    };
    Some((command, args))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutboundMessage),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("conversation service failure: {0}")]
    Conversation(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

/// The conversation core as seen from the transport.
#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn handle_event(&self, event: &ChatEvent) -> Result<Reply, EventHandlerError>;
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> TelegramEventType;
    async fn handle(
        &self,
        envelope: &TelegramEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<TelegramEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &TelegramEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handles(&self, event: &TelegramEvent) -> bool {
        self.handlers.contains_key(&event.event_type())
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher with every supported event routed to `service`.
pub fn conversation_dispatcher(service: Arc<dyn ConversationService>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(service.clone()));
    dispatcher.register(TextMessageHandler::new(service.clone()));
    dispatcher.register(CallbackQueryHandler::new(service));
    dispatcher
}

pub struct CommandHandler {
    service: Arc<dyn ConversationService>,
}

impl CommandHandler {
    pub fn new(service: Arc<dyn ConversationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for CommandHandler {
    fn event_type(&self) -> TelegramEventType {
        TelegramEventType::Command
    }

    async fn handle(
        &self,
        envelope: &TelegramEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let TelegramEvent::Command(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.command != BotCommand::Start {
            return Ok(HandlerResult::Ignored);
        }

        let chat_event =
            ChatEvent::new(event.from.clone(), event.chat_id, &ctx.correlation_id, EventKind::Start);
        let reply = self.service.handle_event(&chat_event).await?;
        Ok(HandlerResult::Responded(render_reply(&reply, event.chat_id, None)))
    }
}

pub struct TextMessageHandler {
    service: Arc<dyn ConversationService>,
}

impl TextMessageHandler {
    pub fn new(service: Arc<dyn ConversationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for TextMessageHandler {
    fn event_type(&self) -> TelegramEventType {
        TelegramEventType::TextMessage
    }

    async fn handle(
        &self,
        envelope: &TelegramEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let TelegramEvent::TextMessage(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.text.trim().is_empty() {
            return Ok(HandlerResult::Processed);
        }

        let chat_event = ChatEvent::new(
            event.from.clone(),
            event.chat_id,
            &ctx.correlation_id,
            EventKind::Text(event.text.clone()),
        );
        let reply = self.service.handle_event(&chat_event).await?;
        Ok(HandlerResult::Responded(render_reply(&reply, event.chat_id, None)))
    }
}

pub struct CallbackQueryHandler {
    service: Arc<dyn ConversationService>,
}

impl CallbackQueryHandler {
    pub fn new(service: Arc<dyn ConversationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for CallbackQueryHandler {
    fn event_type(&self) -> TelegramEventType {
        TelegramEventType::CallbackQuery
    }

    async fn handle(
        &self,
        envelope: &TelegramEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let TelegramEvent::CallbackQuery(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(choice) = event.data.as_deref().and_then(parse_callback_data) else {
            return Ok(HandlerResult::Processed);
        };

        let chat_id = event.reply_chat_id();
        let chat_event = ChatEvent::new(
            event.from.clone(),
            chat_id,
            &ctx.correlation_id,
            EventKind::PolicyChoice(choice),
        );
        let reply = self.service.handle_event(&chat_event).await?;
        Ok(HandlerResult::Responded(render_reply(&reply, chat_id, event.message_id)))
    }
}
