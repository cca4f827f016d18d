//! Conversation Agent - the policy gate in front of the chat backend
//!
//! This crate decides what the bot says for every incoming chat event:
//! - **Conversation** (`conversation`) - `ConversationMachine`, which walks each user
//!   through the privacy-policy gate and relays their messages once accepted
//! - **Runtime** (`runtime`) - the event boundary; failures become apologies, never errors
//! - **Replies** (`replies`) - the bot's own words and the policy link
//!
//! # Policy gate
//!
//! No user text reaches the backend's conversational endpoint until the user has
//! accepted the privacy policy. The only path to `send_message` is the
//! `ForwardMessage` action, which the gate flow yields for accepted users alone.

pub mod conversation;
pub mod replies;
pub mod runtime;

pub use conversation::{ConversationError, ConversationMachine};
pub use replies::ReplyCopy;
pub use runtime::ConversationRuntime;
