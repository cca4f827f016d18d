//! Telegram Integration - long-polling bot interface
//!
//! This crate provides the chat transport for kampe:
//! - **Bot API** (`api`) - typed calls to the Telegram Bot HTTP API
//! - **Events** (`events`) - updates mapped to commands, text messages and button presses
//! - **Keyboards** (`keyboard`) - inline keyboard rendering of core replies
//! - **Polling** (`polling`) - `getUpdates` loop with reconnection and a per-event panic boundary
//!
//! # Architecture
//!
//! ```text
//! getUpdates → PollingRunner → EventDispatcher → ConversationService
//!                   ↓
//!     sendMessage / editMessageText ← OutboundMessage ← Reply
//! ```
//!
//! The conversation logic itself lives behind [`events::ConversationService`];
//! this crate only translates between Telegram and core types.

pub mod api;
pub mod events;
pub mod keyboard;
pub mod polling;
