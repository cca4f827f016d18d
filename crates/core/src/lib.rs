//! Kampe Core - shared domain for the policy-gated chat relay
//!
//! - **Domain** (`domain`) - user identity, session record, chat events and replies
//! - **Session cache** (`cache`) - process-local shadow of backend session state
//! - **Gate flow** (`flows`) - transition table for the privacy-policy gate
//! - **Config** (`config`) - layered file/env/override configuration
//! - **Errors** (`errors`) - application error taxonomy and user-safe mapping

pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use cache::{InMemorySessionCache, SessionCache};
pub use domain::event::{ChatEvent, EventKind, PolicyChoice};
pub use domain::identity::{UserId, UserIdentity};
pub use domain::reply::{Choice, Reply, ReplyPlacement};
pub use domain::session::{SessionPatch, SessionRecord, Threshold};
pub use errors::{ApplicationError, InterfaceError};
pub use flows::{GateAction, GateEvent, GateFlow, GateState, TransitionOutcome};
