//! Backend Client - typed access to the remote conversation backend
//!
//! - **Client** (`client`) - `BackendClient` trait, result types and errors
//! - **HTTP** (`http`) - reqwest implementation against the backend's HTTP surface
//! - **Wire** (`wire`) - request/response bodies as the backend encodes them
//!
//! Every operation is a single request/response: no retries, no backoff, no
//! idempotency key. Callers decide what a failure means for the user.

pub mod client;
pub mod http;
pub mod wire;

pub use client::{
    BackendClient, BackendError, BackendOperation, CreatedSession, ModelReply, SessionContext,
    UserLookup, UserRecord,
};
pub use http::HttpBackendClient;
