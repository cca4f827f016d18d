use std::sync::Arc;

use kampe_backend::{BackendClient, BackendError, SessionContext, UserLookup};
use kampe_core::{
    ApplicationError, ChatEvent, EventKind, GateAction, GateEvent, GateFlow, GateState, Reply,
    SessionCache, SessionPatch, SessionRecord, UserIdentity,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::replies::ReplyCopy;

#[derive(Debug, Error)]
pub enum ConversationError {
    /// The user could not be looked up or registered; they stay unbootstrapped.
    #[error("session bootstrap failed: {0}")]
    Bootstrap(#[source] BackendError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("conversation invariant violated: {0}")]
    Internal(String),
}

impl From<ConversationError> for ApplicationError {
    fn from(value: ConversationError) -> Self {
        match value {
            ConversationError::Bootstrap(error) | ConversationError::Backend(error) => {
                error.into()
            }
            ConversationError::Internal(message) => Self::Internal(message),
        }
    }
}

/// Drives one user's way through the policy gate and relays their messages once
/// they are through it.
pub struct ConversationMachine {
    backend: Arc<dyn BackendClient>,
    cache: Arc<dyn SessionCache>,
    flow: GateFlow,
    copy: ReplyCopy,
}

impl ConversationMachine {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        cache: Arc<dyn SessionCache>,
        copy: ReplyCopy,
    ) -> Self {
        Self { backend, cache, flow: GateFlow::new(), copy }
    }

    pub fn copy(&self) -> &ReplyCopy {
        &self.copy
    }

    pub async fn handle(&self, event: &ChatEvent) -> Result<Reply, ConversationError> {
        let identity = &event.identity;
        let gate_event = GateEvent::from(&event.kind);

        let mut record = self.cache.get(identity.id).await;
        let mut outcome = self.flow.next_action(GateState::of(record.as_ref()), gate_event);

        if !outcome.action.is_terminal() {
            let bootstrapped = self.bootstrap(identity).await.map_err(ConversationError::Bootstrap)?;
            record = Some(bootstrapped);
            outcome = self.flow.next_action(GateState::of(record.as_ref()), gate_event);
        }

        info!(
            event_name = "conversation.transition",
            correlation_id = %event.correlation_id,
            user_id = %identity.id,
            from = ?outcome.from,
            gate_event = ?outcome.event,
            action = ?outcome.action,
            "gate transition planned"
        );

        match outcome.action {
            GateAction::Bootstrap => Err(ConversationError::Internal(format!(
                "gate for user {} did not settle after bootstrap",
                identity.id
            ))),
            GateAction::PromptPolicy => Ok(self.copy.policy_prompt()),
            GateAction::Welcome => Ok(self.copy.welcome(identity)),
            GateAction::ForwardMessage => {
                let EventKind::Text(text) = &event.kind else {
                    return Err(ConversationError::Internal(format!(
                        "forward planned for non-text event {}",
                        event.kind.label()
                    )));
                };
                let session_id = record.and_then(|record| record.session_id);
                self.forward(identity, session_id, text).await
            }
            GateAction::RecordAcceptance => self.accept(identity).await,
            GateAction::RecordDecline => Ok(self.decline(identity).await),
        }
    }

    /// Reads the backend's view of the user, registering them when it has none, and
    /// caches it.
    async fn bootstrap(&self, identity: &UserIdentity) -> Result<SessionRecord, BackendError> {
        let patch = self.canonical_state(identity).await?;
        Ok(self.cache.set(identity.id, patch).await)
    }

    async fn canonical_state(&self, identity: &UserIdentity) -> Result<SessionPatch, BackendError> {
        match self.backend.fetch_user_record(identity.id).await? {
            UserLookup::Found(record) => {
                debug!(user_id = %identity.id, accepted = record.policy_accepted, "backend record found");
                Ok(SessionPatch::new()
                    .threshold(record.threshold)
                    .policy_accepted(record.policy_accepted))
            }
            UserLookup::NotFound => {
                let created = self.backend.create_session(identity).await?;
                info!(
                    event_name = "conversation.session_created",
                    user_id = %identity.id,
                    has_session_id = created.session_id.is_some(),
                    "backend session created"
                );
                Ok(SessionPatch::new()
                    .session_id(created.session_id)
                    .threshold(created.threshold)
                    .policy_accepted(false))
            }
        }
    }

    async fn forward(
        &self,
        identity: &UserIdentity,
        session_id: Option<String>,
        text: &str,
    ) -> Result<Reply, ConversationError> {
        let session = SessionContext { user_id: identity.id, session_id };
        let reply = self.backend.send_message(&session, text).await?;
        self.cache.set(identity.id, SessionPatch::new().threshold(reply.threshold)).await;
        Ok(Reply::text(reply.message))
    }

    async fn accept(&self, identity: &UserIdentity) -> Result<Reply, ConversationError> {
        let mut patch = self.canonical_state(identity).await?;
        // An existing flag only moves on a confirmed acceptance.
        if self.cache.exists(identity.id).await {
            patch.policy_accepted = None;
        }
        self.cache.set(identity.id, patch).await;

        self.backend.record_policy_acceptance(identity.id).await?;
        self.cache.set(identity.id, SessionPatch::new().policy_accepted(true)).await;
        info!(event_name = "conversation.policy_accepted", user_id = %identity.id, "policy accepted");
        Ok(self.copy.accepted())
    }

    async fn decline(&self, identity: &UserIdentity) -> Reply {
        if self.cache.exists(identity.id).await {
            self.cache.set(identity.id, SessionPatch::new().policy_accepted(false)).await;
        }
        info!(event_name = "conversation.policy_declined", user_id = %identity.id, "policy declined");
        self.copy.declined()
    }
}
