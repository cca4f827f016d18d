use kampe_core::{ApplicationError, ChatEvent, Reply};
use tracing::{error, warn};

use crate::conversation::{ConversationError, ConversationMachine};

/// Event boundary around [`ConversationMachine`]. Every event gets a reply; failures
/// are logged here and answered with a user-safe apology.
pub struct ConversationRuntime {
    machine: ConversationMachine,
}

impl ConversationRuntime {
    pub fn new(machine: ConversationMachine) -> Self {
        Self { machine }
    }

    pub async fn handle_event(&self, event: &ChatEvent) -> Reply {
        match self.machine.handle(event).await {
            Ok(reply) => reply,
            Err(conversation_error) => self.recover(event, conversation_error),
        }
    }

    fn recover(&self, event: &ChatEvent, conversation_error: ConversationError) -> Reply {
        if let ConversationError::Bootstrap(backend_error) = &conversation_error {
            warn!(
                event_name = "conversation.bootstrap_failed",
                correlation_id = %event.correlation_id,
                user_id = %event.identity.id,
                event_kind = event.kind.label(),
                operation = backend_error.operation().map(|operation| operation.as_str()),
                error = %backend_error,
                "could not bootstrap user session"
            );
            return self.machine.copy().bootstrap_failed();
        }

        error!(
            event_name = "conversation.failed",
            correlation_id = %event.correlation_id,
            user_id = %event.identity.id,
            event_kind = event.kind.label(),
            error = %conversation_error,
            "conversation event failed"
        );
        let interface_error =
            ApplicationError::from(conversation_error).into_interface(&event.correlation_id);
        self.machine.copy().failure(&interface_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kampe_backend::ModelReply;
    use kampe_core::{InMemorySessionCache, SessionCache, SessionPatch, Threshold};

    use super::ConversationRuntime;
    use crate::conversation::tests::{text, ScriptedBackend, U1};
    use crate::conversation::ConversationMachine;
    use crate::replies::ReplyCopy;

    fn runtime() -> (ConversationRuntime, Arc<ScriptedBackend>, Arc<InMemorySessionCache>) {
        let backend = Arc::new(ScriptedBackend::default());
        let cache = Arc::new(InMemorySessionCache::new());
        let machine =
            ConversationMachine::new(backend.clone(), cache.clone(), ReplyCopy::new("https://www.google.com"));
        (ConversationRuntime::new(machine), backend, cache)
    }

    #[tokio::test]
    async fn backend_failure_becomes_try_again_apology() {
        let (runtime, backend, cache) = runtime();
        cache.set(U1, SessionPatch::new().policy_accepted(true)).await;
        backend.push_reply(Err(500));

        let reply = runtime.handle_event(&text("how far")).await;

        assert_eq!(reply.text, "Omo, e be like something don spoil, try again");
        assert!(!reply.text.contains("500"));
    }

    #[tokio::test]
    async fn bootstrap_failure_gets_its_own_apology() {
        let (runtime, backend, cache) = runtime();
        backend.push_session(Err(502));

        let reply = runtime.handle_event(&text("hello")).await;

        assert_eq!(reply.text, "Omo, I no fit open our gist now. Abeg try again small time.");
        assert!(!cache.exists(U1).await);
    }

    #[tokio::test]
    async fn successful_events_pass_through_unchanged() {
        let (runtime, backend, cache) = runtime();
        cache.set(U1, SessionPatch::new().policy_accepted(true)).await;
        backend.push_reply(Ok(ModelReply {
            message: "I dey kampe".to_owned(),
            threshold: Threshold::from(7),
        }));

        let reply = runtime.handle_event(&text("how far")).await;

        assert_eq!(reply.text, "I dey kampe");
    }
}
