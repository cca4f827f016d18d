use crate::flows::states::{GateAction, GateEvent, GateState, TransitionOutcome};

/// Transition table for the policy gate.
///
/// `ForwardMessage` is only ever produced from `Active`, so no user text can
/// reach the backend's conversational endpoint before the policy is accepted.
#[derive(Clone, Debug, Default)]
pub struct GateFlow;

impl GateFlow {
    pub fn new() -> Self {
        Self
    }

    pub fn next_action(&self, state: GateState, event: GateEvent) -> TransitionOutcome {
        TransitionOutcome { from: state, event, action: transition(state, event) }
    }
}

fn transition(state: GateState, event: GateEvent) -> GateAction {
    use GateAction::{
        Bootstrap, ForwardMessage, PromptPolicy, RecordAcceptance, RecordDecline, Welcome,
    };
    use GateEvent::{Accept, Decline, Start, Text};
    use GateState::{Active, PendingPolicy, Unbootstrapped};

    match (state, event) {
        (_, Accept) => RecordAcceptance,
        (_, Decline) => RecordDecline,
        (Unbootstrapped, Text | Start) => Bootstrap,
        (PendingPolicy, Text | Start) => PromptPolicy,
        (Active, Text) => ForwardMessage,
        (Active, Start) => Welcome,
    }
}
