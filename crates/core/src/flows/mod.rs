pub mod engine;
pub mod states;

pub use engine::GateFlow;
pub use states::{GateAction, GateEvent, GateState, TransitionOutcome};
