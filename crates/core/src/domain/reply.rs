use serde::{Deserialize, Serialize};

use crate::domain::event::PolicyChoice;

/// One selectable option offered alongside a reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub value: PolicyChoice,
}

impl Choice {
    pub fn new(label: impl Into<String>, value: PolicyChoice) -> Self {
        Self { label: label.into(), value }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyPlacement {
    #[default]
    NewMessage,
    /// Replace the message whose button triggered the event.
    ReplaceOrigin,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub choices: Vec<Choice>,
    pub placement: ReplyPlacement,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), choices: Vec::new(), placement: ReplyPlacement::NewMessage }
    }

    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    pub fn replacing_origin(mut self) -> Self {
        self.placement = ReplyPlacement::ReplaceOrigin;
        self
    }

    pub fn offers(&self, value: PolicyChoice) -> bool {
        self.choices.iter().any(|choice| choice.value == value)
    }
}
