use kampe_core::{PolicyChoice, Reply, ReplyPlacement};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self { text: text.into(), callback_data: callback_data.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Default)]
pub struct KeyboardBuilder {
    rows: Vec<Vec<InlineKeyboardButton>>,
}

impl KeyboardBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut row = RowBuilder::default();
        build(&mut row);
        if !row.buttons.is_empty() {
            self.rows.push(row.buttons);
        }
        self
    }

    pub fn build(self) -> Option<InlineKeyboardMarkup> {
        (!self.rows.is_empty()).then_some(InlineKeyboardMarkup { inline_keyboard: self.rows })
    }
}

#[derive(Default)]
pub struct RowBuilder {
    buttons: Vec<InlineKeyboardButton>,
}

impl RowBuilder {
    pub fn button(&mut self, text: impl Into<String>, callback_data: impl Into<String>) -> &mut Self {
        self.buttons.push(InlineKeyboardButton::new(text, callback_data));
        self
    }
}

/// Callback payloads the policy buttons carry. Kept short: Telegram allows 64 bytes.
pub fn callback_data(choice: PolicyChoice) -> &'static str {
    match choice {
        PolicyChoice::Accept => "yes",
        PolicyChoice::Decline => "no",
    }
}

pub fn parse_callback_data(data: &str) -> Option<PolicyChoice> {
    match data.trim() {
        "yes" => Some(PolicyChoice::Accept),
        "no" => Some(PolicyChoice::Decline),
        _ => None,
    }
}

/// A reply ready to hand to the Bot API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
    pub reply_markup: Option<InlineKeyboardMarkup>,
    /// Set when the reply replaces an existing message instead of posting a new one.
    pub edit_message_id: Option<i64>,
}

impl OutboundMessage {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self { chat_id, text: text.into(), reply_markup: None, edit_message_id: None }
    }
}

pub fn render_reply(reply: &Reply, chat_id: i64, origin_message_id: Option<i64>) -> OutboundMessage {
    let reply_markup = KeyboardBuilder::new()
        .row(|row| {
            for choice in &reply.choices {
                row.button(choice.label.clone(), callback_data(choice.value));
            }
        })
        .build();

    let edit_message_id = match reply.placement {
        ReplyPlacement::ReplaceOrigin => origin_message_id,
        ReplyPlacement::NewMessage => None,
    };

    OutboundMessage { chat_id, text: reply.text.clone(), reply_markup, edit_message_id }
}

#[cfg(test)]
mod tests {
    use kampe_core::{Choice, PolicyChoice, Reply};

    use super::{callback_data, parse_callback_data, render_reply, KeyboardBuilder};

    #[test]
    fn policy_choices_render_as_one_row() {
        let reply = Reply::text("Before we start abeg...")
            .with_choice(Choice::new("Yes, I don hear", PolicyChoice::Accept))
            .with_choice(Choice::new("No, I no do", PolicyChoice::Decline));

        let message = render_reply(&reply, 42, Some(9));

        let markup = message.reply_markup.expect("keyboard attached");
        assert_eq!(markup.inline_keyboard.len(), 1);
        assert_eq!(markup.inline_keyboard[0][0].callback_data, "yes");
        assert_eq!(markup.inline_keyboard[0][1].text, "No, I no do");
        assert_eq!(message.edit_message_id, None, "prompts are posted as new messages");
    }

    #[test]
    fn replace_origin_targets_the_button_message() {
        let reply = Reply::text("You sabi better thing! Make we continue.").replacing_origin();

        let message = render_reply(&reply, 42, Some(9));

        assert_eq!(message.edit_message_id, Some(9));
        assert!(message.reply_markup.is_none());
    }

    #[test]
    fn replace_origin_without_origin_falls_back_to_new_message() {
        let reply = Reply::text("Oya na, Kachifo!").replacing_origin();
        assert_eq!(render_reply(&reply, 42, None).edit_message_id, None);
    }

    #[test]
    fn empty_rows_are_dropped() {
        assert!(KeyboardBuilder::new().row(|_| {}).build().is_none());
    }

    #[test]
    fn callback_data_parses_back_to_choice() {
        for choice in [PolicyChoice::Accept, PolicyChoice::Decline] {
            assert_eq!(parse_callback_data(callback_data(choice)), Some(choice));
        }
        assert_eq!(parse_callback_data("maybe"), None);
    }
}
