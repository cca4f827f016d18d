use kampe_core::{Choice, InterfaceError, PolicyChoice, Reply, UserIdentity};

const POLICY_PROMPT: &str = "Welcome oh! I greet you. Before we start abeg, make we yarn small about privacy.\n\nAs we dey talk, I fit dey collect small data wey go help me learn. No fear, I no go cast your gist. If you wan know as e dey go, enter here make you read the full gist: ";
const ACCEPTED: &str = "You sabi better thing! Make we continue.";
const DECLINED: &str = "Oya na, Kachifo!";
const BOOTSTRAP_FAILED: &str = "Omo, I no fit open our gist now. Abeg try again small time.";
const ACCEPT_LABEL: &str = "Yes, I don hear";
const DECLINE_LABEL: &str = "No, I no do";

/// Everything the bot says on its own behalf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyCopy {
    policy_url: String,
}

impl ReplyCopy {
    pub fn new(policy_url: impl Into<String>) -> Self {
        Self { policy_url: policy_url.into() }
    }

    pub fn policy_prompt(&self) -> Reply {
        Reply::text(format!("{POLICY_PROMPT}{}", self.policy_url))
            .with_choice(Choice::new(ACCEPT_LABEL, PolicyChoice::Accept))
            .with_choice(Choice::new(DECLINE_LABEL, PolicyChoice::Decline))
    }

    pub fn welcome(&self, identity: &UserIdentity) -> Reply {
        Reply::text(format!(
            "How you dey {}? Abeg, follow me talk, na only Pidgin I sabi. Wetin dey happen for Nigeria?",
            identity.handle()
        ))
    }

    pub fn accepted(&self) -> Reply {
        Reply::text(ACCEPTED).replacing_origin()
    }

    pub fn declined(&self) -> Reply {
        Reply::text(DECLINED).replacing_origin()
    }

    pub fn bootstrap_failed(&self) -> Reply {
        Reply::text(BOOTSTRAP_FAILED)
    }

    pub fn failure(&self, error: &InterfaceError) -> Reply {
        Reply::text(error.user_message())
    }
}

#[cfg(test)]
mod tests {
    use kampe_core::{InterfaceError, PolicyChoice, ReplyPlacement, UserId, UserIdentity};

    use super::ReplyCopy;

    #[test]
    fn policy_prompt_links_configured_url_and_offers_both_choices() {
        let copy = ReplyCopy::new("https://kampe.example/privacy");
        let prompt = copy.policy_prompt();

        assert!(prompt.text.ends_with("read the full gist: https://kampe.example/privacy"));
        assert!(prompt.offers(PolicyChoice::Accept));
        assert!(prompt.offers(PolicyChoice::Decline));
        assert_eq!(prompt.choices[0].label, "Yes, I don hear");
        assert_eq!(prompt.placement, ReplyPlacement::NewMessage);
    }

    #[test]
    fn welcome_addresses_the_user_by_handle() {
        let copy = ReplyCopy::new("https://www.google.com");
        let identity = UserIdentity::new(UserId(1), "Ada").with_username("ada_o");

        assert!(copy.welcome(&identity).text.starts_with("How you dey @ada_o?"));
    }

    #[test]
    fn policy_answers_replace_the_prompt() {
        let copy = ReplyCopy::new("https://www.google.com");
        assert_eq!(copy.accepted().placement, ReplyPlacement::ReplaceOrigin);
        assert_eq!(copy.declined().text, "Oya na, Kachifo!");
    }

    #[test]
    fn failure_uses_user_safe_text_only() {
        let copy = ReplyCopy::new("https://www.google.com");
        let error = InterfaceError::ServiceUnavailable {
            message: "backend send_message returned HTTP 500".to_owned(),
            correlation_id: "update-1".to_owned(),
        };

        let reply = copy.failure(&error);
        assert_eq!(reply.text, "Omo, e be like something don spoil, try again");
        assert!(reply.choices.is_empty());
    }
}
