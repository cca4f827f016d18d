use std::fmt;

use serde::{Deserialize, Serialize};

/// Chat-platform user id. Telegram ids fit in 52 bits, so `i64` is lossless.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub language_code: Option<String>,
    pub is_bot: bool,
}

impl UserIdentity {
    pub fn new(id: UserId, first_name: impl Into<String>) -> Self {
        Self {
            id,
            username: None,
            first_name: first_name.into(),
            last_name: None,
            language_code: None,
            is_bot: false,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn display_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim).filter(|last| !last.is_empty()) {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }

    /// Name used when greeting: the handle if the user has one, else the display name.
    pub fn handle(&self) -> String {
        match self.username.as_deref() {
            Some(username) if !username.trim().is_empty() => format!("@{username}"),
            _ => self.display_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{UserId, UserIdentity};

    #[test]
    fn display_name_skips_blank_last_name() {
        let mut identity = UserIdentity::new(UserId(7), "Ada");
        identity.last_name = Some("  ".to_owned());
        assert_eq!(identity.display_name(), "Ada");

        identity.last_name = Some("Obi".to_owned());
        assert_eq!(identity.display_name(), "Ada Obi");
    }

    #[test]
    fn handle_prefers_username() {
        let identity = UserIdentity::new(UserId(7), "Ada").with_username("ada_o");
        assert_eq!(identity.handle(), "@ada_o");
        assert_eq!(UserIdentity::new(UserId(8), "Tunde").handle(), "Tunde");
    }
}
