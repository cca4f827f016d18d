use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    /// The backend answered with a non-success status or could not be reached.
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("internal failure: {0}")]
    Internal(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("another instance is already consuming updates: {0}")]
    DuplicateInstance(String),
}

impl ApplicationError {
    /// Errors the process must not keep running through.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::DuplicateInstance(_))
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Short apology shown in the conversation. Never carries internal detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => "Omo, e be like something don spoil, try again",
            Self::Internal { .. } => {
                "Wahala dey oh, you go wait small abeg, make I check wetin sup."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Internal(message)
            | ApplicationError::Configuration(message)
            | ApplicationError::DuplicateInstance(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, InterfaceError};

    #[test]
    fn integration_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Integration("send-message returned 502".to_owned())
            .into_interface("update-1");

        assert!(matches!(
            interface,
            InterfaceError::ServiceUnavailable { ref correlation_id, .. } if correlation_id == "update-1"
        ));
        assert_eq!(interface.user_message(), "Omo, e be like something don spoil, try again");
    }

    #[test]
    fn internal_error_message_is_user_safe() {
        let interface = ApplicationError::Internal("cache poisoned at 0xdeadbeef".to_owned())
            .into_interface("update-2");

        assert_eq!(interface.correlation_id(), "update-2");
        assert!(!interface.user_message().contains("0xdeadbeef"));
    }

    #[test]
    fn configuration_and_duplicate_instance_are_fatal() {
        assert!(ApplicationError::Configuration("missing token".to_owned()).is_fatal());
        assert!(ApplicationError::DuplicateInstance("409".to_owned()).is_fatal());
        assert!(!ApplicationError::Integration("timeout".to_owned()).is_fatal());
        assert!(!ApplicationError::Internal("boom".to_owned()).is_fatal());
    }
}
