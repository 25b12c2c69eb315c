use thiserror::Error;

use crate::domain::group::GroupNameError;
use crate::flows::DialogueError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    GroupName(#[from] GroupNameError),
    #[error(transparent)]
    Dialogue(#[from] DialogueError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::DomainError;
    use crate::domain::group::{GroupName, GroupNameError};

    #[test]
    fn group_name_errors_convert_into_domain_errors() {
        let error = GroupName::parse("   ").map_err(DomainError::from);
        assert_eq!(error, Err(DomainError::GroupName(GroupNameError::Empty)));
    }

    #[test]
    fn invariant_violation_message_is_prefixed() {
        let error = DomainError::InvariantViolation("team must keep one admin".to_owned());
        assert_eq!(error.to_string(), "domain invariant violation: team must keep one admin");
    }
}
