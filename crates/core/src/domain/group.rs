use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::team::TeamId;

pub const MAX_GROUPS_PER_TEAM: usize = 4;
pub const MAX_GROUP_NAME_CHARS: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub i64);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GroupNameError {
    #[error("group name cannot be empty")]
    Empty,
    #[error("group name `{name}` is longer than {MAX_GROUP_NAME_CHARS} characters")]
    TooLong { name: String },
}

/// A group name normalized by capitalizing its first letter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupName(String);

impl GroupName {
    pub fn parse(raw: &str) -> Result<Self, GroupNameError> {
        let normalized = normalize_group_name(raw);
        if normalized.is_empty() {
            return Err(GroupNameError::Empty);
        }
        if normalized.chars().count() > MAX_GROUP_NAME_CHARS {
            return Err(GroupNameError::TooLong { name: normalized });
        }
        Ok(Self(normalized))
    }

    /// Rehydrates a name read back from storage; already normalized at insert time.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trims and upper-cases the first character; idempotent.
pub fn normalize_group_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub team_id: TeamId,
    pub name: GroupName,
}
