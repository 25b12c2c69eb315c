use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::group::GroupId;
use crate::domain::team::TeamId;

/// Slackbot is reported as a regular member by `users.list`.
pub const SLACKBOT_USER_ID: &str = "USLACKBOT";

/// Workspace member identifier as issued by Slack (`U...` / `W...`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlackUserId(pub String);

impl SlackUserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Chat markup that renders as a clickable mention.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl fmt::Display for SlackUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A configured user of one team. The existence of the row is what makes a user "configured".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGem {
    pub id: i64,
    pub user_id: SlackUserId,
    pub team_id: TeamId,
    pub group_id: Option<GroupId>,
    pub is_admin: bool,
    pub current_gems: i64,
    pub total_gems: i64,
}

/// One entry of the workspace roster as reported by `users.list`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: SlackUserId,
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl Member {
    pub fn is_bot_account(&self) -> bool {
        self.is_bot || self.id.as_str() == SLACKBOT_USER_ID
    }

    pub fn display_name(&self) -> &str {
        &self.name
    }

    /// Real name when Slack has one, otherwise the handle.
    pub fn preferred_name(&self) -> &str {
        match self.real_name.as_deref() {
            Some(real_name) if !real_name.trim().is_empty() => real_name,
            _ => &self.name,
        }
    }
}

/// Snapshot of a team's members, in the order Slack returned them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    members: Vec<Member>,
}

impl Roster {
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn find(&self, user: &SlackUserId) -> Option<&Member> {
        self.members.iter().find(|member| &member.id == user)
    }

    pub fn contains(&self, user: &SlackUserId) -> bool {
        self.find(user).is_some()
    }

    /// Handle of the member, falling back to the mention markup for unknown ids.
    pub fn display_name(&self, user: &SlackUserId) -> String {
        self.find(user).map(|member| member.display_name().to_owned()).unwrap_or_else(|| user.mention())
    }

    /// Members that can be assigned to a group: humans that are still active.
    pub fn assignable(&self) -> Vec<Member> {
        self.members
            .iter()
            .filter(|member| !member.is_bot_account() && !member.deleted)
            .cloned()
            .collect()
    }
}
