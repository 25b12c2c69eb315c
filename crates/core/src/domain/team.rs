use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::domain::user::SlackUserId;

/// Workspace identifier as issued by Slack (`T...`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlackTeamId(pub String);

impl fmt::Display for SlackTeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal row id of a team.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub slack_team_id: SlackTeamId,
    pub is_configured: bool,
}

/// A bot installation handed over by the OAuth collaborator.
#[derive(Clone, Debug)]
pub struct Installation {
    pub slack_team_id: SlackTeamId,
    pub bot_token: SecretString,
    pub installer: SlackUserId,
    pub installed_at: DateTime<Utc>,
}
