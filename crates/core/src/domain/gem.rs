use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::team::TeamId;
use crate::domain::user::SlackUserId;

pub const MAX_REASON_CHARS: usize = 250;

/// Append-only ledger row written once per successful award.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemTransaction {
    pub id: i64,
    pub team_id: TeamId,
    pub giver: SlackUserId,
    pub receiver: SlackUserId,
    pub reason: String,
    pub awarded_at: DateTime<Utc>,
}

/// Boundary marker of a scoring period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemPeriod {
    pub id: i64,
    pub team_id: TeamId,
    pub reset_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGemAward {
    pub team_id: TeamId,
    pub giver: SlackUserId,
    pub receiver: SlackUserId,
    pub reason: String,
    pub awarded_at: DateTime<Utc>,
}

/// One line of a ranked report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemStanding {
    pub user_id: SlackUserId,
    pub gems: i64,
}
