use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::Row;
use thiserror::Error;

use gemification_core::domain::gem::{GemPeriod, GemStanding, GemTransaction, NewGemAward};
use gemification_core::domain::group::{Group, GroupId, GroupName};
use gemification_core::domain::team::{Installation, SlackTeamId, Team, TeamId};
use gemification_core::domain::user::{SlackUserId, UserGem};

use crate::DbPool;

pub mod group;
pub mod ledger;
pub mod team;
pub mod user_gem;

pub use group::SqlGroupRepository;
pub use ledger::SqlGemLedgerRepository;
pub use team::SqlTeamRepository;
pub use user_gem::SqlUserGemRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
}

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn find_by_slack_id(
        &self,
        slack_team_id: &SlackTeamId,
    ) -> Result<Option<Team>, RepositoryError>;

    /// Creates the team row if absent and seeds the installer as admin when the team has none.
    async fn initialize(
        &self,
        slack_team_id: &SlackTeamId,
        installer: &SlackUserId,
    ) -> Result<Team, RepositoryError>;

    async fn mark_configured(&self, team_id: TeamId) -> Result<(), RepositoryError>;

    async fn save_installation(&self, installation: &Installation) -> Result<(), RepositoryError>;

    async fn list_installations(&self) -> Result<Vec<Installation>, RepositoryError>;
}

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn list_for_team(&self, team_id: TeamId) -> Result<Vec<Group>, RepositoryError>;

    async fn create_groups(
        &self,
        team_id: TeamId,
        names: &[GroupName],
    ) -> Result<Vec<Group>, RepositoryError>;

    async fn find_by_name(
        &self,
        team_id: TeamId,
        name: &GroupName,
    ) -> Result<Option<Group>, RepositoryError>;
}

#[async_trait]
pub trait UserGemRepository: Send + Sync {
    async fn find(
        &self,
        team_id: TeamId,
        user_id: &SlackUserId,
    ) -> Result<Option<UserGem>, RepositoryError>;

    /// Inserts a row without a group if the user has none yet.
    async fn ensure(&self, team_id: TeamId, user_id: &SlackUserId)
        -> Result<UserGem, RepositoryError>;

    async fn assign_group(
        &self,
        team_id: TeamId,
        user_id: &SlackUserId,
        group_id: Option<GroupId>,
    ) -> Result<UserGem, RepositoryError>;

    async fn grant_admin(
        &self,
        team_id: TeamId,
        user_id: &SlackUserId,
    ) -> Result<bool, RepositoryError>;

    /// Clears the admin flag only while another admin remains; returns whether it changed.
    async fn revoke_admin(
        &self,
        team_id: TeamId,
        user_id: &SlackUserId,
    ) -> Result<bool, RepositoryError>;

    async fn list_admins(&self, team_id: TeamId) -> Result<Vec<SlackUserId>, RepositoryError>;

    async fn count_admins(&self, team_id: TeamId) -> Result<i64, RepositoryError>;

    async fn list_group_members(
        &self,
        team_id: TeamId,
        group_id: GroupId,
    ) -> Result<Vec<SlackUserId>, RepositoryError>;

    /// Members of a group with current gems above zero, highest first.
    async fn ranked_current(
        &self,
        team_id: TeamId,
        group_id: GroupId,
        limit: u32,
    ) -> Result<Vec<GemStanding>, RepositoryError>;

    /// Members of a group with any gems ever received, highest first.
    async fn ranked_total(
        &self,
        team_id: TeamId,
        group_id: GroupId,
    ) -> Result<Vec<GemStanding>, RepositoryError>;
}

#[async_trait]
pub trait GemLedgerRepository: Send + Sync {
    /// Increments both counters of the receiver and appends the ledger row atomically.
    async fn award(&self, award: &NewGemAward) -> Result<GemTransaction, RepositoryError>;

    /// Opens a new period; the schema trigger zeroes current gems for the team.
    async fn start_period(
        &self,
        team_id: TeamId,
        reset_at: DateTime<Utc>,
    ) -> Result<GemPeriod, RepositoryError>;

    /// Transactions received after the second most recent period boundary, newest first.
    async fn reasons_for_recent_periods(
        &self,
        team_id: TeamId,
        receiver: &SlackUserId,
    ) -> Result<Vec<GemTransaction>, RepositoryError>;
}

#[derive(Clone)]
pub struct Repositories {
    pub teams: Arc<dyn TeamRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub users: Arc<dyn UserGemRepository>,
    pub ledger: Arc<dyn GemLedgerRepository>,
}

impl Repositories {
    pub fn sql(pool: DbPool) -> Self {
        Self {
            teams: Arc::new(SqlTeamRepository::new(pool.clone())),
            groups: Arc::new(SqlGroupRepository::new(pool.clone())),
            users: Arc::new(SqlUserGemRepository::new(pool.clone())),
            ledger: Arc::new(SqlGemLedgerRepository::new(pool)),
        }
    }
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(e.to_string()))
}

/// Fixed-width RFC 3339 so stored timestamps order correctly as text.
pub(crate) fn encode_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{value}`: {e}")))
}
