use sqlx::sqlite::SqliteRow;

use gemification_core::domain::gem::GemStanding;
use gemification_core::domain::group::GroupId;
use gemification_core::domain::team::TeamId;
use gemification_core::domain::user::{SlackUserId, UserGem};

use super::{column, RepositoryError, UserGemRepository};
use crate::DbPool;

const USER_GEM_COLUMNS: &str =
    "id, user_id, team_id, group_id, is_admin, current_gems, total_gems";

pub struct SqlUserGemRepository {
    pool: DbPool,
}

impl SqlUserGemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn standings(
        &self,
        sql: &str,
        team_id: TeamId,
        group_id: GroupId,
        limit: i64,
    ) -> Result<Vec<GemStanding>, RepositoryError> {
        let rows = sqlx::query(sql)
            .bind(team_id.0)
            .bind(group_id.0)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let user_id: String = column(row, "user_id")?;
                let gems: i64 = column(row, "gems")?;
                Ok(GemStanding { user_id: SlackUserId(user_id), gems })
            })
            .collect()
    }
}

fn row_to_user_gem(row: &SqliteRow) -> Result<UserGem, RepositoryError> {
    let id: i64 = column(row, "id")?;
    let user_id: String = column(row, "user_id")?;
    let team_id: i64 = column(row, "team_id")?;
    let group_id: Option<i64> = column(row, "group_id")?;
    let is_admin: bool = column(row, "is_admin")?;
    let current_gems: i64 = column(row, "current_gems")?;
    let total_gems: i64 = column(row, "total_gems")?;

    Ok(UserGem {
        id,
        user_id: SlackUserId(user_id),
        team_id: TeamId(team_id),
        group_id: group_id.map(GroupId),
        is_admin,
        current_gems,
        total_gems,
    })
}

#[async_trait::async_trait]
impl UserGemRepository for SqlUserGemRepository {
    async fn find(
        &self,
        team_id: TeamId,
        user_id: &SlackUserId,
    ) -> Result<Option<UserGem>, RepositoryError> {
        let sql = format!("SELECT {USER_GEM_COLUMNS} FROM user_gem WHERE team_id = ? AND user_id = ?");
        let row = sqlx::query(&sql)
            .bind(team_id.0)
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_user_gem).transpose()
    }

    async fn ensure(
        &self,
        team_id: TeamId,
        user_id: &SlackUserId,
    ) -> Result<UserGem, RepositoryError> {
        sqlx::query(
            "INSERT INTO user_gem (user_id, team_id) VALUES (?, ?)
             ON CONFLICT(user_id, team_id) DO NOTHING",
        )
        .bind(&user_id.0)
        .bind(team_id.0)
        .execute(&self.pool)
        .await?;

        self.find(team_id, user_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("user {user_id} in team {}", team_id.0)))
    }

    async fn assign_group(
        &self,
        team_id: TeamId,
        user_id: &SlackUserId,
        group_id: Option<GroupId>,
    ) -> Result<UserGem, RepositoryError> {
        let sql = format!(
            "INSERT INTO user_gem (user_id, team_id, group_id) VALUES (?, ?, ?)
             ON CONFLICT(user_id, team_id) DO UPDATE SET group_id = excluded.group_id
             RETURNING {USER_GEM_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&user_id.0)
            .bind(team_id.0)
            .bind(group_id.map(|id| id.0))
            .fetch_one(&self.pool)
            .await?;

        row_to_user_gem(&row)
    }

    async fn grant_admin(
        &self,
        team_id: TeamId,
        user_id: &SlackUserId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE user_gem SET is_admin = 1 WHERE team_id = ? AND user_id = ? AND is_admin = 0",
        )
        .bind(team_id.0)
        .bind(&user_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_admin(
        &self,
        team_id: TeamId,
        user_id: &SlackUserId,
    ) -> Result<bool, RepositoryError> {
        // The count guard keeps the last admin in place even under concurrent revocations.
        let result = sqlx::query(
            "UPDATE user_gem SET is_admin = 0
             WHERE team_id = ? AND user_id = ? AND is_admin = 1
               AND (SELECT COUNT(*) FROM user_gem WHERE team_id = ? AND is_admin = 1) > 1",
        )
        .bind(team_id.0)
        .bind(&user_id.0)
        .bind(team_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_admins(&self, team_id: TeamId) -> Result<Vec<SlackUserId>, RepositoryError> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT user_id FROM user_gem WHERE team_id = ? AND is_admin = 1 ORDER BY id",
        )
        .bind(team_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(SlackUserId).collect())
    }

    async fn count_admins(&self, team_id: TeamId) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_gem WHERE team_id = ? AND is_admin = 1")
                .bind(team_id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn list_group_members(
        &self,
        team_id: TeamId,
        group_id: GroupId,
    ) -> Result<Vec<SlackUserId>, RepositoryError> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT user_id FROM user_gem WHERE team_id = ? AND group_id = ? ORDER BY id",
        )
        .bind(team_id.0)
        .bind(group_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(SlackUserId).collect())
    }

    async fn ranked_current(
        &self,
        team_id: TeamId,
        group_id: GroupId,
        limit: u32,
    ) -> Result<Vec<GemStanding>, RepositoryError> {
        self.standings(
            "SELECT user_id, current_gems AS gems FROM user_gem
             WHERE team_id = ? AND group_id = ? AND current_gems > 0
             ORDER BY current_gems DESC, id LIMIT ?",
            team_id,
            group_id,
            i64::from(limit),
        )
        .await
    }

    async fn ranked_total(
        &self,
        team_id: TeamId,
        group_id: GroupId,
    ) -> Result<Vec<GemStanding>, RepositoryError> {
        // A negative LIMIT is unbounded in SQLite.
        self.standings(
            "SELECT user_id, total_gems AS gems FROM user_gem
             WHERE team_id = ? AND group_id = ? AND total_gems > 0
             ORDER BY total_gems DESC, id LIMIT ?",
            team_id,
            group_id,
            -1,
        )
        .await
    }
}
