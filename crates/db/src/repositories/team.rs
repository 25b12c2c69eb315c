use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use sqlx::sqlite::SqliteRow;

use gemification_core::domain::team::{Installation, SlackTeamId, Team, TeamId};
use gemification_core::domain::user::SlackUserId;

use super::{column, decode_timestamp, encode_timestamp, RepositoryError, TeamRepository};
use crate::DbPool;

pub struct SqlTeamRepository {
    pool: DbPool,
}

impl SqlTeamRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_team(row: &SqliteRow) -> Result<Team, RepositoryError> {
    let id: i64 = column(row, "id")?;
    let slack_team_id: String = column(row, "slack_team_id")?;
    let is_configured: bool = column(row, "is_configured")?;

    Ok(Team { id: TeamId(id), slack_team_id: SlackTeamId(slack_team_id), is_configured })
}

fn row_to_installation(row: &SqliteRow) -> Result<Installation, RepositoryError> {
    let slack_team_id: String = column(row, "slack_team_id")?;
    let bot_token: String = column(row, "bot_token")?;
    let installer: String = column(row, "installer_user_id")?;
    let installed_at: String = column(row, "installed_at")?;

    Ok(Installation {
        slack_team_id: SlackTeamId(slack_team_id),
        bot_token: SecretString::from(bot_token),
        installer: SlackUserId(installer),
        installed_at: decode_timestamp(&installed_at)?,
    })
}

#[async_trait::async_trait]
impl TeamRepository for SqlTeamRepository {
    async fn find_by_slack_id(
        &self,
        slack_team_id: &SlackTeamId,
    ) -> Result<Option<Team>, RepositoryError> {
        let row = sqlx::query("SELECT id, slack_team_id, is_configured FROM team WHERE slack_team_id = ?")
            .bind(&slack_team_id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_team).transpose()
    }

    async fn initialize(
        &self,
        slack_team_id: &SlackTeamId,
        installer: &SlackUserId,
    ) -> Result<Team, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO team (slack_team_id, is_configured, created_at) VALUES (?, 0, ?)
             ON CONFLICT(slack_team_id) DO NOTHING",
        )
        .bind(&slack_team_id.0)
        .bind(encode_timestamp(Utc::now()))
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query("SELECT id, slack_team_id, is_configured FROM team WHERE slack_team_id = ?")
            .bind(&slack_team_id.0)
            .fetch_one(&mut *tx)
            .await?;
        let team = row_to_team(&row)?;

        let admins: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_gem WHERE team_id = ? AND is_admin = 1")
                .bind(team.id.0)
                .fetch_one(&mut *tx)
                .await?;
        if admins == 0 {
            sqlx::query(
                "INSERT INTO user_gem (user_id, team_id, is_admin) VALUES (?, ?, 1)
                 ON CONFLICT(user_id, team_id) DO UPDATE SET is_admin = 1",
            )
            .bind(&installer.0)
            .bind(team.id.0)
            .execute(&mut *tx)
            .await?;
            tracing::info!(team = %slack_team_id, installer = %installer, "seeded installer as first admin");
        }

        tx.commit().await?;
        Ok(team)
    }

    async fn mark_configured(&self, team_id: TeamId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE team SET is_configured = 1 WHERE id = ?")
            .bind(team_id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("team {}", team_id.0)));
        }
        Ok(())
    }

    async fn save_installation(&self, installation: &Installation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO team_installation (slack_team_id, bot_token, installer_user_id, installed_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(slack_team_id) DO UPDATE SET
                 bot_token = excluded.bot_token,
                 installer_user_id = excluded.installer_user_id,
                 installed_at = excluded.installed_at",
        )
        .bind(&installation.slack_team_id.0)
        .bind(installation.bot_token.expose_secret())
        .bind(&installation.installer.0)
        .bind(encode_timestamp(installation.installed_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_installations(&self) -> Result<Vec<Installation>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT slack_team_id, bot_token, installer_user_id, installed_at
             FROM team_installation ORDER BY installed_at, slack_team_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_installation).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use secrecy::ExposeSecret;

    use gemification_core::domain::team::{Installation, SlackTeamId};
    use gemification_core::domain::user::SlackUserId;

    use super::SqlTeamRepository;
    use crate::repositories::{RepositoryError, TeamRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn admin_ids(pool: &DbPool, team_id: i64) -> Vec<String> {
        sqlx::query_scalar(
            "SELECT user_id FROM user_gem WHERE team_id = ? AND is_admin = 1 ORDER BY user_id",
        )
        .bind(team_id)
        .fetch_all(pool)
        .await
        .expect("admins")
    }

    #[tokio::test]
    async fn initialize_creates_team_and_seeds_installer_once() {
        let pool = setup().await;
        let repo = SqlTeamRepository::new(pool.clone());
        let slack_team = SlackTeamId("T1".to_owned());

        let team = repo.initialize(&slack_team, &SlackUserId::new("UINSTALL")).await.expect("init");
        assert!(!team.is_configured);
        assert_eq!(admin_ids(&pool, team.id.0).await, vec!["UINSTALL".to_owned()]);

        let again = repo.initialize(&slack_team, &SlackUserId::new("UOTHER")).await.expect("re-init");
        assert_eq!(again.id, team.id);
        assert_eq!(admin_ids(&pool, team.id.0).await, vec!["UINSTALL".to_owned()]);
    }

    #[tokio::test]
    async fn mark_configured_flips_flag_and_reports_unknown_team() {
        let pool = setup().await;
        let repo = SqlTeamRepository::new(pool);
        let slack_team = SlackTeamId("T1".to_owned());
        let team = repo.initialize(&slack_team, &SlackUserId::new("U1")).await.expect("init");

        repo.mark_configured(team.id).await.expect("mark configured");
        let found = repo.find_by_slack_id(&slack_team).await.expect("find").expect("team exists");
        assert!(found.is_configured);

        let missing = repo.mark_configured(gemification_core::TeamId(999)).await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));
        assert!(repo
            .find_by_slack_id(&SlackTeamId("T404".to_owned()))
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn installations_upsert_by_team() {
        let pool = setup().await;
        let repo = SqlTeamRepository::new(pool);
        let first = Installation {
            slack_team_id: SlackTeamId("T1".to_owned()),
            bot_token: "xoxb-first".to_owned().into(),
            installer: SlackUserId::new("U1"),
            installed_at: Utc.with_ymd_and_hms(2024, 3, 5, 15, 7, 9).unwrap(),
        };
        repo.save_installation(&first).await.expect("save first");

        let replacement = Installation { bot_token: "xoxb-second".to_owned().into(), ..first.clone() };
        repo.save_installation(&replacement).await.expect("save replacement");

        let installations = repo.list_installations().await.expect("list");
        assert_eq!(installations.len(), 1);
        assert_eq!(installations[0].bot_token.expose_secret(), "xoxb-second");
        assert_eq!(installations[0].installed_at, first.installed_at);
    }
}
