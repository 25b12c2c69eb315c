use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;

use gemification_core::domain::gem::{GemPeriod, GemTransaction, NewGemAward};
use gemification_core::domain::team::TeamId;
use gemification_core::domain::user::SlackUserId;

use super::{column, decode_timestamp, encode_timestamp, GemLedgerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlGemLedgerRepository {
    pool: DbPool,
}

impl SqlGemLedgerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_transaction(row: &SqliteRow) -> Result<GemTransaction, RepositoryError> {
    let id: i64 = column(row, "id")?;
    let team_id: i64 = column(row, "team_id")?;
    let giver: String = column(row, "giver_user_id")?;
    let receiver: String = column(row, "receiver_user_id")?;
    let reason: String = column(row, "reason")?;
    let awarded_at: String = column(row, "awarded_at")?;

    Ok(GemTransaction {
        id,
        team_id: TeamId(team_id),
        giver: SlackUserId(giver),
        receiver: SlackUserId(receiver),
        reason,
        awarded_at: decode_timestamp(&awarded_at)?,
    })
}

#[async_trait::async_trait]
impl GemLedgerRepository for SqlGemLedgerRepository {
    async fn award(&self, award: &NewGemAward) -> Result<GemTransaction, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE user_gem
             SET current_gems = current_gems + 1, total_gems = total_gems + 1
             WHERE team_id = ? AND user_id = ?",
        )
        .bind(award.team_id.0)
        .bind(&award.receiver.0)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "receiver {} in team {}",
                award.receiver, award.team_id.0
            )));
        }

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO gem_transaction (team_id, giver_user_id, receiver_user_id, reason, awarded_at)
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(award.team_id.0)
        .bind(&award.giver.0)
        .bind(&award.receiver.0)
        .bind(&award.reason)
        .bind(encode_timestamp(award.awarded_at))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(GemTransaction {
            id,
            team_id: award.team_id,
            giver: award.giver.clone(),
            receiver: award.receiver.clone(),
            reason: award.reason.clone(),
            awarded_at: award.awarded_at,
        })
    }

    async fn start_period(
        &self,
        team_id: TeamId,
        reset_at: DateTime<Utc>,
    ) -> Result<GemPeriod, RepositoryError> {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO gem_period (team_id, reset_at) VALUES (?, ?) RETURNING id")
                .bind(team_id.0)
                .bind(encode_timestamp(reset_at))
                .fetch_one(&self.pool)
                .await?;

        Ok(GemPeriod { id, team_id, reset_at })
    }

    async fn reasons_for_recent_periods(
        &self,
        team_id: TeamId,
        receiver: &SlackUserId,
    ) -> Result<Vec<GemTransaction>, RepositoryError> {
        // Fewer than two boundaries means the whole history is in range.
        let rows = sqlx::query(
            "SELECT id, team_id, giver_user_id, receiver_user_id, reason, awarded_at
             FROM gem_transaction
             WHERE team_id = ? AND receiver_user_id = ?
               AND awarded_at > COALESCE(
                   (SELECT reset_at FROM gem_period WHERE team_id = ?
                    ORDER BY reset_at DESC, id DESC LIMIT 1 OFFSET 1),
                   '')
             ORDER BY awarded_at DESC, id DESC",
        )
        .bind(team_id.0)
        .bind(&receiver.0)
        .bind(team_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use gemification_core::domain::gem::NewGemAward;
    use gemification_core::domain::team::{SlackTeamId, Team};
    use gemification_core::domain::user::SlackUserId;

    use super::SqlGemLedgerRepository;
    use crate::repositories::{
        GemLedgerRepository, RepositoryError, SqlTeamRepository, SqlUserGemRepository,
        TeamRepository, UserGemRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> (DbPool, Team) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let team = SqlTeamRepository::new(pool.clone())
            .initialize(&SlackTeamId("T1".to_owned()), &SlackUserId::new("UGIVER"))
            .await
            .expect("team");
        SqlUserGemRepository::new(pool.clone())
            .ensure(team.id, &SlackUserId::new("URECEIVER"))
            .await
            .expect("receiver");
        (pool, team)
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    fn award(team: &Team, reason: &str, day: u32) -> NewGemAward {
        NewGemAward {
            team_id: team.id,
            giver: SlackUserId::new("UGIVER"),
            receiver: SlackUserId::new("URECEIVER"),
            reason: reason.to_owned(),
            awarded_at: at(day),
        }
    }

    #[tokio::test]
    async fn award_increments_both_counters_and_appends_ledger_row() {
        let (pool, team) = setup().await;
        let ledger = SqlGemLedgerRepository::new(pool.clone());
        let users = SqlUserGemRepository::new(pool);

        let written = ledger.award(&award(&team, "shipping the release", 1)).await.expect("award");
        assert_eq!(written.reason, "shipping the release");

        let receiver = users
            .find(team.id, &SlackUserId::new("URECEIVER"))
            .await
            .expect("find")
            .expect("receiver row");
        assert_eq!((receiver.current_gems, receiver.total_gems), (1, 1));
    }

    #[tokio::test]
    async fn award_to_unconfigured_receiver_writes_nothing() {
        let (pool, team) = setup().await;
        let ledger = SqlGemLedgerRepository::new(pool.clone());
        let mut stray = award(&team, "help", 1);
        stray.receiver = SlackUserId::new("UNOBODY");

        let result = ledger.award(&stray).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gem_transaction")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn start_period_resets_current_but_keeps_total() {
        let (pool, team) = setup().await;
        let ledger = SqlGemLedgerRepository::new(pool.clone());
        let users = SqlUserGemRepository::new(pool);
        ledger.award(&award(&team, "one", 1)).await.expect("award");
        ledger.award(&award(&team, "two", 2)).await.expect("award");

        ledger.start_period(team.id, at(3)).await.expect("period");

        let receiver = users
            .find(team.id, &SlackUserId::new("URECEIVER"))
            .await
            .expect("find")
            .expect("receiver row");
        assert_eq!((receiver.current_gems, receiver.total_gems), (0, 2));
    }

    #[tokio::test]
    async fn reasons_cover_the_last_two_periods_newest_first() {
        let (pool, team) = setup().await;
        let ledger = SqlGemLedgerRepository::new(pool);
        let receiver = SlackUserId::new("URECEIVER");

        ledger.award(&award(&team, "ancient", 1)).await.expect("award");
        ledger.start_period(team.id, at(2)).await.expect("period");
        ledger.award(&award(&team, "older", 3)).await.expect("award");

        let before_second_clear =
            ledger.reasons_for_recent_periods(team.id, &receiver).await.expect("reasons");
        assert_eq!(before_second_clear.len(), 2);

        ledger.start_period(team.id, at(4)).await.expect("period");
        ledger.award(&award(&team, "recent", 5)).await.expect("award");

        let reasons = ledger.reasons_for_recent_periods(team.id, &receiver).await.expect("reasons");
        let reasons: Vec<&str> = reasons.iter().map(|t| t.reason.as_str()).collect();
        assert_eq!(reasons, vec!["recent", "older"]);
    }
}
