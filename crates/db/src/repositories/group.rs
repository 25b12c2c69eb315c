use sqlx::sqlite::SqliteRow;

use gemification_core::domain::group::{Group, GroupId, GroupName, MAX_GROUPS_PER_TEAM};
use gemification_core::domain::team::TeamId;

use super::{column, GroupRepository, RepositoryError};
use crate::DbPool;

pub struct SqlGroupRepository {
    pool: DbPool,
}

impl SqlGroupRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_group(row: &SqliteRow) -> Result<Group, RepositoryError> {
    let id: i64 = column(row, "id")?;
    let team_id: i64 = column(row, "team_id")?;
    let name: String = column(row, "group_name")?;

    Ok(Group { id: GroupId(id), team_id: TeamId(team_id), name: GroupName::from_stored(name) })
}

#[async_trait::async_trait]
impl GroupRepository for SqlGroupRepository {
    async fn list_for_team(&self, team_id: TeamId) -> Result<Vec<Group>, RepositoryError> {
        let rows =
            sqlx::query("SELECT id, team_id, group_name FROM gem_group WHERE team_id = ? ORDER BY id")
                .bind(team_id.0)
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_group).collect()
    }

    async fn create_groups(
        &self,
        team_id: TeamId,
        names: &[GroupName],
    ) -> Result<Vec<Group>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM gem_group WHERE team_id = ?")
            .bind(team_id.0)
            .fetch_one(&mut *tx)
            .await?;
        let existing = usize::try_from(existing).unwrap_or(usize::MAX);
        if existing.saturating_add(names.len()) > MAX_GROUPS_PER_TEAM {
            return Err(RepositoryError::Constraint(format!(
                "team {} would exceed {MAX_GROUPS_PER_TEAM} groups",
                team_id.0
            )));
        }

        let mut created = Vec::with_capacity(names.len());
        for name in names {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO gem_group (team_id, group_name) VALUES (?, ?) RETURNING id",
            )
            .bind(team_id.0)
            .bind(name.as_str())
            .fetch_one(&mut *tx)
            .await?;
            created.push(Group { id: GroupId(id), team_id, name: name.clone() });
        }

        tx.commit().await?;
        tracing::debug!(team_id = team_id.0, count = created.len(), "persisted groups");
        Ok(created)
    }

    async fn find_by_name(
        &self,
        team_id: TeamId,
        name: &GroupName,
    ) -> Result<Option<Group>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, team_id, group_name FROM gem_group WHERE team_id = ? AND group_name = ?",
        )
        .bind(team_id.0)
        .bind(name.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_group).transpose()
    }
}

#[cfg(test)]
mod tests {
    use gemification_core::domain::group::GroupName;
    use gemification_core::domain::team::SlackTeamId;
    use gemification_core::domain::user::SlackUserId;

    use super::SqlGroupRepository;
    use crate::repositories::{GroupRepository, RepositoryError, SqlTeamRepository, TeamRepository};
    use crate::{connect_with_settings, migrations};

    fn names(raw: &[&str]) -> Vec<GroupName> {
        raw.iter().map(|name| GroupName::parse(name).expect("valid group name")).collect()
    }

    #[tokio::test]
    async fn groups_are_created_in_order_and_found_by_name() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let team = SqlTeamRepository::new(pool.clone())
            .initialize(&SlackTeamId("T1".to_owned()), &SlackUserId::new("U1"))
            .await
            .expect("team");
        let repo = SqlGroupRepository::new(pool);

        let created = repo.create_groups(team.id, &names(&["backend", "design"])).await.expect("create");
        assert_eq!(created.len(), 2);

        let listed = repo.list_for_team(team.id).await.expect("list");
        let listed_names: Vec<&str> = listed.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(listed_names, vec!["Backend", "Design"]);

        let design = repo
            .find_by_name(team.id, &GroupName::parse("design").expect("name"))
            .await
            .expect("find")
            .expect("design exists");
        assert_eq!(design.id, created[1].id);
        assert!(repo
            .find_by_name(team.id, &GroupName::parse("ops").expect("name"))
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_or_excess_groups_leave_nothing_behind() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let team = SqlTeamRepository::new(pool.clone())
            .initialize(&SlackTeamId("T1".to_owned()), &SlackUserId::new("U1"))
            .await
            .expect("team");
        let repo = SqlGroupRepository::new(pool);

        let duplicate = repo.create_groups(team.id, &names(&["ops", "Ops"])).await;
        assert!(matches!(duplicate, Err(RepositoryError::Database(_))));
        assert!(repo.list_for_team(team.id).await.expect("list").is_empty());

        let excess = repo.create_groups(team.id, &names(&["a", "b", "c", "d", "e"])).await;
        assert!(matches!(excess, Err(RepositoryError::Constraint(_))));
        assert!(repo.list_for_team(team.id).await.expect("list").is_empty());
    }
}
