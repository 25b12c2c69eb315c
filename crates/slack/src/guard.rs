use std::sync::Arc;

use gemification_core::domain::team::TeamId;
use gemification_core::domain::user::SlackUserId;
use gemification_db::{RepositoryError, UserGemRepository};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    Configured,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Granted,
    Unconfigured,
    NotAdmin,
}

/// Configured and admin checks against the `user_gem` table of one team.
#[derive(Clone)]
pub struct AuthorizationGuard {
    users: Arc<dyn UserGemRepository>,
}

impl AuthorizationGuard {
    pub fn new(users: Arc<dyn UserGemRepository>) -> Self {
        Self { users }
    }

    pub async fn is_configured(
        &self,
        team_id: TeamId,
        user: &SlackUserId,
    ) -> Result<bool, RepositoryError> {
        Ok(self.users.find(team_id, user).await?.is_some())
    }

    /// A missing row reads as "not admin".
    pub async fn is_admin(
        &self,
        team_id: TeamId,
        user: &SlackUserId,
    ) -> Result<bool, RepositoryError> {
        Ok(self.users.find(team_id, user).await?.is_some_and(|row| row.is_admin))
    }

    /// Configuration is checked first; admin rights only matter for configured users.
    pub async fn check(
        &self,
        team_id: TeamId,
        user: &SlackUserId,
        requirement: Requirement,
    ) -> Result<Access, RepositoryError> {
        let Some(row) = self.users.find(team_id, user).await? else {
            return Ok(Access::Unconfigured);
        };
        Ok(match requirement {
            Requirement::Configured => Access::Granted,
            Requirement::Admin if row.is_admin => Access::Granted,
            Requirement::Admin => Access::NotAdmin,
        })
    }
}

#[cfg(test)]
mod tests {
    use gemification_core::domain::team::SlackTeamId;
    use gemification_core::domain::user::SlackUserId;
    use gemification_db::{connect_with_settings, migrations, Repositories};

    use super::{Access, AuthorizationGuard, Requirement};

    #[tokio::test]
    async fn unconfigured_users_are_stopped_before_the_admin_check() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");
        let repos = Repositories::sql(pool);
        let installer = SlackUserId::new("U1");
        let team = repos
            .teams
            .initialize(&SlackTeamId("T1".to_owned()), &installer)
            .await
            .expect("team");
        repos.users.ensure(team.id, &SlackUserId::new("U2")).await.expect("member");
        let guard = AuthorizationGuard::new(repos.users.clone());

        let stranger = SlackUserId::new("U3");
        assert_eq!(
            guard.check(team.id, &stranger, Requirement::Admin).await.expect("check"),
            Access::Unconfigured
        );
        assert!(!guard.is_admin(team.id, &stranger).await.expect("is_admin"));

        let member = SlackUserId::new("U2");
        assert_eq!(
            guard.check(team.id, &member, Requirement::Configured).await.expect("check"),
            Access::Granted
        );
        assert_eq!(
            guard.check(team.id, &member, Requirement::Admin).await.expect("check"),
            Access::NotAdmin
        );

        assert!(guard.is_configured(team.id, &installer).await.expect("configured"));
        assert_eq!(
            guard.check(team.id, &installer, Requirement::Admin).await.expect("check"),
            Access::Granted
        );
    }
}
