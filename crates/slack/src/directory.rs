use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use gemification_core::domain::team::SlackTeamId;
use gemification_core::domain::user::Roster;

use crate::api::{SlackApi, SlackApiError};

pub const DEFAULT_ROSTER_TTL: Duration = Duration::from_secs(60);

struct RosterSnapshot {
    roster: Arc<Roster>,
    fetched_at: Instant,
}

/// Per-team member roster, refreshed from Slack once the snapshot is older than the TTL.
///
/// Concurrent misses for the same team may each refresh; the last writer wins. A failed
/// refresh is returned to the caller and the stale snapshot is not served.
pub struct DirectoryCache {
    ttl: Duration,
    snapshots: RwLock<HashMap<SlackTeamId, RosterSnapshot>>,
}

impl Default for DirectoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_ROSTER_TTL)
    }
}

impl DirectoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, snapshots: RwLock::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn roster(
        &self,
        team: &SlackTeamId,
        api: &dyn SlackApi,
    ) -> Result<Arc<Roster>, SlackApiError> {
        if let Some(snapshot) = self.snapshots.read().await.get(team) {
            if snapshot.fetched_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&snapshot.roster));
            }
        }

        let roster = Arc::new(Roster::new(api.list_team_members().await?));
        debug!(
            event_name = "directory.roster.refreshed",
            team_id = %team,
            members = roster.len(),
            "refreshed team roster"
        );
        self.snapshots.write().await.insert(
            team.clone(),
            RosterSnapshot { roster: Arc::clone(&roster), fetched_at: Instant::now() },
        );
        Ok(roster)
    }

    pub async fn invalidate(&self, team: &SlackTeamId) {
        self.snapshots.write().await.remove(team);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gemification_core::domain::team::SlackTeamId;
    use gemification_core::domain::user::Member;

    use super::DirectoryCache;
    use crate::testing::{human, RecordingSlackApi};

    fn member(id: &str) -> Member {
        human(id, &id.to_lowercase())
    }

    #[tokio::test(start_paused = true)]
    async fn lookups_within_ttl_share_one_fetch() {
        let api = RecordingSlackApi::with_members(vec![member("U1")]);
        let cache = DirectoryCache::new(Duration::from_secs(60));
        let team = SlackTeamId("T1".to_owned());

        let first = cache.roster(&team, &api).await.expect("first lookup");
        api.set_members(vec![member("U1"), member("U2")]).await;
        tokio::time::advance(Duration::from_secs(59)).await;
        let second = cache.roster(&team, &api).await.expect("second lookup");

        assert_eq!(first, second);
        assert_eq!(api.member_list_calls().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_snapshot_triggers_exactly_one_refresh() {
        let api = RecordingSlackApi::with_members(vec![member("U1")]);
        let cache = DirectoryCache::new(Duration::from_secs(60));
        let team = SlackTeamId("T1".to_owned());

        cache.roster(&team, &api).await.expect("warm cache");
        api.set_members(vec![member("U1"), member("U2")]).await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let refreshed = cache.roster(&team, &api).await.expect("refresh");
        let again = cache.roster(&team, &api).await.expect("cached again");
        assert_eq!(refreshed.len(), 2);
        assert_eq!(again.len(), 2);
        assert_eq!(api.member_list_calls().await, 2);
    }

    #[tokio::test]
    async fn teams_are_cached_independently_and_failures_propagate() {
        let api = RecordingSlackApi::with_members(vec![member("U1")]);
        let cache = DirectoryCache::default();

        cache.roster(&SlackTeamId("T1".to_owned()), &api).await.expect("team one");
        api.fail_member_list(true).await;
        let second_team = cache.roster(&SlackTeamId("T2".to_owned()), &api).await;
        assert!(second_team.is_err());

        let cached = cache.roster(&SlackTeamId("T1".to_owned()), &api).await;
        assert!(cached.is_ok());

        cache.invalidate(&SlackTeamId("T1".to_owned())).await;
        assert!(cache.roster(&SlackTeamId("T1".to_owned()), &api).await.is_err());
    }
}
