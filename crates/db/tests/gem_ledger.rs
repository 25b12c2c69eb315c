use chrono::{Duration, TimeZone, Utc};

use gemification_core::domain::gem::NewGemAward;
use gemification_core::domain::group::GroupName;
use gemification_core::domain::team::SlackTeamId;
use gemification_core::domain::user::SlackUserId;
use gemification_db::{connect_with_settings, migrations, Repositories};

type LedgerTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

async fn repositories() -> LedgerTestResult<Repositories> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.map_err(|e| e.to_string())?;
    migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;
    Ok(Repositories::sql(pool))
}

#[tokio::test]
async fn team_lifecycle_from_install_to_second_period() -> LedgerTestResult {
    let repos = repositories().await?;
    let admin = SlackUserId::new("UADMIN");
    let alice = SlackUserId::new("UALICE");
    let bob = SlackUserId::new("UBOB");

    let team = repos
        .teams
        .initialize(&SlackTeamId("T1".to_owned()), &admin)
        .await
        .map_err(|e| e.to_string())?;
    let names = ["backend", "design"]
        .iter()
        .map(|name| GroupName::parse(name).map_err(|e| e.to_string()))
        .collect::<LedgerTestResult<Vec<_>>>()?;
    let groups = repos.groups.create_groups(team.id, &names).await.map_err(|e| e.to_string())?;
    for user in [&admin, &alice, &bob] {
        repos
            .users
            .assign_group(team.id, user, Some(groups[0].id))
            .await
            .map_err(|e| e.to_string())?;
    }
    repos.teams.mark_configured(team.id).await.map_err(|e| e.to_string())?;

    let start = Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).single().ok_or("valid start time")?;
    for (offset, (giver, receiver, reason)) in
        [(&admin, &alice, "demo"), (&bob, &alice, "review"), (&alice, &bob, "pairing")]
            .into_iter()
            .enumerate()
    {
        let offset = i64::try_from(offset).map_err(|e| e.to_string())?;
        repos
            .ledger
            .award(&NewGemAward {
                team_id: team.id,
                giver: giver.clone(),
                receiver: receiver.clone(),
                reason: reason.to_owned(),
                awarded_at: start + Duration::minutes(offset),
            })
            .await
            .map_err(|e| e.to_string())?;
    }

    let board = repos.users.ranked_current(team.id, groups[0].id, 10).await.map_err(|e| e.to_string())?;
    let board: Vec<(String, i64)> =
        board.into_iter().map(|standing| (standing.user_id.0, standing.gems)).collect();
    require_eq!(board, vec![("UALICE".to_owned(), 2), ("UBOB".to_owned(), 1)]);

    repos
        .ledger
        .start_period(team.id, start + Duration::hours(1))
        .await
        .map_err(|e| e.to_string())?;
    let after_clear =
        repos.users.ranked_current(team.id, groups[0].id, 10).await.map_err(|e| e.to_string())?;
    require!(after_clear.is_empty(), "clear should empty the leaderboard, got {after_clear:?}");

    let totals = repos.users.ranked_total(team.id, groups[0].id).await.map_err(|e| e.to_string())?;
    require_eq!(totals.len(), 2);

    let reasons =
        repos.ledger.reasons_for_recent_periods(team.id, &alice).await.map_err(|e| e.to_string())?;
    let reasons: Vec<String> = reasons.into_iter().map(|t| t.reason).collect();
    require_eq!(reasons, vec!["review".to_owned(), "demo".to_owned()]);

    Ok(())
}

#[tokio::test]
async fn teams_never_see_each_others_data() -> LedgerTestResult {
    let repos = repositories().await?;
    let first = repos
        .teams
        .initialize(&SlackTeamId("T1".to_owned()), &SlackUserId::new("U1"))
        .await
        .map_err(|e| e.to_string())?;
    let second = repos
        .teams
        .initialize(&SlackTeamId("T2".to_owned()), &SlackUserId::new("U1"))
        .await
        .map_err(|e| e.to_string())?;
    require!(first.id != second.id, "teams must get distinct ids");

    let ops = GroupName::parse("ops").map_err(|e| e.to_string())?;
    repos.groups.create_groups(first.id, &[ops.clone()]).await.map_err(|e| e.to_string())?;
    repos.groups.create_groups(second.id, &[ops]).await.map_err(|e| e.to_string())?;

    repos
        .ledger
        .start_period(first.id, Utc::now())
        .await
        .map_err(|e| e.to_string())?;

    require_eq!(repos.users.count_admins(first.id).await.map_err(|e| e.to_string())?, 1);
    require_eq!(repos.users.count_admins(second.id).await.map_err(|e| e.to_string())?, 1);
    require_eq!(repos.groups.list_for_team(second.id).await.map_err(|e| e.to_string())?.len(), 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_awards_to_one_receiver_are_all_counted() -> LedgerTestResult {
    const AWARDS: usize = 24;

    let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("ledger.db").display());
    let pool = connect_with_settings(&url, 4, 30).await.map_err(|e| e.to_string())?;
    migrations::run_pending(&pool).await.map_err(|e| e.to_string())?;
    let repos = Repositories::sql(pool.clone());

    let receiver = SlackUserId::new("URECEIVER");
    let team = repos
        .teams
        .initialize(&SlackTeamId("T1".to_owned()), &SlackUserId::new("UADMIN"))
        .await
        .map_err(|e| e.to_string())?;
    repos.users.ensure(team.id, &receiver).await.map_err(|e| e.to_string())?;

    let mut handles = Vec::with_capacity(AWARDS);
    for giver in 0..AWARDS {
        let repos = repos.clone();
        let award = NewGemAward {
            team_id: team.id,
            giver: SlackUserId::new(format!("UGIVER{giver}")),
            receiver: receiver.clone(),
            reason: format!("help number {giver}"),
            awarded_at: Utc::now(),
        };
        handles.push(tokio::spawn(async move { repos.ledger.award(&award).await }));
    }
    for handle in handles {
        handle.await.map_err(|e| e.to_string())?.map_err(|e| e.to_string())?;
    }

    let stored = repos
        .users
        .find(team.id, &receiver)
        .await
        .map_err(|e| e.to_string())?
        .ok_or("receiver row")?;
    let expected = i64::try_from(AWARDS).map_err(|e| e.to_string())?;
    require_eq!((stored.current_gems, stored.total_gems), (expected, expected));

    let rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM gem_transaction WHERE receiver_user_id = ?")
            .bind(&receiver.0)
            .fetch_one(&pool)
            .await
            .map_err(|e| e.to_string())?;
    require_eq!(rows, expected);

    pool.close().await;
    Ok(())
}
