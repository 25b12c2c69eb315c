//! Read-only team reports plus the period reset, each rendered as chat text.

use chrono::Utc;
use tracing::info;

use gemification_core::domain::gem::GemStanding;
use gemification_core::domain::team::Team;
use gemification_core::domain::user::Roster;
use gemification_core::mention::parse_mention;
use gemification_core::reporting::{
    self, GroupMembership, RankedEntry, CLEARED_MESSAGE, INVALID_REASONS_TARGET, LEADERBOARD_LIMIT,
};

use crate::context::{BotContext, BotError};

fn ranked(roster: &Roster, standings: Vec<GemStanding>) -> Vec<RankedEntry> {
    standings
        .into_iter()
        .map(|standing| RankedEntry { name: roster.display_name(&standing.user_id), gems: standing.gems })
        .collect()
}

/// One leaderboard per group, by current gems.
pub async fn leaderboard(ctx: &BotContext, team: &Team) -> Result<Vec<String>, BotError> {
    let groups = ctx.repos.groups.list_for_team(team.id).await?;
    if groups.is_empty() {
        return Ok(Vec::new());
    }

    let roster = ctx.roster().await?;
    let limit = u32::try_from(LEADERBOARD_LIMIT).unwrap_or(u32::MAX);
    let mut boards = Vec::with_capacity(groups.len());
    for group in groups {
        let standings = ctx.repos.users.ranked_current(team.id, group.id, limit).await?;
        boards.push(reporting::leaderboard(&group.name, &ranked(&roster, standings)));
    }
    Ok(boards)
}

/// One all-time board per group, by total gems, without a length cap.
pub async fn all_gems(ctx: &BotContext, team: &Team) -> Result<Vec<String>, BotError> {
    let groups = ctx.repos.groups.list_for_team(team.id).await?;
    if groups.is_empty() {
        return Ok(Vec::new());
    }

    let roster = ctx.roster().await?;
    let mut boards = Vec::with_capacity(groups.len());
    for group in groups {
        let standings = ctx.repos.users.ranked_total(team.id, group.id).await?;
        boards.push(reporting::all_gems(&group.name, &ranked(&roster, standings)));
    }
    Ok(boards)
}

/// Reasons for the member mentioned in `text`, covering the last two periods.
pub async fn reasons(ctx: &BotContext, team: &Team, text: &str) -> Result<String, BotError> {
    let Some(target) = parse_mention(text) else {
        return Ok(INVALID_REASONS_TARGET.to_owned());
    };
    if !ctx.roster().await?.contains(&target) {
        return Ok(INVALID_REASONS_TARGET.to_owned());
    }

    let transactions = ctx.repos.ledger.reasons_for_recent_periods(team.id, &target).await?;
    Ok(reporting::reasons(&target, &transactions))
}

pub async fn team_configuration(ctx: &BotContext, team: &Team) -> Result<String, BotError> {
    let groups = ctx.repos.groups.list_for_team(team.id).await?;
    let mut memberships = Vec::with_capacity(groups.len());
    for group in groups {
        let members = ctx.repos.users.list_group_members(team.id, group.id).await?;
        memberships.push(GroupMembership { group: group.name, members });
    }
    Ok(reporting::team_configuration(&memberships))
}

pub async fn list_admins(ctx: &BotContext, team: &Team) -> Result<String, BotError> {
    let admins = ctx.repos.users.list_admins(team.id).await?;
    Ok(reporting::admin_list(&admins))
}

/// Opens a new scoring period; the store zeroes current gems for the team.
pub async fn clear_gems(ctx: &BotContext, team: &Team) -> Result<String, BotError> {
    let period = ctx.repos.ledger.start_period(team.id, Utc::now()).await?;
    info!(
        event_name = "gems.period.started",
        team_id = %ctx.slack_team,
        period_id = period.id,
        "started new gem period"
    );
    Ok(CLEARED_MESSAGE.to_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use gemification_core::domain::gem::NewGemAward;
    use gemification_core::domain::group::GroupName;
    use gemification_core::domain::user::SlackUserId;
    use gemification_core::Team;

    use super::{all_gems, clear_gems, leaderboard, reasons, team_configuration};
    use crate::context::BotContext;
    use crate::testing::{human, memory_context, RecordingSlackApi};

    async fn seeded() -> (BotContext, Team) {
        let api = Arc::new(RecordingSlackApi::with_members(vec![
            human("U1", "ana"),
            human("U2", "bo"),
            human("U3", "cy"),
        ]));
        let ctx = memory_context("T1", api).await.expect("context");
        let team = ctx
            .repos
            .teams
            .initialize(&ctx.slack_team, &SlackUserId::new("U1"))
            .await
            .expect("team");
        let groups = ctx
            .repos
            .groups
            .create_groups(team.id, &[GroupName::from_stored("Backend"), GroupName::from_stored("Frontend")])
            .await
            .expect("groups");
        for (user, group) in [("U1", &groups[0]), ("U2", &groups[0]), ("U3", &groups[1])] {
            ctx.repos
                .users
                .assign_group(team.id, &SlackUserId::new(user), Some(group.id))
                .await
                .expect("assign");
        }
        (ctx, team)
    }

    async fn award(ctx: &BotContext, team: &Team, receiver: &str, reason: &str) {
        ctx.repos
            .ledger
            .award(&NewGemAward {
                team_id: team.id,
                giver: SlackUserId::new("U1"),
                receiver: SlackUserId::new(receiver),
                reason: reason.to_owned(),
                awarded_at: Utc::now(),
            })
            .await
            .expect("award");
    }

    #[tokio::test]
    async fn leaderboards_rank_each_group_and_report_empty_ones() {
        let (ctx, team) = seeded().await;
        award(&ctx, &team, "U2", "docs").await;
        award(&ctx, &team, "U2", "tests").await;
        award(&ctx, &team, "U1", "review").await;

        let boards = leaderboard(&ctx, &team).await.expect("leaderboard");
        assert_eq!(
            boards,
            vec![
                "Backend Leaderboard:\n>1.) bo 2\n>2.) ana 1".to_owned(),
                "The Frontend leaderboard is empty. Try giving someone a :gem:!".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn clearing_resets_current_gems_but_keeps_totals() {
        let (ctx, team) = seeded().await;
        award(&ctx, &team, "U3", "design").await;

        let reply = clear_gems(&ctx, &team).await.expect("clear");
        assert!(reply.starts_with("The leaderboard was cleared successfully."));

        let boards = leaderboard(&ctx, &team).await.expect("leaderboard");
        assert_eq!(boards[1], "The Frontend leaderboard is empty. Try giving someone a :gem:!");
        let totals = all_gems(&ctx, &team).await.expect("all gems");
        assert_eq!(totals[1], "Frontend All Gems Leaderboard:\n>1.) cy 1");
    }

    #[tokio::test]
    async fn reasons_require_a_known_member() {
        let (ctx, team) = seeded().await;
        award(&ctx, &team, "U2", "pairing on the migration").await;

        let invalid = reasons(&ctx, &team, "get reasons <@U9>").await.expect("reasons");
        assert!(invalid.starts_with("The username you entered isn't valid."));
        let missing = reasons(&ctx, &team, "get reasons").await.expect("reasons");
        assert_eq!(missing, invalid);

        let report = reasons(&ctx, &team, "get reasons <@U2>").await.expect("reasons");
        assert!(report.contains(">1.) pairing on the migration\n>\t-given on "));
    }

    #[tokio::test]
    async fn configuration_lists_groups_and_their_members() {
        let (ctx, team) = seeded().await;
        let report = team_configuration(&ctx, &team).await.expect("configuration");

        assert!(report.contains("Your team has 2 groups. They are:\n>1.) Backend\n>2.) Frontend"));
        assert!(report.contains("Users in Backend group:\n><@U1>\n><@U2>"));
        assert!(report.contains("Users in Frontend group:\n><@U3>"));
    }
}
