use chrono::Utc;
use tracing::info;

use gemification_core::award::{
    evaluate, giver_confirmation, receiver_notification, rejection_message, AwardFacts,
    AwardVerdict, AwardViolation, GemStatement, SELF_AWARD_MESSAGE,
};
use gemification_core::domain::gem::{GemTransaction, NewGemAward};
use gemification_core::domain::team::Team;
use gemification_core::domain::user::SlackUserId;

use crate::context::{BotContext, BotError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AwardOutcome {
    Awarded(GemTransaction),
    Rejected(Vec<AwardViolation>),
    SelfAward,
}

impl AwardOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Awarded(_) => "awarded",
            Self::Rejected(_) => "rejected",
            Self::SelfAward => "self_award",
        }
    }
}

/// Judges a `:gem:` statement posted in `channel` and records it when valid.
///
/// Every outcome is reported privately to the giver; the receiver also hears about a success.
pub async fn process_gem_statement(
    ctx: &BotContext,
    team: &Team,
    giver: &SlackUserId,
    channel: &str,
    text: &str,
) -> Result<AwardOutcome, BotError> {
    let statement = GemStatement::parse(giver.clone(), text);
    let facts = match &statement.receiver {
        Some(receiver) => AwardFacts {
            receiver_in_channel: ctx.api.list_channel_members(channel).await?.contains(receiver),
            receiver_configured: ctx.repos.users.find(team.id, receiver).await?.is_some(),
        },
        None => AwardFacts::default(),
    };

    let outcome = match evaluate(&statement, facts) {
        AwardVerdict::Rejected(violations) => {
            ctx.tell(giver, rejection_message(giver, &violations)).await?;
            AwardOutcome::Rejected(violations)
        }
        AwardVerdict::SelfAward => {
            ctx.tell(giver, SELF_AWARD_MESSAGE).await?;
            AwardOutcome::SelfAward
        }
        AwardVerdict::Accepted(award) => {
            let roster = ctx.roster().await?;
            let giver_name = roster.display_name(giver);
            let receiver_name = roster.display_name(&award.receiver);

            let transaction = ctx
                .repos
                .ledger
                .award(&NewGemAward {
                    team_id: team.id,
                    giver: giver.clone(),
                    receiver: award.receiver.clone(),
                    reason: award.reason,
                    awarded_at: Utc::now(),
                })
                .await?;

            ctx.tell(giver, giver_confirmation(&giver_name, &receiver_name)).await?;
            ctx.tell(&award.receiver, receiver_notification(&giver_name)).await?;
            AwardOutcome::Awarded(transaction)
        }
    };

    info!(
        event_name = "gems.award.processed",
        team_id = %ctx.slack_team,
        user_id = %giver,
        channel_id = channel,
        outcome = outcome.as_str(),
        "processed gem statement"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gemification_core::award::AwardViolation;
    use gemification_core::domain::user::SlackUserId;

    use super::{process_gem_statement, AwardOutcome};
    use crate::testing::{human, memory_context, RecordingSlackApi};

    async fn seeded() -> (Arc<RecordingSlackApi>, crate::context::BotContext, gemification_core::Team)
    {
        let api = Arc::new(RecordingSlackApi::with_members(vec![
            human("U1", "ana"),
            human("U2", "bo"),
            human("U3", "cy"),
        ]));
        api.set_channel_members(
            "C1",
            vec![SlackUserId::new("U1"), SlackUserId::new("U2"), SlackUserId::new("U3")],
        )
        .await;
        let ctx = memory_context("T1", api.clone()).await.expect("context");
        let team = ctx
            .repos
            .teams
            .initialize(&ctx.slack_team, &SlackUserId::new("U1"))
            .await
            .expect("team");
        ctx.repos.users.ensure(team.id, &SlackUserId::new("U2")).await.expect("bo");
        (api, ctx, team)
    }

    #[tokio::test]
    async fn valid_statement_increments_both_counters_and_notifies_privately() {
        let (api, ctx, team) = seeded().await;
        let giver = SlackUserId::new("U1");
        let receiver = SlackUserId::new("U2");

        let outcome = process_gem_statement(
            &ctx,
            &team,
            &giver,
            "C1",
            ":gem: <@U2> for helping with the demo",
        )
        .await
        .expect("award");

        let AwardOutcome::Awarded(transaction) = outcome else {
            panic!("expected an award, got {outcome:?}");
        };
        assert_eq!(transaction.reason, "helping with the demo");
        let row = ctx.repos.users.find(team.id, &receiver).await.expect("query").expect("row");
        assert_eq!((row.current_gems, row.total_gems), (1, 1));

        assert_eq!(api.texts_to(&giver).await, vec!["ana, you gave a gem to bo!"]);
        assert_eq!(api.texts_to(&receiver).await, vec!["You have received a gem from ana!"]);
        assert!(api.texts_in("C1").await.is_empty());
    }

    #[tokio::test]
    async fn every_violation_is_listed_and_nothing_is_recorded() {
        let (api, ctx, team) = seeded().await;
        let giver = SlackUserId::new("U1");

        let outcome = process_gem_statement(&ctx, &team, &giver, "C1", ":gem: <@U3>")
            .await
            .expect("processed");

        assert_eq!(
            outcome,
            AwardOutcome::Rejected(vec![
                AwardViolation::MissingReason,
                AwardViolation::ReceiverNotConfigured
            ])
        );
        let message = api.texts_to(&giver).await.pop().expect("rejection sent");
        assert!(message.contains("- you didn't include a reason statement"));
        assert!(message.contains("isn't configured with Gemification"));
        assert!(ctx.repos.users.find(team.id, &SlackUserId::new("U3")).await.expect("q").is_none());
    }

    #[tokio::test]
    async fn receivers_outside_the_channel_are_rejected() {
        let (api, ctx, team) = seeded().await;
        api.set_channel_members("C2", vec![SlackUserId::new("U1")]).await;

        let outcome =
            process_gem_statement(&ctx, &team, &SlackUserId::new("U1"), "C2", ":gem: <@U2> for docs")
                .await
                .expect("processed");

        assert_eq!(outcome, AwardOutcome::Rejected(vec![AwardViolation::InvalidReceiver]));
    }

    #[tokio::test]
    async fn self_awards_get_their_own_reply() {
        let (api, ctx, team) = seeded().await;
        let giver = SlackUserId::new("U1");

        let outcome =
            process_gem_statement(&ctx, &team, &giver, "C1", ":gem: <@U1> for being me")
                .await
                .expect("processed");

        assert_eq!(outcome, AwardOutcome::SelfAward);
        assert!(api.texts_to(&giver).await[0].starts_with("Nice try, jackwagon."));
        let row = ctx.repos.users.find(team.id, &giver).await.expect("q").expect("row");
        assert_eq!(row.total_gems, 0);
    }
}
