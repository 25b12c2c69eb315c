use std::sync::Arc;

use tracing::{info, warn};

use gemification_core::config::ReactionConfig;
use gemification_core::domain::team::Team;
use gemification_core::domain::user::SlackUserId;
use gemification_core::flows::{DialogueStart, Notice};

use crate::awards::process_gem_statement;
use crate::blocks::parse_choice_action;
use crate::commands::{classify, help_text, Command, MessageScope, UNCONFIGURED_MESSAGE};
use crate::configurator::{team_groups, Configurator};
use crate::context::{BotContext, BotError};
use crate::events::{BlockActionEvent, MessageEvent};
use crate::guard::{Access, AuthorizationGuard};
use crate::reports;

/// Decorative reaction added to one member's otherwise unmatched messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EasterEgg {
    pub user: SlackUserId,
    pub emoji: String,
}

impl EasterEgg {
    pub fn from_config(config: &ReactionConfig) -> Option<Self> {
        let user = config.special_user_id.as_deref()?.trim();
        if user.is_empty() {
            return None;
        }
        Some(Self { user: SlackUserId::new(user), emoji: config.emoji.clone() })
    }
}

/// What became of one inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageDisposition {
    Dialogue,
    Executed(Command),
    Denied(Command),
    Unconfigured(Command),
    Reacted,
    Ignored,
}

/// Routes messages and button clicks of every installed team.
pub struct GemBot {
    configurator: Arc<Configurator>,
    easter_egg: Option<EasterEgg>,
}

impl GemBot {
    pub fn new(configurator: Arc<Configurator>, easter_egg: Option<EasterEgg>) -> Self {
        Self { configurator, easter_egg }
    }

    pub fn configurator(&self) -> &Arc<Configurator> {
        &self.configurator
    }

    pub async fn handle_message(
        &self,
        ctx: &BotContext,
        event: &MessageEvent,
    ) -> Result<MessageDisposition, BotError> {
        if event.bot_id.is_some() {
            return Ok(MessageDisposition::Ignored);
        }
        let Some(team) = ctx.team().await? else {
            warn!(
                event_name = "commands.unknown_team",
                team_id = %ctx.slack_team,
                user_id = %event.user_id,
                "message for a team without a team record"
            );
            return Ok(MessageDisposition::Ignored);
        };

        if event.scope == MessageScope::DirectMessage
            && self.configurator.handle_text(ctx, &team, &event.user_id, &event.text).await?
        {
            return Ok(MessageDisposition::Dialogue);
        }

        let Some(command) = classify(event.scope, &event.text) else {
            return self.react(ctx, event).await;
        };

        let guard = AuthorizationGuard::new(ctx.repos.users.clone());
        let disposition = match guard.check(team.id, &event.user_id, command.requirement()).await? {
            Access::Unconfigured => {
                ctx.tell(&event.user_id, UNCONFIGURED_MESSAGE).await?;
                MessageDisposition::Unconfigured(command)
            }
            Access::NotAdmin => {
                if let Some(denial) = command.denial_message() {
                    ctx.post(&event.channel_id, denial).await?;
                }
                MessageDisposition::Denied(command)
            }
            Access::Granted => {
                self.execute(ctx, &team, command, event).await?;
                MessageDisposition::Executed(command)
            }
        };

        info!(
            event_name = "commands.dispatched",
            team_id = %ctx.slack_team,
            user_id = %event.user_id,
            command = command.as_str(),
            scope = event.scope.as_str(),
            disposition = ?disposition,
            "handled command"
        );
        Ok(disposition)
    }

    async fn execute(
        &self,
        ctx: &BotContext,
        team: &Team,
        command: Command,
        event: &MessageEvent,
    ) -> Result<(), BotError> {
        let user = &event.user_id;
        let channel = event.channel_id.as_str();
        match command {
            Command::AwardGem => {
                process_gem_statement(ctx, team, user, channel, &event.text).await?;
            }
            Command::Leaderboard => {
                for board in reports::leaderboard(ctx, team).await? {
                    ctx.post(channel, board).await?;
                }
            }
            Command::AllGems => {
                for board in reports::all_gems(ctx, team).await? {
                    ctx.post(channel, board).await?;
                }
            }
            Command::ClearGems => ctx.post(channel, reports::clear_gems(ctx, team).await?).await?,
            Command::ListAdmins => ctx.post(channel, reports::list_admins(ctx, team).await?).await?,
            Command::GetReasons => {
                ctx.post(channel, reports::reasons(ctx, team, &event.text).await?).await?
            }
            Command::TeamConfiguration => {
                ctx.post(channel, reports::team_configuration(ctx, team).await?).await?
            }
            Command::AddAdmin => {
                self.configurator.start(ctx, team, user, channel, DialogueStart::AddAdmin).await?;
            }
            Command::RemoveAdmin => {
                self.configurator.start(ctx, team, user, channel, DialogueStart::RemoveAdmin).await?;
            }
            Command::ReconfigureUser => {
                let groups = team_groups(ctx, team).await?;
                self.configurator
                    .start(ctx, team, user, channel, DialogueStart::Reconfigure { groups })
                    .await?;
            }
            Command::ConfigureTeam => {
                let start = bootstrap_start(ctx, team).await?;
                self.configurator.start(ctx, team, user, channel, start).await?;
            }
            Command::Help => {
                let guard = AuthorizationGuard::new(ctx.repos.users.clone());
                let is_admin = guard.is_admin(team.id, user).await?;
                ctx.post(channel, help_text(is_admin)).await?;
            }
        }
        Ok(())
    }

    async fn react(
        &self,
        ctx: &BotContext,
        event: &MessageEvent,
    ) -> Result<MessageDisposition, BotError> {
        match &self.easter_egg {
            Some(egg) if egg.user == event.user_id => {
                ctx.api.add_reaction(&event.channel_id, &event.ts, &egg.emoji).await?;
                Ok(MessageDisposition::Reacted)
            }
            _ => Ok(MessageDisposition::Ignored),
        }
    }

    /// Routes a dialogue button click. Returns `false` for actions this bot does not own.
    pub async fn handle_block_action(
        &self,
        ctx: &BotContext,
        event: &BlockActionEvent,
    ) -> Result<bool, BotError> {
        let Some(action) = parse_choice_action(&event.action_id, event.value.as_deref()) else {
            return Ok(false);
        };
        let team = ctx.require_team().await?;
        self.configurator
            .handle_choice(ctx, &team, &event.user_id, &event.channel_id, &action)
            .await?;
        Ok(true)
    }

    /// Greets the installer, seeds the team and opens the bootstrap dialogue in a direct message.
    pub async fn welcome_installation(
        &self,
        ctx: &BotContext,
        installer: &SlackUserId,
    ) -> Result<(), BotError> {
        let channel = ctx.api.open_direct_message(installer).await?;
        ctx.post(&channel, Notice::Welcome.text()).await?;

        let team = ctx.repos.teams.initialize(&ctx.slack_team, installer).await?;
        let start = bootstrap_start(ctx, &team).await?;
        self.configurator.start(ctx, &team, installer, &channel, start).await?;
        Ok(())
    }
}

/// Groups saved by an abandoned bootstrap carry over into the next attempt.
async fn bootstrap_start(ctx: &BotContext, team: &Team) -> Result<DialogueStart, BotError> {
    Ok(DialogueStart::TeamBootstrap {
        already_configured: team.is_configured,
        existing_groups: team_groups(ctx, team).await?,
    })
}
