use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::info;

use gemification_core::domain::team::{Installation, SlackTeamId};
use gemification_db::Repositories;

use crate::api::SlackApiFactory;
use crate::context::{BotContext, BotError};
use crate::directory::DirectoryCache;
use crate::events::{
    gem_dispatcher, BlockActionEvent, BlockActionService, EventContext, EventDispatcher,
    EventHandlerError, HandlerResult, MessageEvent, MessageService,
};
use crate::service::{GemBot, MessageDisposition};

/// Hex SHA-256 of a bot token, so the registry never holds the credential itself.
pub fn token_fingerprint(token: &SecretString) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.expose_secret().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Default)]
struct TrackedBots {
    teams_by_token: HashMap<String, SlackTeamId>,
    contexts: HashMap<SlackTeamId, BotContext>,
}

/// At most one live bot per credential. Check and insert happen under one write lock.
#[derive(Default)]
pub struct BotConnectionTracker {
    bots: RwLock<TrackedBots>,
}

impl BotConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `ctx` under `fingerprint`; `false` when that credential is already live.
    pub async fn track(&self, fingerprint: String, ctx: BotContext) -> bool {
        let mut bots = self.bots.write().await;
        if bots.teams_by_token.contains_key(&fingerprint) {
            return false;
        }
        bots.teams_by_token.insert(fingerprint, ctx.slack_team.clone());
        bots.contexts.insert(ctx.slack_team.clone(), ctx);
        true
    }

    pub async fn is_tracked(&self, fingerprint: &str) -> bool {
        self.bots.read().await.teams_by_token.contains_key(fingerprint)
    }

    pub async fn context(&self, team: &SlackTeamId) -> Option<BotContext> {
        self.bots.read().await.contexts.get(team).cloned()
    }

    pub async fn len(&self) -> usize {
        self.bots.read().await.teams_by_token.len()
    }
}

/// Owns every installed team's bot and routes inbound events to the right one.
pub struct BotRuntime {
    factory: Arc<dyn SlackApiFactory>,
    repos: Repositories,
    directory: Arc<DirectoryCache>,
    bot: GemBot,
    tracker: BotConnectionTracker,
}

impl BotRuntime {
    pub fn new(
        factory: Arc<dyn SlackApiFactory>,
        repos: Repositories,
        directory: Arc<DirectoryCache>,
        bot: GemBot,
    ) -> Self {
        Self { factory, repos, directory, bot, tracker: BotConnectionTracker::new() }
    }

    pub fn bot(&self) -> &GemBot {
        &self.bot
    }

    pub fn tracker(&self) -> &BotConnectionTracker {
        &self.tracker
    }

    /// Handles a fresh installation. Returns `false` if the token already had a live bot.
    pub async fn create_bot(&self, installation: &Installation) -> Result<bool, BotError> {
        self.repos.teams.save_installation(installation).await?;

        let Some(ctx) = self.connect(installation).await else {
            info!(
                event_name = "bots.connection.already_tracked",
                team_id = %installation.slack_team_id,
                "bot token already has a live connection"
            );
            return Ok(false);
        };

        self.bot.welcome_installation(&ctx, &installation.installer).await?;
        Ok(true)
    }

    /// Reconnects every persisted installation without greeting anyone. Returns the number connected.
    pub async fn restore_installed_teams(&self) -> Result<usize, BotError> {
        let mut restored = 0;
        for installation in self.repos.teams.list_installations().await? {
            if self.connect(&installation).await.is_some() {
                restored += 1;
            }
        }
        info!(event_name = "bots.connection.restored", restored, "restored installed teams");
        Ok(restored)
    }

    async fn connect(&self, installation: &Installation) -> Option<BotContext> {
        let fingerprint = token_fingerprint(&installation.bot_token);
        if self.tracker.is_tracked(&fingerprint).await {
            return None;
        }

        let ctx = BotContext::new(
            installation.slack_team_id.clone(),
            self.factory.connect(&installation.bot_token),
            self.repos.clone(),
            self.directory.clone(),
        );
        if !self.tracker.track(fingerprint, ctx.clone()).await {
            return None;
        }
        info!(
            event_name = "bots.connection.started",
            team_id = %installation.slack_team_id,
            "started bot connection"
        );
        Some(ctx)
    }

    async fn context(&self, team: &SlackTeamId) -> Result<BotContext, EventHandlerError> {
        self.tracker.context(team).await.ok_or_else(|| EventHandlerError::UnknownTeam(team.clone()))
    }
}

#[async_trait]
impl MessageService for BotRuntime {
    async fn handle_message(
        &self,
        team: &SlackTeamId,
        event: &MessageEvent,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let bot_ctx = self.context(team).await?;
        match self.bot.handle_message(&bot_ctx, event).await? {
            MessageDisposition::Ignored => Ok(HandlerResult::Ignored),
            _ => Ok(HandlerResult::Processed),
        }
    }
}

#[async_trait]
impl BlockActionService for BotRuntime {
    async fn handle_block_action(
        &self,
        team: &SlackTeamId,
        event: &BlockActionEvent,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let bot_ctx = self.context(team).await?;
        if self.bot.handle_block_action(&bot_ctx, event).await? {
            Ok(HandlerResult::Processed)
        } else {
            Ok(HandlerResult::Ignored)
        }
    }
}

pub fn gemification_dispatcher(runtime: Arc<BotRuntime>) -> EventDispatcher {
    gem_dispatcher(runtime)
}
