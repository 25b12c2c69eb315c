use std::sync::Arc;

use thiserror::Error;

use gemification_core::domain::team::{SlackTeamId, Team};
use gemification_core::domain::user::{Roster, SlackUserId};
use gemification_db::{Repositories, RepositoryError};

use crate::api::{SlackApi, SlackApiError};
use crate::blocks::{plain_message, MessageTemplate};
use crate::directory::DirectoryCache;

/// Infrastructure faults. Soft outcomes (bad input, missing rights) are replies, never errors.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Slack(#[from] SlackApiError),
    #[error("team `{0}` has no installation record")]
    TeamNotInstalled(SlackTeamId),
}

/// Everything a handler needs to act on behalf of one installed team.
#[derive(Clone)]
pub struct BotContext {
    pub slack_team: SlackTeamId,
    pub api: Arc<dyn SlackApi>,
    pub repos: Repositories,
    pub directory: Arc<DirectoryCache>,
}

impl BotContext {
    pub fn new(
        slack_team: SlackTeamId,
        api: Arc<dyn SlackApi>,
        repos: Repositories,
        directory: Arc<DirectoryCache>,
    ) -> Self {
        Self { slack_team, api, repos, directory }
    }

    pub async fn team(&self) -> Result<Option<Team>, BotError> {
        Ok(self.repos.teams.find_by_slack_id(&self.slack_team).await?)
    }

    pub async fn require_team(&self) -> Result<Team, BotError> {
        self.team().await?.ok_or_else(|| BotError::TeamNotInstalled(self.slack_team.clone()))
    }

    pub async fn roster(&self) -> Result<Arc<Roster>, BotError> {
        Ok(self.directory.roster(&self.slack_team, self.api.as_ref()).await?)
    }

    pub async fn post(&self, channel: &str, text: impl Into<String>) -> Result<(), BotError> {
        self.post_message(channel, &plain_message(text)).await
    }

    pub async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), BotError> {
        Ok(self.api.post_message(channel, message).await?)
    }

    /// Sends `text` in the private conversation with `user`.
    pub async fn tell(&self, user: &SlackUserId, text: impl Into<String>) -> Result<(), BotError> {
        self.tell_message(user, &plain_message(text)).await
    }

    pub async fn tell_message(
        &self,
        user: &SlackUserId,
        message: &MessageTemplate,
    ) -> Result<(), BotError> {
        let channel = self.api.open_direct_message(user).await?;
        self.post_message(&channel, message).await
    }
}
