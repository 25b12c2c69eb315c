//! In-process stand-in for the Slack Web API that records every outbound call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use gemification_core::domain::team::SlackTeamId;
use gemification_core::domain::user::{Member, SlackUserId};
use gemification_db::{connect_with_settings, migrations, Repositories};

use crate::api::{SlackApi, SlackApiError};
use crate::blocks::MessageTemplate;
use crate::context::BotContext;
use crate::directory::DirectoryCache;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: String,
    pub message: MessageTemplate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddedReaction {
    pub channel: String,
    pub timestamp: String,
    pub name: String,
}

#[derive(Default)]
struct RecordingState {
    members: Vec<Member>,
    channel_members: HashMap<String, Vec<SlackUserId>>,
    sent: Vec<SentMessage>,
    reactions: Vec<AddedReaction>,
    member_list_calls: usize,
    fail_member_list: bool,
}

#[derive(Default)]
pub struct RecordingSlackApi {
    state: Mutex<RecordingState>,
}

/// An active, non-bot roster entry.
pub fn human(id: &str, name: &str) -> Member {
    Member {
        id: SlackUserId::new(id),
        name: name.to_owned(),
        real_name: None,
        is_bot: false,
        deleted: false,
    }
}

/// A context for `team` over a fresh in-memory database with the schema applied.
pub async fn memory_context(
    team: &str,
    api: Arc<RecordingSlackApi>,
) -> anyhow::Result<BotContext> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await?;
    migrations::run_pending(&pool).await?;
    Ok(BotContext::new(
        SlackTeamId(team.to_owned()),
        api,
        Repositories::sql(pool),
        Arc::new(DirectoryCache::default()),
    ))
}

/// Channel id the fake hands out for a direct conversation with `user`.
pub fn direct_channel(user: &SlackUserId) -> String {
    format!("D{}", user.as_str())
}

impl RecordingSlackApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members(members: Vec<Member>) -> Self {
        Self { state: Mutex::new(RecordingState { members, ..RecordingState::default() }) }
    }

    pub async fn set_members(&self, members: Vec<Member>) {
        self.state.lock().await.members = members;
    }

    pub async fn set_channel_members(&self, channel: &str, members: Vec<SlackUserId>) {
        self.state.lock().await.channel_members.insert(channel.to_owned(), members);
    }

    pub async fn fail_member_list(&self, fail: bool) {
        self.state.lock().await.fail_member_list = fail;
    }

    pub async fn member_list_calls(&self) -> usize {
        self.state.lock().await.member_list_calls
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().await.sent.clone()
    }

    /// Fallback texts posted to `channel`, in order.
    pub async fn texts_in(&self, channel: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .sent
            .iter()
            .filter(|sent| sent.channel == channel)
            .map(|sent| sent.message.fallback_text.clone())
            .collect()
    }

    /// Fallback texts sent privately to `user`.
    pub async fn texts_to(&self, user: &SlackUserId) -> Vec<String> {
        self.texts_in(&direct_channel(user)).await
    }

    pub async fn clear_sent(&self) {
        self.state.lock().await.sent.clear();
    }

    pub async fn reactions(&self) -> Vec<AddedReaction> {
        self.state.lock().await.reactions.clone()
    }
}

#[async_trait]
impl SlackApi for RecordingSlackApi {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        self.state
            .lock()
            .await
            .sent
            .push(SentMessage { channel: channel.to_owned(), message: message.clone() });
        Ok(())
    }

    async fn open_direct_message(&self, user: &SlackUserId) -> Result<String, SlackApiError> {
        Ok(direct_channel(user))
    }

    async fn list_team_members(&self) -> Result<Vec<Member>, SlackApiError> {
        let mut state = self.state.lock().await;
        state.member_list_calls += 1;
        if state.fail_member_list {
            return Err(SlackApiError::Api {
                method: "users.list",
                error: "ratelimited".to_owned(),
            });
        }
        Ok(state.members.clone())
    }

    async fn list_channel_members(
        &self,
        channel: &str,
    ) -> Result<Vec<SlackUserId>, SlackApiError> {
        Ok(self.state.lock().await.channel_members.get(channel).cloned().unwrap_or_default())
    }

    async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        self.state.lock().await.reactions.push(AddedReaction {
            channel: channel.to_owned(),
            timestamp: timestamp.to_owned(),
            name: name.to_owned(),
        });
        Ok(())
    }
}
