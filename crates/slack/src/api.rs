use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gemification_core::domain::user::{Member, SlackUserId};

use crate::blocks::{Block, MessageTemplate};

const PAGE_LIMIT: u32 = 200;

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack method `{method}` returned http status {status}")]
    Status { method: &'static str, status: u16 },
    #[error("slack method `{method}` failed: {error}")]
    Api { method: &'static str, error: String },
    #[error("slack method `{method}` returned an unreadable body: {detail}")]
    Decode { method: &'static str, detail: String },
}

/// Chat collaborator for one installed team; every call runs with that team's bot token.
#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError>;

    /// Opens (or reuses) the direct-message channel with `user` and returns its id.
    async fn open_direct_message(&self, user: &SlackUserId) -> Result<String, SlackApiError>;

    async fn list_team_members(&self) -> Result<Vec<Member>, SlackApiError>;

    async fn list_channel_members(&self, channel: &str)
        -> Result<Vec<SlackUserId>, SlackApiError>;

    async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), SlackApiError>;
}

/// Builds the per-team client once an installation hands over a bot token.
pub trait SlackApiFactory: Send + Sync {
    fn connect(&self, bot_token: &SecretString) -> Arc<dyn SlackApi>;
}

pub struct SlackWebClient {
    http: Client,
    base_url: String,
    bot_token: SecretString,
}

impl SlackWebClient {
    pub fn new(http: Client, base_url: impl Into<String>, bot_token: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url, bot_token }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call_post<B, T>(&self, method: &'static str, body: &B) -> Result<T, SlackApiError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await?;
        decode_response(method, response).await
    }

    async fn call_get<T>(
        &self,
        method: &'static str,
        query: &[(&str, String)],
    ) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(self.url(method))
            .bearer_auth(self.bot_token.expose_secret())
            .query(query)
            .send()
            .await?;
        decode_response(method, response).await
    }
}

async fn decode_response<T>(
    method: &'static str,
    response: reqwest::Response,
) -> Result<T, SlackApiError>
where
    T: DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        return Err(SlackApiError::Status { method, status: status.as_u16() });
    }

    let body: serde_json::Value = response.json().await?;
    let envelope: ApiEnvelope = serde_json::from_value(body.clone())
        .map_err(|e| SlackApiError::Decode { method, detail: e.to_string() })?;
    if !envelope.ok {
        let error = envelope.error.unwrap_or_else(|| "unknown_error".to_owned());
        return Err(SlackApiError::Api { method, error });
    }

    serde_json::from_value(body).map_err(|e| SlackApiError::Decode { method, detail: e.to_string() })
}

#[derive(Deserialize)]
struct ApiEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

impl ResponseMetadata {
    fn cursor(self) -> Option<String> {
        self.next_cursor.filter(|cursor| !cursor.is_empty())
    }
}

#[derive(Serialize)]
struct PostMessageBody<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "no_blocks")]
    blocks: &'a [Block],
}

fn no_blocks(blocks: &&[Block]) -> bool {
    blocks.is_empty()
}

#[derive(Deserialize)]
struct Acknowledged {}

#[derive(Serialize)]
struct OpenConversationBody<'a> {
    users: &'a str,
}

#[derive(Deserialize)]
struct OpenConversationResponse {
    channel: ConversationRef,
}

#[derive(Deserialize)]
struct ConversationRef {
    id: String,
}

#[derive(Deserialize)]
struct UsersListResponse {
    #[serde(default)]
    members: Vec<Member>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Deserialize)]
struct ConversationMembersResponse {
    #[serde(default)]
    members: Vec<String>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Serialize)]
struct ReactionBody<'a> {
    channel: &'a str,
    timestamp: &'a str,
    name: &'a str,
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        let body =
            PostMessageBody { channel, text: &message.fallback_text, blocks: &message.blocks };
        let _: Acknowledged = self.call_post("chat.postMessage", &body).await?;
        Ok(())
    }

    async fn open_direct_message(&self, user: &SlackUserId) -> Result<String, SlackApiError> {
        let response: OpenConversationResponse =
            self.call_post("conversations.open", &OpenConversationBody { users: user.as_str() }).await?;
        Ok(response.channel.id)
    }

    async fn list_team_members(&self) -> Result<Vec<Member>, SlackApiError> {
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("limit", PAGE_LIMIT.to_string())];
            if let Some(cursor) = cursor.take() {
                query.push(("cursor", cursor));
            }
            let page: UsersListResponse = self.call_get("users.list", &query).await?;
            members.extend(page.members);
            match page.response_metadata.cursor() {
                Some(next) => cursor = Some(next),
                None => return Ok(members),
            }
        }
    }

    async fn list_channel_members(
        &self,
        channel: &str,
    ) -> Result<Vec<SlackUserId>, SlackApiError> {
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query =
                vec![("channel", channel.to_owned()), ("limit", PAGE_LIMIT.to_string())];
            if let Some(cursor) = cursor.take() {
                query.push(("cursor", cursor));
            }
            let page: ConversationMembersResponse =
                self.call_get("conversations.members", &query).await?;
            members.extend(page.members.into_iter().map(SlackUserId));
            match page.response_metadata.cursor() {
                Some(next) => cursor = Some(next),
                None => return Ok(members),
            }
        }
    }

    async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        name: &str,
    ) -> Result<(), SlackApiError> {
        let _: Acknowledged =
            self.call_post("reactions.add", &ReactionBody { channel, timestamp, name }).await?;
        Ok(())
    }
}

/// Hands out [`SlackWebClient`]s sharing one connection pool.
pub struct WebClientFactory {
    http: Client,
    base_url: String,
}

impl WebClientFactory {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: Client::new(), base_url: base_url.into() }
    }
}

impl SlackApiFactory for WebClientFactory {
    fn connect(&self, bot_token: &SecretString) -> Arc<dyn SlackApi> {
        Arc::new(SlackWebClient::new(self.http.clone(), self.base_url.clone(), bot_token.clone()))
    }
}
