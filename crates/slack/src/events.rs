use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use gemification_core::domain::team::SlackTeamId;
use gemification_core::domain::user::SlackUserId;

use crate::commands::MessageScope;
use crate::context::BotError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub team_id: SlackTeamId,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    BlockAction(BlockActionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    pub fn user_id(&self) -> Option<&SlackUserId> {
        match self {
            Self::Message(event) => Some(&event.user_id),
            Self::BlockAction(event) => Some(&event.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    BlockAction,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub user_id: SlackUserId,
    pub text: String,
    pub ts: String,
    pub scope: MessageScope,
    pub bot_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: String,
    pub message_ts: String,
    pub user_id: SlackUserId,
    pub action_id: String,
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Bot(#[from] BotError),
    #[error("no bot connection is tracked for team `{0}`")]
    UnknownTeam(SlackTeamId),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher with the message and button handlers both backed by `service`.
pub fn gem_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: MessageService + BlockActionService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(service.clone()));
    dispatcher.register(BlockActionHandler::new(service));
    dispatcher
}

#[async_trait]
pub trait MessageService: Send + Sync {
    async fn handle_message(
        &self,
        team: &SlackTeamId,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

pub struct MessageHandler<S> {
    service: Arc<S>,
}

impl<S> MessageHandler<S>
where
    S: MessageService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: MessageService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_message(&envelope.team_id, event, ctx).await
    }
}

#[async_trait]
pub trait BlockActionService: Send + Sync {
    async fn handle_block_action(
        &self,
        team: &SlackTeamId,
        event: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

pub struct BlockActionHandler<S> {
    service: Arc<S>,
}

impl<S> BlockActionHandler<S>
where
    S: BlockActionService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: BlockActionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_block_action(&envelope.team_id, event, ctx).await
    }
}

#[derive(Deserialize)]
struct SocketFrame {
    envelope_id: String,
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct EventsApiPayload {
    team_id: String,
    event: RawMessageEvent,
}

#[derive(Deserialize)]
struct RawMessageEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    channel: String,
    #[serde(default)]
    channel_type: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    ts: String,
    #[serde(default)]
    bot_id: Option<String>,
}

#[derive(Deserialize)]
struct InteractivePayload {
    #[serde(rename = "type")]
    interaction_type: String,
    team: IdRef,
    user: IdRef,
    #[serde(default)]
    channel: Option<IdRef>,
    #[serde(default)]
    container: Container,
    #[serde(default)]
    actions: Vec<RawAction>,
}

#[derive(Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Default, Deserialize)]
struct Container {
    #[serde(default)]
    message_ts: String,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
}

impl SlackEnvelope {
    /// Decodes one Socket Mode frame. Frames without an envelope id (hello, disconnect) yield `None`.
    pub fn from_socket_frame(frame: &str) -> Result<Option<Self>, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(frame)?;
        if value.get("envelope_id").is_none() {
            return Ok(None);
        }
        let frame: SocketFrame = serde_json::from_value(value)?;
        let envelope = match frame.frame_type.as_str() {
            "events_api" => {
                let payload: EventsApiPayload = serde_json::from_value(frame.payload)?;
                Self {
                    envelope_id: frame.envelope_id,
                    team_id: SlackTeamId(payload.team_id),
                    event: message_event(payload.event),
                }
            }
            "interactive" => {
                let payload: InteractivePayload = serde_json::from_value(frame.payload)?;
                Self {
                    envelope_id: frame.envelope_id,
                    team_id: SlackTeamId(payload.team.id.clone()),
                    event: interaction_event(payload),
                }
            }
            other => Self {
                envelope_id: frame.envelope_id,
                team_id: SlackTeamId(
                    frame.payload.get("team_id").and_then(|id| id.as_str()).unwrap_or_default().to_owned(),
                ),
                event: SlackEvent::Unsupported { event_type: other.to_owned() },
            },
        };
        Ok(Some(envelope))
    }
}

fn message_event(raw: RawMessageEvent) -> SlackEvent {
    let scope = match (raw.event_type.as_str(), raw.channel_type.as_deref()) {
        ("app_mention", _) => MessageScope::DirectMention,
        ("message", Some("im")) => MessageScope::DirectMessage,
        ("message", _) => MessageScope::Ambient,
        _ => return SlackEvent::Unsupported { event_type: raw.event_type },
    };
    // Edits, joins and other subtypes carry no new statement.
    if let Some(subtype) = raw.subtype.filter(|subtype| subtype != "bot_message") {
        return SlackEvent::Unsupported { event_type: format!("{}.{subtype}", raw.event_type) };
    }
    let Some(user) = raw.user else {
        return SlackEvent::Unsupported { event_type: raw.event_type };
    };

    SlackEvent::Message(MessageEvent {
        channel_id: raw.channel,
        user_id: SlackUserId(user),
        text: raw.text,
        ts: raw.ts,
        scope,
        bot_id: raw.bot_id,
    })
}

fn interaction_event(payload: InteractivePayload) -> SlackEvent {
    if payload.interaction_type != "block_actions" {
        return SlackEvent::Unsupported { event_type: payload.interaction_type };
    }
    let (Some(channel), Some(action)) = (payload.channel, payload.actions.into_iter().next()) else {
        return SlackEvent::Unsupported { event_type: payload.interaction_type };
    };

    SlackEvent::BlockAction(BlockActionEvent {
        channel_id: channel.id,
        message_ts: payload.container.message_ts,
        user_id: SlackUserId(payload.user.id),
        action_id: action.action_id,
        value: action.value,
    })
}
