use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{info, warn};

use gemification_core::domain::group::{GroupId, GroupName};
use gemification_core::domain::team::{SlackTeamId, Team};
use gemification_core::domain::user::{Member, SlackUserId};
use gemification_core::flows::{
    interpret_answer, interpret_text, CandidateFacts, ChoiceValue, DialogueAction, DialogueEngine,
    DialogueEvent, DialogueKind, DialogueStart, DialogueState, GroupChoice, Interpretation, Notice,
};
use gemification_core::reporting::admin_list;
use gemification_db::RepositoryError;

use crate::blocks::{prompt_message, ChoiceAction};
use crate::context::{BotContext, BotError};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub team: SlackTeamId,
    pub user: SlackUserId,
}

impl SessionKey {
    pub fn new(team: &SlackTeamId, user: &SlackUserId) -> Self {
        Self { team: team.clone(), user: user.clone() }
    }
}

/// A suspended dialogue and the conversation its prompts go to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub kind: DialogueKind,
    pub state: DialogueState,
    pub channel: String,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionKey, Session>>,
}

impl SessionStore {
    pub async fn get(&self, key: &SessionKey) -> Option<Session> {
        self.sessions.lock().await.get(key).cloned()
    }

    pub async fn contains(&self, key: &SessionKey) -> bool {
        self.sessions.lock().await.contains_key(key)
    }

    /// Stores `session` unless one is already active for `key`.
    pub async fn begin(&self, key: SessionKey, session: Session) -> bool {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&key) {
            return false;
        }
        sessions.insert(key, session);
        true
    }

    pub async fn replace(&self, key: SessionKey, session: Session) {
        self.sessions.lock().await.insert(key, session);
    }

    pub async fn end(&self, key: &SessionKey) {
        self.sessions.lock().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Drives dialogues: turns replies into engine events and performs the resulting actions.
#[derive(Default)]
pub struct Configurator {
    engine: DialogueEngine,
    sessions: SessionStore,
}

impl Configurator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn has_session(&self, team: &SlackTeamId, user: &SlackUserId) -> bool {
        self.sessions.contains(&SessionKey::new(team, user)).await
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.len().await
    }

    /// Opens a dialogue for `user` in `channel`. Returns `false` when one was already running.
    pub async fn start(
        &self,
        ctx: &BotContext,
        team: &Team,
        user: &SlackUserId,
        channel: &str,
        start: DialogueStart,
    ) -> Result<bool, BotError> {
        let key = SessionKey::new(&ctx.slack_team, user);
        if self.sessions.contains(&key).await {
            ctx.post(channel, Notice::DialogueBusy.text()).await?;
            return Ok(false);
        }

        let opening = self.engine.start(&start);
        if !opening.to.is_finished() {
            let session =
                Session { kind: opening.kind, state: opening.to.clone(), channel: channel.to_owned() };
            if !self.sessions.begin(key.clone(), session).await {
                ctx.post(channel, Notice::DialogueBusy.text()).await?;
                return Ok(false);
            }
        }

        info!(
            event_name = "dialogue.started",
            team_id = %ctx.slack_team,
            user_id = %user,
            dialogue = opening.kind.as_str(),
            state = opening.to.name(),
            "started dialogue"
        );
        let performed = self.perform(ctx, team, channel, opening.kind, opening.actions).await;
        if let Err(error) = performed {
            self.abort(ctx, &key, channel, opening.kind, error).await?;
        }
        Ok(true)
    }

    /// Feeds a typed reply to the user's active dialogue. Returns `false` when there is none.
    pub async fn handle_text(
        &self,
        ctx: &BotContext,
        team: &Team,
        user: &SlackUserId,
        text: &str,
    ) -> Result<bool, BotError> {
        let key = SessionKey::new(&ctx.slack_team, user);
        let Some(session) = self.sessions.get(&key).await else {
            return Ok(false);
        };

        let interpretation = interpret_text(&session.state, text);
        let event = self.resolve(ctx, team, interpretation).await?;
        self.advance(ctx, team, key, session, event).await?;
        Ok(true)
    }

    /// Feeds a button click. Clicks that belong to no running dialogue of that kind get a notice.
    pub async fn handle_choice(
        &self,
        ctx: &BotContext,
        team: &Team,
        user: &SlackUserId,
        channel: &str,
        action: &ChoiceAction,
    ) -> Result<(), BotError> {
        let key = SessionKey::new(&ctx.slack_team, user);
        let session = match self.sessions.get(&key).await {
            Some(session) if session.kind == action.kind => session,
            _ => {
                info!(
                    event_name = "dialogue.stale_action",
                    team_id = %ctx.slack_team,
                    user_id = %user,
                    dialogue = action.kind.as_str(),
                    "button click without a matching dialogue"
                );
                return ctx.post(channel, Notice::DialogueInactive.text()).await;
            }
        };

        let interpretation = match &action.value {
            ChoiceValue::Answer(answer) => interpret_answer(&session.state, *answer),
            ChoiceValue::Group(group) => Interpretation::Event(DialogueEvent::Choose(
                GroupChoice::Named(group.as_str().to_owned()),
            )),
            ChoiceValue::Skip => Interpretation::Event(DialogueEvent::Choose(GroupChoice::Skip)),
        };
        let event = self.resolve(ctx, team, interpretation).await?;
        self.advance(ctx, team, key, session, event).await
    }

    async fn advance(
        &self,
        ctx: &BotContext,
        team: &Team,
        key: SessionKey,
        session: Session,
        event: DialogueEvent,
    ) -> Result<(), BotError> {
        let outcome = match self.engine.apply(&session.state, &event) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    event_name = "dialogue.rejected_event",
                    team_id = %key.team,
                    user_id = %key.user,
                    dialogue = session.kind.as_str(),
                    error = %error,
                    "reply does not fit the dialogue state"
                );
                return ctx.post(&session.channel, Notice::DialogueInactive.text()).await;
            }
        };

        info!(
            event_name = "dialogue.transition",
            team_id = %key.team,
            user_id = %key.user,
            dialogue = session.kind.as_str(),
            from = outcome.from.name(),
            to = outcome.to.name(),
            event = outcome.event.name(),
            "advanced dialogue"
        );
        let performed =
            self.perform(ctx, team, &session.channel, session.kind, outcome.actions).await;
        if let Err(error) = performed {
            return self.abort(ctx, &key, &session.channel, session.kind, error).await;
        }

        if outcome.to.is_finished() {
            self.sessions.end(&key).await;
        } else {
            self.sessions.replace(key, Session { state: outcome.to, ..session }).await;
        }
        Ok(())
    }

    /// Ends a dialogue whose actions failed. Stale-state conflicts are explained to the user,
    /// anything else is returned to the caller.
    async fn abort(
        &self,
        ctx: &BotContext,
        key: &SessionKey,
        channel: &str,
        kind: DialogueKind,
        error: BotError,
    ) -> Result<(), BotError> {
        self.sessions.end(key).await;
        warn!(
            event_name = "dialogue.aborted",
            team_id = %key.team,
            user_id = %key.user,
            dialogue = kind.as_str(),
            error = %error,
            "dialogue action failed"
        );
        match error {
            BotError::Repository(RepositoryError::Constraint(_) | RepositoryError::NotFound(_)) => {
                ctx.post(channel, Notice::DialogueAborted.text()).await
            }
            other => Err(other),
        }
    }

    async fn resolve(
        &self,
        ctx: &BotContext,
        team: &Team,
        interpretation: Interpretation,
    ) -> Result<DialogueEvent, BotError> {
        match interpretation {
            Interpretation::Event(event) => Ok(event),
            Interpretation::GroupsConfirmed => {
                let roster = ctx.roster().await?;
                Ok(DialogueEvent::GroupsAccepted { roster: roster.as_ref().clone() })
            }
            Interpretation::Candidate(None) => Ok(DialogueEvent::MissingCandidate),
            Interpretation::Candidate(Some(user)) => {
                Ok(DialogueEvent::Candidate(candidate_facts(ctx, team, user).await?))
            }
        }
    }

    async fn perform(
        &self,
        ctx: &BotContext,
        team: &Team,
        channel: &str,
        kind: DialogueKind,
        actions: Vec<DialogueAction>,
    ) -> Result<(), BotError> {
        for action in actions {
            match action {
                DialogueAction::Say(notice) => ctx.post(channel, notice.text()).await?,
                DialogueAction::Prompt(prompt) => {
                    ctx.post_message(channel, &prompt_message(kind, &prompt)).await?
                }
                DialogueAction::PersistGroups(groups) => {
                    persist_new_groups(ctx, team, groups).await?
                }
                DialogueAction::AssignMember { user, group } => {
                    let group_id = match group {
                        Some(name) => Some(group_id(ctx, team, &name).await?),
                        None => None,
                    };
                    ctx.repos.users.assign_group(team.id, &user, group_id).await?;
                }
                DialogueAction::EnsureMember { user } => {
                    ctx.repos.users.ensure(team.id, &user).await?;
                }
                DialogueAction::GrantAdmin { user } => {
                    ctx.repos.users.grant_admin(team.id, &user).await?;
                }
                DialogueAction::RevokeAdmin { user } => {
                    if !ctx.repos.users.revoke_admin(team.id, &user).await? {
                        // Another admin was removed since the check; the rest of the script no longer applies.
                        ctx.post(channel, Notice::LastAdmin.text()).await?;
                        return Ok(());
                    }
                }
                DialogueAction::ListAdmins => {
                    let admins = ctx.repos.users.list_admins(team.id).await?;
                    ctx.post(channel, admin_list(&admins)).await?;
                }
                DialogueAction::MarkTeamConfigured => {
                    ctx.repos.teams.mark_configured(team.id).await?
                }
                DialogueAction::Notify { user, notice } => ctx.tell(&user, notice.text()).await?,
            }
        }
        Ok(())
    }
}

async fn candidate_facts(
    ctx: &BotContext,
    team: &Team,
    user: SlackUserId,
) -> Result<CandidateFacts, BotError> {
    let roster = ctx.roster().await?;
    let member = roster.find(&user);
    let row = ctx.repos.users.find(team.id, &user).await?;
    let admin_count = ctx.repos.users.count_admins(team.id).await?;
    let current_group = match row.as_ref().and_then(|row| row.group_id) {
        Some(group_id) => ctx
            .repos
            .groups
            .list_for_team(team.id)
            .await?
            .into_iter()
            .find(|group| group.id == group_id)
            .map(|group| group.name),
        None => None,
    };

    Ok(CandidateFacts {
        in_roster: member.is_some(),
        is_bot: member.is_some_and(Member::is_bot_account),
        configured: row.is_some(),
        is_admin: row.as_ref().is_some_and(|row| row.is_admin),
        admin_count,
        current_group,
        user,
    })
}

/// Groups left behind by an abandoned bootstrap are reused rather than inserted twice.
async fn persist_new_groups(
    ctx: &BotContext,
    team: &Team,
    groups: Vec<GroupName>,
) -> Result<(), BotError> {
    let existing = ctx.repos.groups.list_for_team(team.id).await?;
    let fresh: Vec<GroupName> = groups
        .into_iter()
        .filter(|name| !existing.iter().any(|group| &group.name == name))
        .collect();
    if !fresh.is_empty() {
        ctx.repos.groups.create_groups(team.id, &fresh).await?;
    }
    Ok(())
}

async fn group_id(ctx: &BotContext, team: &Team, name: &GroupName) -> Result<GroupId, BotError> {
    ctx.repos
        .groups
        .find_by_name(team.id, name)
        .await?
        .map(|group| group.id)
        .ok_or_else(|| RepositoryError::NotFound(format!("group `{name}`")).into())
}

/// Group names of the team, in creation order.
pub async fn team_groups(ctx: &BotContext, team: &Team) -> Result<Vec<GroupName>, BotError> {
    Ok(ctx.repos.groups.list_for_team(team.id).await?.into_iter().map(|group| group.name).collect())
}
