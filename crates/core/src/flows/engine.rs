use thiserror::Error;

use crate::domain::group::{normalize_group_name, GroupName, GroupNameError, MAX_GROUPS_PER_TEAM};
use crate::domain::user::SlackUserId;
use crate::flows::notices::{Notice, Prompt};
use crate::flows::states::{
    AssignmentCursor, CandidateFacts, DialogueAction, DialogueEvent, DialogueKind, DialogueOpening,
    DialogueStart, DialogueState, GroupChoice, TransitionOutcome,
};
use crate::mention::parse_mention;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogueError {
    #[error("dialogue in state `{state}` cannot handle event `{event}`")]
    UnexpectedEvent { state: &'static str, event: &'static str },
}

/// What a reply means before any lookups are made.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interpretation {
    Event(DialogueEvent),
    /// A mention to resolve against the roster and store.
    Candidate(Option<SlackUserId>),
    /// The groups were confirmed; the roster is needed to start assigning members.
    GroupsConfirmed,
}

/// Maps a typed reply onto the closed set of responses the current prompt recognizes.
pub fn interpret_text(state: &DialogueState, text: &str) -> Interpretation {
    let trimmed = text.trim();
    let keyword = trimmed.to_ascii_lowercase();
    if keyword == "cancel" && !state.is_finished() {
        return Interpretation::Event(DialogueEvent::Cancel);
    }

    match state {
        DialogueState::CollectingGroups { .. } => match keyword.as_str() {
            "done" => Interpretation::Event(DialogueEvent::Done),
            "start over" => Interpretation::Event(DialogueEvent::StartOver),
            _ => Interpretation::Event(DialogueEvent::GroupName(trimmed.to_owned())),
        },
        DialogueState::ConfirmingGroups { .. }
        | DialogueState::ConfirmingAdminGrant { .. }
        | DialogueState::ConfirmingAdminRevocation { .. } => match keyword.as_str() {
            "yes" | "y" => interpret_answer(state, true),
            "no" | "n" => interpret_answer(state, false),
            _ => Interpretation::Event(DialogueEvent::Unrecognized),
        },
        DialogueState::AssigningMembers { .. } | DialogueState::ChoosingGroupFor { .. } => {
            match keyword.as_str() {
                "ignore" | "remove" | "skip" => {
                    Interpretation::Event(DialogueEvent::Choose(GroupChoice::Skip))
                }
                _ => Interpretation::Event(DialogueEvent::Choose(GroupChoice::Named(
                    trimmed.to_owned(),
                ))),
            }
        }
        DialogueState::AwaitingAdminRevocation if keyword == "list" => {
            Interpretation::Event(DialogueEvent::ListAdmins)
        }
        DialogueState::AwaitingAdminCandidate
        | DialogueState::AwaitingAdminRevocation
        | DialogueState::AwaitingReconfigureTarget { .. } => {
            Interpretation::Candidate(parse_mention(trimmed))
        }
        DialogueState::Finished => Interpretation::Event(DialogueEvent::Unrecognized),
    }
}

/// A yes/no answer, typed or clicked.
pub fn interpret_answer(state: &DialogueState, answer: bool) -> Interpretation {
    match state {
        DialogueState::ConfirmingGroups { .. } if answer => Interpretation::GroupsConfirmed,
        _ => Interpretation::Event(DialogueEvent::Answer(answer)),
    }
}

#[derive(Clone, Debug, Default)]
pub struct DialogueEngine;

impl DialogueEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn start(&self, start: &DialogueStart) -> DialogueOpening {
        match start {
            DialogueStart::TeamBootstrap { already_configured: true, .. } => DialogueOpening {
                kind: DialogueKind::TeamBootstrap,
                to: DialogueState::Finished,
                actions: vec![DialogueAction::Say(Notice::AlreadyConfigured)],
            },
            DialogueStart::TeamBootstrap { already_configured: false, existing_groups } => {
                DialogueOpening {
                    kind: DialogueKind::TeamBootstrap,
                    to: DialogueState::CollectingGroups {
                        stored: existing_groups.clone(),
                        groups: existing_groups.clone(),
                    },
                    actions: bootstrap_introduction(existing_groups),
                }
            }
            DialogueStart::AddAdmin => DialogueOpening {
                kind: DialogueKind::AddAdmin,
                to: DialogueState::AwaitingAdminCandidate,
                actions: vec![DialogueAction::Prompt(Prompt::AdminCandidate)],
            },
            DialogueStart::RemoveAdmin => DialogueOpening {
                kind: DialogueKind::RemoveAdmin,
                to: DialogueState::AwaitingAdminRevocation,
                actions: vec![DialogueAction::Prompt(Prompt::AdminRevocationCandidate)],
            },
            DialogueStart::Reconfigure { groups } => DialogueOpening {
                kind: DialogueKind::Reconfigure,
                to: DialogueState::AwaitingReconfigureTarget { groups: groups.clone() },
                actions: vec![DialogueAction::Prompt(Prompt::ReconfigureTarget)],
            },
        }
    }

    pub fn apply(
        &self,
        current: &DialogueState,
        event: &DialogueEvent,
    ) -> Result<TransitionOutcome, DialogueError> {
        let (to, actions) = match current {
            DialogueState::CollectingGroups { stored, groups } => {
                collect_groups(stored, groups, event)
            }
            DialogueState::ConfirmingGroups { stored, groups } => {
                confirm_groups(stored, groups, event)
            }
            DialogueState::AssigningMembers { groups, cursor } => {
                assign_members(groups, cursor, event)
            }
            DialogueState::AwaitingAdminCandidate => await_admin_candidate(event),
            DialogueState::ConfirmingAdminGrant { target } => confirm_admin_grant(target, event),
            DialogueState::AwaitingAdminRevocation => await_admin_revocation(event),
            DialogueState::ConfirmingAdminRevocation { target } => {
                confirm_admin_revocation(target, event)
            }
            DialogueState::AwaitingReconfigureTarget { groups } => {
                await_reconfigure_target(groups, event)
            }
            DialogueState::ChoosingGroupFor { target, configured, current_group, groups } => {
                choose_group(target, *configured, current_group.as_ref(), groups, event)
            }
            DialogueState::Finished => None,
        }
        .ok_or(DialogueError::UnexpectedEvent { state: current.name(), event: event.name() })?;

        Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
    }
}

type Step = Option<(DialogueState, Vec<DialogueAction>)>;

fn cancelled() -> Step {
    Some((DialogueState::Finished, vec![DialogueAction::Say(Notice::Cancelled)]))
}

fn bootstrap_introduction(stored: &[GroupName]) -> Vec<DialogueAction> {
    let mut actions = vec![
        DialogueAction::Say(Notice::IntroConfigure),
        DialogueAction::Say(Notice::IntroGroups),
        DialogueAction::Say(Notice::IntroLeaderboards),
    ];
    if !stored.is_empty() {
        actions.push(DialogueAction::Say(Notice::GroupsAlreadySaved(stored.to_vec())));
    }
    actions.push(DialogueAction::Prompt(Prompt::GroupName));
    actions
}

fn collect_groups(stored: &[GroupName], groups: &[GroupName], event: &DialogueEvent) -> Step {
    let stay = |notice: Notice, groups: Vec<GroupName>| {
        Some((
            DialogueState::CollectingGroups { stored: stored.to_vec(), groups },
            vec![DialogueAction::Say(notice), DialogueAction::Prompt(Prompt::GroupName)],
        ))
    };

    match event {
        DialogueEvent::Cancel => cancelled(),
        DialogueEvent::StartOver => Some((
            DialogueState::CollectingGroups { stored: stored.to_vec(), groups: stored.to_vec() },
            bootstrap_introduction(stored),
        )),
        DialogueEvent::Done if groups.is_empty() => stay(Notice::NoGroupsEntered, Vec::new()),
        DialogueEvent::Done => Some((
            DialogueState::ConfirmingGroups { stored: stored.to_vec(), groups: groups.to_vec() },
            vec![DialogueAction::Prompt(Prompt::ConfirmGroups { groups: groups.to_vec() })],
        )),
        DialogueEvent::GroupName(raw) => {
            let normalized = normalize_group_name(raw);
            if let Some(existing) = groups.iter().find(|group| group.as_str() == normalized) {
                return stay(Notice::GroupAlreadyAdded(existing.clone()), groups.to_vec());
            }
            if groups.len() >= MAX_GROUPS_PER_TEAM {
                return stay(Notice::GroupLimitReached, groups.to_vec());
            }
            match GroupName::parse(raw) {
                Ok(group) => {
                    let mut next = groups.to_vec();
                    next.push(group.clone());
                    stay(Notice::GroupAdded(group), next)
                }
                Err(GroupNameError::TooLong { .. }) => {
                    stay(Notice::GroupNameTooLong, groups.to_vec())
                }
                Err(GroupNameError::Empty) => Some((
                    DialogueState::CollectingGroups {
                        stored: stored.to_vec(),
                        groups: groups.to_vec(),
                    },
                    vec![DialogueAction::Prompt(Prompt::GroupName)],
                )),
            }
        }
        _ => None,
    }
}

fn confirm_groups(stored: &[GroupName], groups: &[GroupName], event: &DialogueEvent) -> Step {
    match event {
        DialogueEvent::Cancel => cancelled(),
        DialogueEvent::GroupsAccepted { roster } => {
            let mut actions = vec![
                DialogueAction::PersistGroups(groups.to_vec()),
                DialogueAction::Say(Notice::GroupsSet(groups.to_vec())),
                DialogueAction::Say(Notice::AssignmentIntro),
            ];
            let (to, next) = next_assignment(groups, AssignmentCursor::new(roster));
            actions.extend(next);
            Some((to, actions))
        }
        DialogueEvent::Answer(false) => {
            let mut actions = vec![
                DialogueAction::Say(Notice::GroupsDiscarded),
                DialogueAction::Say(Notice::StartingOver),
            ];
            actions.extend(bootstrap_introduction(stored));
            Some((
                DialogueState::CollectingGroups { stored: stored.to_vec(), groups: stored.to_vec() },
                actions,
            ))
        }
        DialogueEvent::Unrecognized => Some((
            DialogueState::ConfirmingGroups { stored: stored.to_vec(), groups: groups.to_vec() },
            vec![DialogueAction::Prompt(Prompt::ConfirmGroups { groups: groups.to_vec() })],
        )),
        _ => None,
    }
}

/// Prompts for the member under the cursor, or wraps up once every member was visited.
fn next_assignment(
    groups: &[GroupName],
    cursor: AssignmentCursor,
) -> (DialogueState, Vec<DialogueAction>) {
    match cursor.current().cloned() {
        Some(member) => (
            DialogueState::AssigningMembers { groups: groups.to_vec(), cursor },
            vec![DialogueAction::Prompt(Prompt::AssignMember { member, groups: groups.to_vec() })],
        ),
        None => (
            DialogueState::Finished,
            vec![
                DialogueAction::MarkTeamConfigured,
                DialogueAction::Say(Notice::InviteInstruction),
                DialogueAction::Say(Notice::HelpPointer),
            ],
        ),
    }
}

fn find_group<'a>(groups: &'a [GroupName], raw: &str) -> Option<&'a GroupName> {
    let normalized = normalize_group_name(raw);
    groups.iter().find(|group| group.as_str() == normalized)
}

fn assign_members(groups: &[GroupName], cursor: &AssignmentCursor, event: &DialogueEvent) -> Step {
    let member = cursor.current()?.clone();
    let reprompt = || {
        Some((
            DialogueState::AssigningMembers { groups: groups.to_vec(), cursor: cursor.clone() },
            vec![DialogueAction::Prompt(Prompt::AssignMember {
                member: member.clone(),
                groups: groups.to_vec(),
            })],
        ))
    };

    let mut actions = match event {
        DialogueEvent::Cancel => return cancelled(),
        DialogueEvent::Choose(GroupChoice::Named(raw)) => match find_group(groups, raw) {
            Some(group) => vec![
                DialogueAction::AssignMember { user: member.id.clone(), group: Some(group.clone()) },
                DialogueAction::Say(Notice::MemberAssigned {
                    user: member.id.clone(),
                    group: group.clone(),
                }),
            ],
            None => return reprompt(),
        },
        DialogueEvent::Choose(GroupChoice::Skip) => vec![
            DialogueAction::EnsureMember { user: member.id.clone() },
            DialogueAction::Say(Notice::MemberSkipped { user: member.id.clone() }),
        ],
        DialogueEvent::Unrecognized => return reprompt(),
        _ => return None,
    };

    let (to, next) = next_assignment(groups, cursor.clone().advance());
    actions.extend(next);
    Some((to, actions))
}

fn await_admin_candidate(event: &DialogueEvent) -> Step {
    let reprompt = |notice: Notice| {
        Some((
            DialogueState::AwaitingAdminCandidate,
            vec![DialogueAction::Say(notice), DialogueAction::Prompt(Prompt::AdminCandidate)],
        ))
    };

    match event {
        DialogueEvent::Cancel => cancelled(),
        DialogueEvent::MissingCandidate => reprompt(Notice::InvalidUsername),
        DialogueEvent::Candidate(facts) => {
            admin_candidate(facts).or_else(|| reprompt(Notice::InvalidUsername))
        }
        DialogueEvent::Unrecognized => reprompt(Notice::InvalidUsername),
        _ => None,
    }
}

fn admin_candidate(facts: &CandidateFacts) -> Step {
    if !facts.in_roster {
        return None;
    }
    let finish = |notice: Notice| Some((DialogueState::Finished, vec![DialogueAction::Say(notice)]));
    if !facts.configured {
        return finish(Notice::CandidateNotConfigured);
    }
    if facts.is_admin {
        return finish(Notice::AlreadyAdmin { user: facts.user.clone() });
    }

    Some((
        DialogueState::ConfirmingAdminGrant { target: facts.user.clone() },
        vec![DialogueAction::Prompt(Prompt::ConfirmAdminGrant { target: facts.user.clone() })],
    ))
}

fn confirm_admin_grant(target: &SlackUserId, event: &DialogueEvent) -> Step {
    match event {
        DialogueEvent::Cancel => cancelled(),
        DialogueEvent::Answer(true) => Some((
            DialogueState::Finished,
            vec![
                DialogueAction::GrantAdmin { user: target.clone() },
                DialogueAction::Say(Notice::AdminGranted { user: target.clone() }),
                DialogueAction::Notify { user: target.clone(), notice: Notice::NewAdminWelcome },
            ],
        )),
        DialogueEvent::Answer(false) => Some((
            DialogueState::Finished,
            vec![DialogueAction::Say(Notice::AdminGrantDeclined { user: target.clone() })],
        )),
        DialogueEvent::Unrecognized => Some((
            DialogueState::ConfirmingAdminGrant { target: target.clone() },
            vec![DialogueAction::Prompt(Prompt::ConfirmAdminGrant { target: target.clone() })],
        )),
        _ => None,
    }
}

fn await_admin_revocation(event: &DialogueEvent) -> Step {
    let stay = |mut actions: Vec<DialogueAction>| {
        actions.push(DialogueAction::Prompt(Prompt::AdminRevocationCandidate));
        Some((DialogueState::AwaitingAdminRevocation, actions))
    };
    let finish = |notice: Notice| Some((DialogueState::Finished, vec![DialogueAction::Say(notice)]));

    match event {
        DialogueEvent::Cancel => cancelled(),
        DialogueEvent::ListAdmins => stay(vec![DialogueAction::ListAdmins]),
        DialogueEvent::MissingCandidate | DialogueEvent::Unrecognized => {
            stay(vec![DialogueAction::Say(Notice::InvalidUsername)])
        }
        DialogueEvent::Candidate(facts) if !facts.in_roster => {
            stay(vec![DialogueAction::Say(Notice::InvalidUsername)])
        }
        DialogueEvent::Candidate(facts) if !facts.is_admin => {
            finish(Notice::NotAnAdmin { user: facts.user.clone() })
        }
        DialogueEvent::Candidate(facts) if facts.admin_count <= 1 => finish(Notice::LastAdmin),
        DialogueEvent::Candidate(facts) => Some((
            DialogueState::ConfirmingAdminRevocation { target: facts.user.clone() },
            vec![DialogueAction::Prompt(Prompt::ConfirmAdminRevocation {
                target: facts.user.clone(),
            })],
        )),
        _ => None,
    }
}

fn confirm_admin_revocation(target: &SlackUserId, event: &DialogueEvent) -> Step {
    match event {
        DialogueEvent::Cancel => cancelled(),
        DialogueEvent::Answer(true) => Some((
            DialogueState::Finished,
            vec![
                DialogueAction::RevokeAdmin { user: target.clone() },
                DialogueAction::Say(Notice::AdminRevoked { user: target.clone() }),
                DialogueAction::Notify { user: target.clone(), notice: Notice::AdminRemovedNotice },
            ],
        )),
        DialogueEvent::Answer(false) => Some((
            DialogueState::Finished,
            vec![DialogueAction::Say(Notice::AdminRevocationDeclined { user: target.clone() })],
        )),
        DialogueEvent::Unrecognized => Some((
            DialogueState::ConfirmingAdminRevocation { target: target.clone() },
            vec![DialogueAction::Prompt(Prompt::ConfirmAdminRevocation { target: target.clone() })],
        )),
        _ => None,
    }
}

fn await_reconfigure_target(groups: &[GroupName], event: &DialogueEvent) -> Step {
    let stay = |notice: Notice| {
        Some((
            DialogueState::AwaitingReconfigureTarget { groups: groups.to_vec() },
            vec![DialogueAction::Say(notice), DialogueAction::Prompt(Prompt::ReconfigureTarget)],
        ))
    };

    match event {
        DialogueEvent::Cancel => cancelled(),
        DialogueEvent::MissingCandidate | DialogueEvent::Unrecognized => {
            stay(Notice::InvalidUsername)
        }
        DialogueEvent::Candidate(facts) if !facts.in_roster => stay(Notice::InvalidUsername),
        DialogueEvent::Candidate(facts) if facts.is_bot => stay(Notice::BotNotConfigurable),
        DialogueEvent::Candidate(facts) => Some((
            DialogueState::ChoosingGroupFor {
                target: facts.user.clone(),
                configured: facts.configured,
                current_group: facts.current_group.clone(),
                groups: groups.to_vec(),
            },
            vec![DialogueAction::Prompt(Prompt::ChooseGroup {
                target: facts.user.clone(),
                current_group: facts.current_group.clone(),
                groups: groups.to_vec(),
            })],
        )),
        _ => None,
    }
}

fn choose_group(
    target: &SlackUserId,
    configured: bool,
    current_group: Option<&GroupName>,
    groups: &[GroupName],
    event: &DialogueEvent,
) -> Step {
    let user = target.clone();
    let reprompt = || {
        Some((
            DialogueState::ChoosingGroupFor {
                target: user.clone(),
                configured,
                current_group: current_group.cloned(),
                groups: groups.to_vec(),
            },
            vec![DialogueAction::Prompt(Prompt::ChooseGroup {
                target: user.clone(),
                current_group: current_group.cloned(),
                groups: groups.to_vec(),
            })],
        ))
    };

    match event {
        DialogueEvent::Cancel => cancelled(),
        DialogueEvent::Choose(GroupChoice::Named(raw)) => match find_group(groups, raw) {
            Some(group) => Some((
                DialogueState::Finished,
                vec![
                    DialogueAction::AssignMember { user: user.clone(), group: Some(group.clone()) },
                    DialogueAction::Say(Notice::MemberAssigned {
                        user: user.clone(),
                        group: group.clone(),
                    }),
                    DialogueAction::Notify {
                        user: user.clone(),
                        notice: Notice::MovedToGroup(group.clone()),
                    },
                ],
            )),
            None => reprompt(),
        },
        DialogueEvent::Choose(GroupChoice::Skip) if configured => Some((
            DialogueState::Finished,
            vec![
                DialogueAction::AssignMember { user: user.clone(), group: None },
                DialogueAction::Say(Notice::MemberUngrouped { user: user.clone() }),
                DialogueAction::Notify { user: user.clone(), notice: Notice::RemovedFromGroups },
            ],
        )),
        DialogueEvent::Choose(GroupChoice::Skip) => Some((
            DialogueState::Finished,
            vec![DialogueAction::Say(Notice::MemberLeftUnconfigured { user: user.clone() })],
        )),
        DialogueEvent::Unrecognized => reprompt(),
        _ => None,
    }
}
