use serde::{Deserialize, Serialize};

use crate::domain::group::GroupName;
use crate::domain::user::{Member, Roster, SlackUserId};
use crate::flows::notices::{Notice, Prompt};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueKind {
    TeamBootstrap,
    AddAdmin,
    RemoveAdmin,
    Reconfigure,
}

impl DialogueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TeamBootstrap => "bootstrap",
            Self::AddAdmin => "add_admin",
            Self::RemoveAdmin => "remove_admin",
            Self::Reconfigure => "reconfigure",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bootstrap" => Some(Self::TeamBootstrap),
            "add_admin" => Some(Self::AddAdmin),
            "remove_admin" => Some(Self::RemoveAdmin),
            "reconfigure" => Some(Self::Reconfigure),
            _ => None,
        }
    }
}

/// Position in the materialized list of members still to be assigned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentCursor {
    members: Vec<Member>,
    index: usize,
}

impl AssignmentCursor {
    pub fn new(roster: &Roster) -> Self {
        Self { members: roster.assignable(), index: 0 }
    }

    pub fn current(&self) -> Option<&Member> {
        self.members.get(self.index)
    }

    pub fn advance(mut self) -> Self {
        self.index = (self.index + 1).min(self.members.len());
        self
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn remaining(&self) -> usize {
        self.members.len() - self.index
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueState {
    /// `groups` starts with the `stored` ones, which cannot be discarded.
    CollectingGroups { stored: Vec<GroupName>, groups: Vec<GroupName> },
    ConfirmingGroups { stored: Vec<GroupName>, groups: Vec<GroupName> },
    AssigningMembers { groups: Vec<GroupName>, cursor: AssignmentCursor },
    AwaitingAdminCandidate,
    ConfirmingAdminGrant { target: SlackUserId },
    AwaitingAdminRevocation,
    ConfirmingAdminRevocation { target: SlackUserId },
    AwaitingReconfigureTarget { groups: Vec<GroupName> },
    ChoosingGroupFor {
        target: SlackUserId,
        configured: bool,
        current_group: Option<GroupName>,
        groups: Vec<GroupName>,
    },
    Finished,
}

impl DialogueState {
    pub fn kind(&self) -> Option<DialogueKind> {
        match self {
            Self::CollectingGroups { .. }
            | Self::ConfirmingGroups { .. }
            | Self::AssigningMembers { .. } => Some(DialogueKind::TeamBootstrap),
            Self::AwaitingAdminCandidate | Self::ConfirmingAdminGrant { .. } => {
                Some(DialogueKind::AddAdmin)
            }
            Self::AwaitingAdminRevocation | Self::ConfirmingAdminRevocation { .. } => {
                Some(DialogueKind::RemoveAdmin)
            }
            Self::AwaitingReconfigureTarget { .. } | Self::ChoosingGroupFor { .. } => {
                Some(DialogueKind::Reconfigure)
            }
            Self::Finished => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CollectingGroups { .. } => "collecting_groups",
            Self::ConfirmingGroups { .. } => "confirming_groups",
            Self::AssigningMembers { .. } => "assigning_members",
            Self::AwaitingAdminCandidate => "awaiting_admin_candidate",
            Self::ConfirmingAdminGrant { .. } => "confirming_admin_grant",
            Self::AwaitingAdminRevocation => "awaiting_admin_revocation",
            Self::ConfirmingAdminRevocation { .. } => "confirming_admin_revocation",
            Self::AwaitingReconfigureTarget { .. } => "awaiting_reconfigure_target",
            Self::ChoosingGroupFor { .. } => "choosing_group",
            Self::Finished => "finished",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueStart {
    TeamBootstrap { already_configured: bool, existing_groups: Vec<GroupName> },
    AddAdmin,
    RemoveAdmin,
    Reconfigure { groups: Vec<GroupName> },
}

/// Everything the engine needs to judge a mentioned member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFacts {
    pub user: SlackUserId,
    pub in_roster: bool,
    pub is_bot: bool,
    pub configured: bool,
    pub is_admin: bool,
    pub admin_count: i64,
    pub current_group: Option<GroupName>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupChoice {
    Named(String),
    Skip,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueEvent {
    Cancel,
    StartOver,
    Done,
    ListAdmins,
    GroupName(String),
    Answer(bool),
    GroupsAccepted { roster: Roster },
    Candidate(CandidateFacts),
    MissingCandidate,
    Choose(GroupChoice),
    Unrecognized,
}

impl DialogueEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cancel => "cancel",
            Self::StartOver => "start_over",
            Self::Done => "done",
            Self::ListAdmins => "list_admins",
            Self::GroupName(_) => "group_name",
            Self::Answer(_) => "answer",
            Self::GroupsAccepted { .. } => "groups_accepted",
            Self::Candidate(_) => "candidate",
            Self::MissingCandidate => "missing_candidate",
            Self::Choose(_) => "choose",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Side effects requested by a transition, performed in order by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogueAction {
    Say(Notice),
    Prompt(Prompt),
    PersistGroups(Vec<GroupName>),
    AssignMember { user: SlackUserId, group: Option<GroupName> },
    EnsureMember { user: SlackUserId },
    GrantAdmin { user: SlackUserId },
    RevokeAdmin { user: SlackUserId },
    ListAdmins,
    MarkTeamConfigured,
    Notify { user: SlackUserId, notice: Notice },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueOpening {
    pub kind: DialogueKind,
    pub to: DialogueState,
    pub actions: Vec<DialogueAction>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: DialogueState,
    pub to: DialogueState,
    pub event: DialogueEvent,
    pub actions: Vec<DialogueAction>,
}
