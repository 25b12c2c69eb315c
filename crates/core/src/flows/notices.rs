use serde::{Deserialize, Serialize};

use crate::domain::group::{GroupName, MAX_GROUPS_PER_TEAM, MAX_GROUP_NAME_CHARS};
use crate::domain::user::{Member, SlackUserId};

/// Canned replies emitted by dialogues and installation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    Welcome,
    AlreadyConfigured,
    IntroConfigure,
    IntroGroups,
    IntroLeaderboards,
    GroupAdded(GroupName),
    GroupAlreadyAdded(GroupName),
    GroupLimitReached,
    GroupNameTooLong,
    NoGroupsEntered,
    GroupsSet(Vec<GroupName>),
    GroupsAlreadySaved(Vec<GroupName>),
    AssignmentIntro,
    GroupsDiscarded,
    StartingOver,
    MemberAssigned { user: SlackUserId, group: GroupName },
    MemberSkipped { user: SlackUserId },
    InviteInstruction,
    HelpPointer,
    Cancelled,
    InvalidUsername,
    AlreadyAdmin { user: SlackUserId },
    CandidateNotConfigured,
    AdminGranted { user: SlackUserId },
    AdminGrantDeclined { user: SlackUserId },
    NewAdminWelcome,
    LastAdmin,
    NotAnAdmin { user: SlackUserId },
    AdminRevoked { user: SlackUserId },
    AdminRevocationDeclined { user: SlackUserId },
    AdminRemovedNotice,
    BotNotConfigurable,
    MemberUngrouped { user: SlackUserId },
    MemberLeftUnconfigured { user: SlackUserId },
    MovedToGroup(GroupName),
    RemovedFromGroups,
    DialogueInactive,
    DialogueBusy,
    DialogueAborted,
}

impl Notice {
    pub fn text(&self) -> String {
        match self {
            Self::Welcome => "Welcome to Gemification! :gem:".to_owned(),
            Self::AlreadyConfigured => "This team is already configured with Gemification.".to_owned(),
            Self::IntroConfigure => "Let's begin by configuring your Slack team into groups.".to_owned(),
            Self::IntroGroups => "A group is a subset of your Slack team. For example, a programming Slack team could be divided into front-end and back-end groups.".to_owned(),
            Self::IntroLeaderboards => "Each group will have their own Gemification leaderboard.".to_owned(),
            Self::GroupAdded(group) => format!("{group} was added as a group"),
            Self::GroupAlreadyAdded(group) => format!("{group} was already added as a group."),
            Self::GroupLimitReached => format!(
                "You may only have {MAX_GROUPS_PER_TEAM} groups set for Gemification. Type `done` to move to the next step."
            ),
            Self::GroupNameTooLong => {
                format!("A group must be {MAX_GROUP_NAME_CHARS} characters or less.")
            }
            Self::NoGroupsEntered => "Please enter at least one group for your Slack team.".to_owned(),
            Self::GroupsSet(groups) => {
                format!("Nice work! The groups {} are set to your team! :tada:", join_groups(groups))
            }
            Self::GroupsAlreadySaved(groups) => format!(
                "Your team already has these groups: {}. Add more or type `done` to keep them.",
                join_groups(groups)
            ),
            Self::AssignmentIntro => {
                "Now that you have set up groups, let's assign the people to these groups.".to_owned()
            }
            Self::GroupsDiscarded => "These groups will not be set for your team.".to_owned(),
            Self::StartingOver => "Ok, let's start over.".to_owned(),
            Self::MemberAssigned { user, group } => {
                format!("Perfect! {} is now set to the {group} group.", user.mention())
            }
            Self::MemberSkipped { user } => {
                format!("Ok, you chose to not set {} to a group.", user.mention())
            }
            Self::InviteInstruction => "The last step is to /invite me to the channel you'll be using for Gemification. Without that, I won't be able to do anything.".to_owned(),
            Self::HelpPointer => "For a full list of commands and explaination on how to use Gemification, type `help` in a direct message to Gemification.".to_owned(),
            Self::Cancelled => "Cancel.. got it!".to_owned(),
            Self::InvalidUsername => "The username you entered isn't valid.".to_owned(),
            Self::AlreadyAdmin { user } => {
                format!("{} is already an admin user in gemification.", user.mention())
            }
            Self::CandidateNotConfigured => "The user you are trying to set as an admin is not configured with Gemification. If you believe this is an error, speak to a Gemification admin and have them configure the user you are trying to set as an admin.".to_owned(),
            Self::AdminGranted { user } => format!("{} is now set as an admin.", user.mention()),
            Self::AdminGrantDeclined { user } => {
                format!("{} will not be set as an admin.", user.mention())
            }
            Self::NewAdminWelcome => {
                "Hey there, good looking. :wink: You have been set as an admin.".to_owned()
            }
            Self::LastAdmin => "You are trying to remove yourself, but you are the last admin in this channel. Please add a new admin before removing yourself.".to_owned(),
            Self::NotAnAdmin { user } => format!("{} is currently not an admin.", user.mention()),
            Self::AdminRevoked { user } => {
                format!("{} is now removed from being an admin.", user.mention())
            }
            Self::AdminRevocationDeclined { user } => {
                format!("{} will not be removed from being an admin.", user.mention())
            }
            Self::AdminRemovedNotice => "You have been removed as an admin.".to_owned(),
            Self::BotNotConfigurable => {
                "The user you entered is a bot and cannot be configured for Gemification.".to_owned()
            }
            Self::MemberUngrouped { user } => {
                format!("Perfect! {} is now removed from all Gemification groups.", user.mention())
            }
            Self::MemberLeftUnconfigured { user } => {
                format!("Ok, {} will not be configured to a Gemification group.", user.mention())
            }
            Self::MovedToGroup(group) => format!(
                "This is a notice that you have been moved to the {group} Gemification group. :grin:"
            ),
            Self::RemovedFromGroups => {
                "This is a notice that you have been removed from Gemification groups. :grin:"
                    .to_owned()
            }
            Self::DialogueInactive => {
                "That conversation is no longer active. Start it again with a new command.".to_owned()
            }
            Self::DialogueBusy => "You are already in the middle of a conversation with me. Finish it or type `cancel` first.".to_owned(),
            Self::DialogueAborted => "I couldn't save that step because the team's setup changed in the meantime. This conversation has ended; start it again to pick up the current setup.".to_owned(),
        }
    }
}

/// The value a button carries back into the dialogue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceValue {
    Answer(bool),
    Group(GroupName),
    Skip,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptChoice {
    pub label: String,
    pub value: ChoiceValue,
}

impl PromptChoice {
    fn answer(label: &str, answer: bool) -> Self {
        Self { label: label.to_owned(), value: ChoiceValue::Answer(answer) }
    }
}

/// Questions that suspend a dialogue until the next reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Prompt {
    GroupName,
    ConfirmGroups { groups: Vec<GroupName> },
    AssignMember { member: Member, groups: Vec<GroupName> },
    AdminCandidate,
    ConfirmAdminGrant { target: SlackUserId },
    AdminRevocationCandidate,
    ConfirmAdminRevocation { target: SlackUserId },
    ReconfigureTarget,
    ChooseGroup { target: SlackUserId, current_group: Option<GroupName>, groups: Vec<GroupName> },
}

impl Prompt {
    pub fn text(&self) -> String {
        match self {
            Self::GroupName => format!(
                "One at a time, please enter a name for a new group. A group can be up to {MAX_GROUP_NAME_CHARS} characters long. You may have up to {MAX_GROUPS_PER_TEAM} groups. Type `done` to finish and finalize the groups or `start over` to start over."
            ),
            Self::ConfirmGroups { groups } => {
                format!("Here are the groups you have added: {}", join_groups(groups))
            }
            Self::AssignMember { member, .. } => {
                format!("Let's assign {} to a group.", member.preferred_name())
            }
            Self::AdminCandidate => {
                "Who would you like to add as an admin? Or type `cancel` to quit.".to_owned()
            }
            Self::ConfirmAdminGrant { target } => {
                format!("Are you sure you want to set {} as an admin?", target.mention())
            }
            Self::AdminRevocationCandidate => "Who would you like to remove as an admin? Type `list` to show current admins or `cancel` to quit.".to_owned(),
            Self::ConfirmAdminRevocation { target } => {
                format!("Are you sure you want to remove {} as an admin?", target.mention())
            }
            Self::ReconfigureTarget => {
                "Who would you like to reconfigure? Or type `cancel` to quit.".to_owned()
            }
            Self::ChooseGroup { target, current_group, .. } => match current_group {
                Some(group) => format!(
                    "Let's reconfigure {}. This person is currently set to {group} group.",
                    target.mention()
                ),
                None => format!(
                    "Let's reconfigure {}. This person isn't currently assigned to a group.",
                    target.mention()
                ),
            },
        }
    }

    /// Heading shown above the buttons, when the prompt has buttons.
    pub fn title(&self) -> Option<String> {
        match self {
            Self::ConfirmGroups { .. } => {
                Some("Do you wish to set these groups for your team?".to_owned())
            }
            Self::AssignMember { member, .. } => Some(format!(
                "Which group would you like to set {} to?",
                member.preferred_name()
            )),
            Self::ChooseGroup { target, .. } => {
                Some(format!("Which group would you like to set {} to?", target.mention()))
            }
            _ => None,
        }
    }

    pub fn choices(&self) -> Vec<PromptChoice> {
        match self {
            Self::ConfirmGroups { .. }
            | Self::ConfirmAdminGrant { .. }
            | Self::ConfirmAdminRevocation { .. } => {
                vec![PromptChoice::answer("Yes", true), PromptChoice::answer("No", false)]
            }
            Self::AssignMember { groups, .. } => group_choices(groups, "Ignore"),
            Self::ChooseGroup { groups, .. } => group_choices(groups, "Remove From Group"),
            _ => Vec::new(),
        }
    }
}

fn group_choices(groups: &[GroupName], skip_label: &str) -> Vec<PromptChoice> {
    groups
        .iter()
        .map(|group| PromptChoice {
            label: group.to_string(),
            value: ChoiceValue::Group(group.clone()),
        })
        .chain(std::iter::once(PromptChoice {
            label: skip_label.to_owned(),
            value: ChoiceValue::Skip,
        }))
        .collect()
}

pub fn join_groups(groups: &[GroupName]) -> String {
    groups.iter().map(GroupName::as_str).collect::<Vec<_>>().join(", ")
}
