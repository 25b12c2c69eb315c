use crate::guard::Requirement;

/// How a message reached the bot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageScope {
    /// Posted in a channel the bot is in, without addressing it.
    Ambient,
    DirectMessage,
    /// Posted in a channel and addressed to the bot with `@gemification`.
    DirectMention,
}

impl MessageScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ambient => "ambient",
            Self::DirectMessage => "direct_message",
            Self::DirectMention => "direct_mention",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    AwardGem,
    Leaderboard,
    AllGems,
    ClearGems,
    AddAdmin,
    RemoveAdmin,
    ListAdmins,
    GetReasons,
    TeamConfiguration,
    ReconfigureUser,
    ConfigureTeam,
    Help,
}

struct Trigger {
    phrase: &'static str,
    scopes: &'static [MessageScope],
    command: Command,
}

const DIRECT: &[MessageScope] = &[MessageScope::DirectMessage];

/// Checked in order; the first phrase found anywhere in the lowercased text wins.
const TRIGGERS: &[Trigger] = &[
    Trigger { phrase: ":gem:", scopes: &[MessageScope::Ambient], command: Command::AwardGem },
    Trigger {
        phrase: "leaderboard",
        scopes: &[MessageScope::DirectMention, MessageScope::DirectMessage],
        command: Command::Leaderboard,
    },
    Trigger { phrase: "clear gems", scopes: DIRECT, command: Command::ClearGems },
    Trigger { phrase: "add admin", scopes: DIRECT, command: Command::AddAdmin },
    Trigger { phrase: "list admin", scopes: DIRECT, command: Command::ListAdmins },
    Trigger { phrase: "remove admin", scopes: DIRECT, command: Command::RemoveAdmin },
    Trigger { phrase: "get reasons", scopes: DIRECT, command: Command::GetReasons },
    Trigger { phrase: "team configuration", scopes: DIRECT, command: Command::TeamConfiguration },
    Trigger { phrase: "reconfigure user", scopes: DIRECT, command: Command::ReconfigureUser },
    Trigger { phrase: "configure team", scopes: DIRECT, command: Command::ConfigureTeam },
    Trigger { phrase: "help", scopes: DIRECT, command: Command::Help },
    Trigger { phrase: "all gems", scopes: DIRECT, command: Command::AllGems },
];

pub fn classify(scope: MessageScope, text: &str) -> Option<Command> {
    let lowered = text.to_lowercase();
    TRIGGERS
        .iter()
        .find(|trigger| trigger.scopes.contains(&scope) && lowered.contains(trigger.phrase))
        .map(|trigger| trigger.command)
}

pub const UNCONFIGURED_MESSAGE: &str = "You are not configured in Gemification. Please talk to a Gemification admin and have them configure you.";

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwardGem => "award_gem",
            Self::Leaderboard => "leaderboard",
            Self::AllGems => "all_gems",
            Self::ClearGems => "clear_gems",
            Self::AddAdmin => "add_admin",
            Self::RemoveAdmin => "remove_admin",
            Self::ListAdmins => "list_admins",
            Self::GetReasons => "get_reasons",
            Self::TeamConfiguration => "team_configuration",
            Self::ReconfigureUser => "reconfigure_user",
            Self::ConfigureTeam => "configure_team",
            Self::Help => "help",
        }
    }

    pub fn requirement(&self) -> Requirement {
        match self {
            Self::AwardGem | Self::Leaderboard | Self::ListAdmins | Self::Help => {
                Requirement::Configured
            }
            Self::AllGems
            | Self::ClearGems
            | Self::AddAdmin
            | Self::RemoveAdmin
            | Self::GetReasons
            | Self::TeamConfiguration
            | Self::ReconfigureUser
            | Self::ConfigureTeam => Requirement::Admin,
        }
    }

    /// Reply for a configured non-admin; `None` for commands open to every configured user.
    pub fn denial_message(&self) -> Option<String> {
        let action = match self {
            Self::ClearGems => "reset the gem count",
            Self::AddAdmin => "add new admins",
            Self::RemoveAdmin => "remove admins",
            Self::GetReasons => "get the reasons for Gemification leaders",
            Self::TeamConfiguration => "view the team configuration",
            Self::ReconfigureUser => "reconfigure users",
            Self::AllGems => "list all gems",
            Self::ConfigureTeam => "configure the team",
            Self::AwardGem | Self::Leaderboard | Self::ListAdmins | Self::Help => return None,
        };
        Some(format!("Nice try, wise guy, but you aren't an admin. Only admins can {action}. :angry:"))
    }
}

const HELP_HEADER: &str = "Need some help? We all do sometimes...\nHere are a list of commands that you can use to interact with Gemification:\n\n";

const PUBLIC_COMMANDS: &[(&str, &str)] = &[
    ("How to give someone a gem :gem:", "Type `:gem: [@username] for [reason]`"),
    (
        "How to show the leaderboard",
        "In a direct message to Gemification, type `leaderboard`\nIn a channel, type `@gemification leaderboard`",
    ),
];

const ADMIN_COMMANDS: &[(&str, &str)] = &[
    ("How to clear the gem leaderboard", "type `clear gems`"),
    ("How to list the current admins in Gemification", "type `list admins`"),
    ("How to add an admin to Gemification", "type `add admin` and follow the prompts"),
    ("How to remove an admin from Gemification", "type `remove admin` and follow the prompts"),
    ("Get a full list of gems given in the current time period.", "type `all gems`"),
    ("Show a list of gem statement reasons for a Gemification user.", "type `get reasons @slackuser`"),
    (
        "List all of the Gemification user and which group they are assigned to.",
        "type `team configuration`",
    ),
    ("Reconfigure a user to a different Gemification group.", "type `reconfigure user`"),
];

pub fn help_text(is_admin: bool) -> String {
    let mut help = HELP_HEADER.to_owned();
    if is_admin {
        help.push_str("*Public commands*\n");
    }
    for (index, (title, usage)) in PUBLIC_COMMANDS.iter().enumerate() {
        help.push_str(&format!("{}) {title}\n{usage}\n\n", index + 1));
    }
    if is_admin {
        help.push_str("*Admin commands (these can only be run if you're an admin)*\n");
        for (index, (title, usage)) in ADMIN_COMMANDS.iter().enumerate() {
            help.push_str(&format!(
                "{}) {title}\nIn a direct message to Gemification, {usage}\n\n",
                index + 1
            ));
        }
    }
    help
}

#[cfg(test)]
mod tests {
    use super::{classify, help_text, Command, MessageScope};
    use crate::guard::Requirement;

    #[test]
    fn gem_token_is_only_heard_in_channels() {
        assert_eq!(
            classify(MessageScope::Ambient, ":gem: <@U2> for shipping the release"),
            Some(Command::AwardGem)
        );
        assert_eq!(classify(MessageScope::DirectMessage, ":gem: <@U2> for shipping"), None);
        assert_eq!(classify(MessageScope::Ambient, "what's on the leaderboard?"), None);
    }

    #[test]
    fn leaderboard_is_heard_in_mentions_and_direct_messages() {
        assert_eq!(
            classify(MessageScope::DirectMention, "<@B1> Leaderboard please"),
            Some(Command::Leaderboard)
        );
        assert_eq!(classify(MessageScope::DirectMessage, "leaderboard"), Some(Command::Leaderboard));
        assert_eq!(classify(MessageScope::DirectMention, "clear gems"), None);
    }

    #[test]
    fn direct_message_phrases_map_to_commands() {
        let cases = [
            ("clear gems", Command::ClearGems),
            ("add admin", Command::AddAdmin),
            ("list admins", Command::ListAdmins),
            ("list admin", Command::ListAdmins),
            ("remove admin", Command::RemoveAdmin),
            ("get reasons <@U2>", Command::GetReasons),
            ("Team Configuration", Command::TeamConfiguration),
            ("reconfigure user", Command::ReconfigureUser),
            ("configure team", Command::ConfigureTeam),
            ("help", Command::Help),
            ("all gems", Command::AllGems),
        ];
        for (text, expected) in cases {
            assert_eq!(classify(MessageScope::DirectMessage, text), Some(expected), "{text}");
        }
        assert_eq!(classify(MessageScope::DirectMessage, "good morning"), None);
    }

    #[test]
    fn admin_commands_carry_their_own_denial() {
        assert_eq!(Command::Leaderboard.requirement(), Requirement::Configured);
        assert_eq!(Command::ListAdmins.denial_message(), None);
        assert_eq!(Command::ClearGems.requirement(), Requirement::Admin);
        assert_eq!(
            Command::ClearGems.denial_message().as_deref(),
            Some("Nice try, wise guy, but you aren't an admin. Only admins can reset the gem count. :angry:")
        );
    }

    #[test]
    fn admin_help_lists_both_sections() {
        let public = help_text(false);
        assert!(public.starts_with("Need some help? We all do sometimes..."));
        assert!(public.contains("1) How to give someone a gem :gem:"));
        assert!(!public.contains("*Admin commands"));

        let admin = help_text(true);
        assert!(admin.contains("*Public commands*\n1) How to give someone a gem"));
        assert!(admin.contains(
            "8) Reconfigure a user to a different Gemification group.\nIn a direct message to Gemification, type `reconfigure user`"
        ));
    }
}
