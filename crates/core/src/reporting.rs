//! Plain-text renderings of leaderboards and admin reports.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::gem::GemTransaction;
use crate::domain::group::GroupName;
use crate::domain::user::SlackUserId;

pub const LEADERBOARD_LIMIT: usize = 10;

pub const CLEARED_MESSAGE: &str = "The leaderboard was cleared successfully. Now get out there and start earning yourself some gems! :gem:";

pub const INVALID_REASONS_TARGET: &str =
    "The username you entered isn't valid.\nProper usage: `get reasons @slackusername`";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub name: String,
    pub gems: i64,
}

/// Top entries by current gems; callers pass rows already sorted descending.
pub fn leaderboard(group: &GroupName, entries: &[RankedEntry]) -> String {
    if entries.is_empty() {
        return format!("The {group} leaderboard is empty. Try giving someone a :gem:!");
    }
    let lines = ranked_lines(entries.iter().take(LEADERBOARD_LIMIT));
    format!("{group} Leaderboard:\n{lines}")
}

pub fn all_gems(group: &GroupName, entries: &[RankedEntry]) -> String {
    if entries.is_empty() {
        return format!(
            "Nobody has received any gems yet in the {group} group. :sob: Try giving someone a :gem:!"
        );
    }
    format!("{group} All Gems Leaderboard:\n{}", ranked_lines(entries.iter()))
}

fn ranked_lines<'a>(entries: impl Iterator<Item = &'a RankedEntry>) -> String {
    entries
        .enumerate()
        .map(|(index, entry)| format!(">{}.) {} {}", index + 1, entry.name, entry.gems))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reasons a member received gems, newest first.
pub fn reasons(user: &SlackUserId, transactions: &[GemTransaction]) -> String {
    let mut report = format!(
        "Below are the Gem transaction reasons for {} from the last two gem periods.\n",
        user.mention()
    );
    if transactions.is_empty() {
        report.push_str(&format!("{} doesn't have any gems.", user.mention()));
        return report;
    }

    let lines = transactions
        .iter()
        .enumerate()
        .map(|(index, transaction)| {
            format!(
                ">{}.) {}\n>\t-given on {}",
                index + 1,
                transaction.reason,
                format_given_on(transaction.awarded_at)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    report.push_str(&lines);
    report
}

/// `Tuesday, March 5th, 2024, 3:07:09 PM`
pub fn format_given_on(timestamp: DateTime<Utc>) -> String {
    let day = timestamp.day();
    format!(
        "{}{}{}",
        timestamp.format("%A, %B %-d"),
        ordinal_suffix(day),
        timestamp.format(", %Y, %-I:%M:%S %p")
    )
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group: GroupName,
    pub members: Vec<SlackUserId>,
}

pub fn team_configuration(memberships: &[GroupMembership]) -> String {
    let mut report = format!(
        "Below is the current Gemification configuration for your team.\nYour team has {} groups. They are:\n",
        memberships.len()
    );
    let group_lines = memberships
        .iter()
        .enumerate()
        .map(|(index, membership)| format!(">{}.) {}", index + 1, membership.group))
        .collect::<Vec<_>>()
        .join("\n");
    report.push_str(&group_lines);

    for membership in memberships {
        report.push_str(&format!("\n\nUsers in {} group:\n", membership.group));
        let members = membership
            .members
            .iter()
            .map(|member| format!(">{}", member.mention()))
            .collect::<Vec<_>>()
            .join("\n");
        report.push_str(&members);
    }
    report
}

pub fn admin_list(admins: &[SlackUserId]) -> String {
    let mentions = admins.iter().map(SlackUserId::mention).collect::<Vec<_>>().join("\n");
    format!("List of current admins:\n{mentions}")
}
