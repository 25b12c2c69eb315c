use serde::{Deserialize, Serialize};

use crate::domain::gem::MAX_REASON_CHARS;
use crate::domain::user::SlackUserId;
use crate::mention::parse_mention;

pub const GEM_TOKEN: &str = ":gem:";

const REASON_MARKER: &str = "for ";

pub const SELF_AWARD_MESSAGE: &str = "Nice try, jackwagon. You can't give a gem to yourself. You may only give gems to other people in this channel.";

/// A parsed `:gem: @user for <reason>` utterance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemStatement {
    pub giver: SlackUserId,
    pub receiver: Option<SlackUserId>,
    pub reason: String,
}

impl GemStatement {
    pub fn parse(giver: SlackUserId, text: &str) -> Self {
        Self { giver, receiver: parse_mention(text), reason: extract_reason(text) }
    }
}

pub fn contains_gem_token(text: &str) -> bool {
    text.contains(GEM_TOKEN)
}

/// Text after the first ASCII case-insensitive `for `, trimmed; empty when absent.
pub fn extract_reason(text: &str) -> String {
    let lowered = text.to_ascii_lowercase();
    match lowered.find(REASON_MARKER) {
        Some(index) => text[index + REASON_MARKER.len()..].trim().to_owned(),
        None => String::new(),
    }
}

/// Lookups the processor performs before judging a statement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AwardFacts {
    pub receiver_in_channel: bool,
    pub receiver_configured: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AwardViolation {
    InvalidReceiver,
    MissingReason,
    GemInReason,
    UserInReason,
    ReceiverNotConfigured,
}

impl AwardViolation {
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidReceiver => "- you didn't type a valid gem receiver",
            Self::MissingReason => "- you didn't include a reason statement",
            Self::GemInReason => "- you typed gems in your reason statement",
            Self::UserInReason => "- you don't type users in your reason statement",
            Self::ReceiverNotConfigured => {
                "- the person you are trying to give a gem to isn't configured with Gemification. Talk to a Gemification admin to get them configured with Gemification."
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedAward {
    pub receiver: SlackUserId,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AwardVerdict {
    Accepted(AcceptedAward),
    Rejected(Vec<AwardViolation>),
    SelfAward,
}

/// Applies the award rules; every violated rule is reported, self-award only once the rest pass.
pub fn evaluate(statement: &GemStatement, facts: AwardFacts) -> AwardVerdict {
    let receiver = statement.receiver.as_ref();

    let mut violations = Vec::new();
    if receiver.is_none() || !facts.receiver_in_channel {
        violations.push(AwardViolation::InvalidReceiver);
    }
    if statement.reason.is_empty() {
        violations.push(AwardViolation::MissingReason);
    }
    if statement.reason.contains(GEM_TOKEN) {
        violations.push(AwardViolation::GemInReason);
    }
    if receiver.is_some_and(|receiver| statement.reason.contains(receiver.as_str())) {
        violations.push(AwardViolation::UserInReason);
    }
    if !facts.receiver_configured {
        violations.push(AwardViolation::ReceiverNotConfigured);
    }

    let Some(receiver) = receiver else {
        return AwardVerdict::Rejected(violations);
    };
    if !violations.is_empty() {
        return AwardVerdict::Rejected(violations);
    }
    if &statement.giver == receiver {
        return AwardVerdict::SelfAward;
    }

    AwardVerdict::Accepted(AcceptedAward {
        receiver: receiver.clone(),
        reason: truncated_reason(&statement.reason),
    })
}

pub fn truncated_reason(reason: &str) -> String {
    reason.chars().take(MAX_REASON_CHARS).collect()
}

pub fn rejection_message(giver: &SlackUserId, violations: &[AwardViolation]) -> String {
    let mut message =
        format!("Sorry, {}, there was an error in your gem statement because:\n", giver.mention());
    for violation in violations {
        message.push_str(violation.message());
        message.push('\n');
    }
    message.push_str(
        "Please type your gem statement using a valid username like this:\n:gem: [@username] for [reason]",
    );
    message
}

pub fn giver_confirmation(giver_name: &str, receiver_name: &str) -> String {
    format!("{giver_name}, you gave a gem to {receiver_name}!")
}

pub fn receiver_notification(giver_name: &str) -> String {
    format!("You have received a gem from {giver_name}!")
}

#[cfg(test)]
mod tests {
    use super::{
        evaluate, extract_reason, rejection_message, AcceptedAward, AwardFacts, AwardVerdict,
        AwardViolation, GemStatement,
    };
    use crate::domain::user::SlackUserId;

    const ALL_GOOD: AwardFacts = AwardFacts { receiver_in_channel: true, receiver_configured: true };

    fn statement(text: &str) -> GemStatement {
        GemStatement::parse(SlackUserId::new("U1"), text)
    }

    #[test]
    fn valid_statement_is_accepted() {
        let parsed = statement(":gem: <@U2> for helping with the demo");
        assert_eq!(parsed.reason, "helping with the demo");
        assert_eq!(
            evaluate(&parsed, ALL_GOOD),
            AwardVerdict::Accepted(AcceptedAward {
                receiver: SlackUserId::new("U2"),
                reason: "helping with the demo".to_owned(),
            })
        );
    }

    #[test]
    fn reason_marker_is_case_insensitive() {
        assert_eq!(extract_reason("<@U2> :gem: FOR the docs"), "the docs");
        assert_eq!(extract_reason("<@U2> :gem: For the docs"), "the docs");
        assert_eq!(extract_reason(":gem: <@U2>"), "");
    }

    #[test]
    fn every_violation_is_reported_in_order() {
        let parsed = statement(":gem: <@U2> for :gem: <@U2>");
        let facts = AwardFacts { receiver_in_channel: false, receiver_configured: false };
        assert_eq!(
            evaluate(&parsed, facts),
            AwardVerdict::Rejected(vec![
                AwardViolation::InvalidReceiver,
                AwardViolation::GemInReason,
                AwardViolation::UserInReason,
                AwardViolation::ReceiverNotConfigured,
            ])
        );
    }

    #[test]
    fn missing_reason_is_rejected() {
        assert_eq!(
            evaluate(&statement(":gem: <@U2>"), ALL_GOOD),
            AwardVerdict::Rejected(vec![AwardViolation::MissingReason])
        );
    }

    #[test]
    fn receiver_outside_channel_is_rejected_even_when_configured() {
        let facts = AwardFacts { receiver_in_channel: false, receiver_configured: true };
        assert_eq!(
            evaluate(&statement(":gem: <@U2> for the deploy"), facts),
            AwardVerdict::Rejected(vec![AwardViolation::InvalidReceiver])
        );
    }

    #[test]
    fn missing_receiver_still_runs_the_reason_checks() {
        assert_eq!(
            evaluate(&statement(":gem: great job"), AwardFacts::default()),
            AwardVerdict::Rejected(vec![
                AwardViolation::InvalidReceiver,
                AwardViolation::MissingReason,
                AwardViolation::ReceiverNotConfigured,
            ])
        );
        assert_eq!(
            evaluate(&statement(":gem: for :gem: work"), AwardFacts::default()),
            AwardVerdict::Rejected(vec![
                AwardViolation::InvalidReceiver,
                AwardViolation::GemInReason,
                AwardViolation::ReceiverNotConfigured,
            ])
        );
    }

    #[test]
    fn self_award_is_rejected_after_other_rules_pass() {
        assert_eq!(evaluate(&statement(":gem: <@U1> for being me"), ALL_GOOD), AwardVerdict::SelfAward);

        let invalid = evaluate(&statement(":gem: <@U1>"), ALL_GOOD);
        assert_eq!(invalid, AwardVerdict::Rejected(vec![AwardViolation::MissingReason]));
    }

    #[test]
    fn long_reasons_are_truncated() {
        let text = format!(":gem: <@U2> for {}", "x".repeat(400));
        match evaluate(&statement(&text), ALL_GOOD) {
            AwardVerdict::Accepted(award) => assert_eq!(award.reason.chars().count(), 250),
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[test]
    fn rejection_message_lists_lines_and_usage() {
        let message = rejection_message(
            &SlackUserId::new("U1"),
            &[AwardViolation::InvalidReceiver, AwardViolation::MissingReason],
        );
        assert_eq!(
            message,
            "Sorry, <@U1>, there was an error in your gem statement because:\n\
             - you didn't type a valid gem receiver\n\
             - you didn't include a reason statement\n\
             Please type your gem statement using a valid username like this:\n\
             :gem: [@username] for [reason]"
        );
    }
}
