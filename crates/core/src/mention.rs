//! Mention extraction from raw message text.
//!
//! Slack delivers mentions as `<@U024BE7LH>` or `<@U024BE7LH|bob>`; users typing by hand may also
//! produce `@U024BE7LH`. The first `@`-prefixed token wins.

use crate::domain::user::SlackUserId;

/// Returns the member id of the first mention-shaped token, if any.
pub fn parse_mention(text: &str) -> Option<SlackUserId> {
    let token = text.match_indices('@').find_map(|(start, _)| {
        let token = text[start + 1..].split(char::is_whitespace).next().unwrap_or_default();
        (!token.is_empty()).then_some(token)
    })?;
    let token = token.split(['>', '|']).next().unwrap_or_default();
    let id = token.trim_matches(|ch: char| !ch.is_ascii_alphanumeric());

    if id.is_empty() {
        return None;
    }
    Some(SlackUserId::new(id))
}
