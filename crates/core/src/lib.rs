pub mod award;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod mention;
pub mod reporting;

pub use award::{AwardFacts, AwardVerdict, AwardViolation, GemStatement};
pub use domain::gem::{GemPeriod, GemStanding, GemTransaction, NewGemAward};
pub use domain::group::{Group, GroupId, GroupName, GroupNameError};
pub use domain::team::{Installation, SlackTeamId, Team, TeamId};
pub use domain::user::{Member, Roster, SlackUserId, UserGem};
pub use errors::DomainError;
pub use flows::{DialogueEngine, DialogueError, DialogueKind, DialogueState};
