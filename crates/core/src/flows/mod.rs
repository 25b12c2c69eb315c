pub mod engine;
pub mod notices;
pub mod states;

pub use engine::{interpret_answer, interpret_text, DialogueEngine, DialogueError, Interpretation};
pub use notices::{ChoiceValue, Notice, Prompt, PromptChoice};
pub use states::{
    AssignmentCursor, CandidateFacts, DialogueAction, DialogueEvent, DialogueKind,
    DialogueOpening, DialogueStart, DialogueState, GroupChoice, TransitionOutcome,
};
