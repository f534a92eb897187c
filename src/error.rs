//! Error types for the rules engine

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RulesError {
    /// Not your priority, not the active player, wrong step, or a
    /// non-empty stack where an empty one is required.
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Illegal target: {0}")]
    IllegalTarget(String),

    #[error("Insufficient mana: {0}")]
    InsufficientMana(String),

    #[error("Missing payment choice: {0}")]
    MissingChoice(String),

    #[error("Limit reached: {0}")]
    LimitReached(String),

    /// More than one replacement effect applies to the event. The caller
    /// supplies `event_key -> effect_id` and retries.
    #[error("Replacement choice required for event '{event_key}'")]
    ReplacementChoiceRequired { event_key: String },

    #[error("Unhandled effect type: {0}")]
    UnhandledEffect(String),

    #[error("Object {0} has no mana ability")]
    NoManaAbility(u32),

    #[error("Entity not found: {0}")]
    EntityNotFound(u32),

    #[error("Invalid game action: {0}")]
    InvalidAction(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RulesError {
    fn from(err: serde_json::Error) -> Self {
        RulesError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RulesError>;
