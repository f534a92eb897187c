//! Game state, turn structure and the rules that drive them

/// Verbose logging that compiles away without the `verbose-logging` feature
///
/// The message is only formatted when the feature is on, so hot paths like
/// SBA sweeps and layer recomputation pay nothing for it otherwise.
macro_rules! log_if_verbose {
    ($logger:expr, $category:expr, $($arg:tt)*) => {
        #[cfg(feature = "verbose-logging")]
        {
            $logger.verbose($category, &format!($($arg)*));
        }
        #[cfg(not(feature = "verbose-logging"))]
        {
            let _ = &$logger;
        }
    };
}

pub mod combat;
pub mod damage;
pub mod events;
pub mod layers;
pub mod logger;
pub mod phase;
pub mod priority;
pub mod registry;
pub mod replacement;
pub mod resolver;
pub mod rules;
pub mod sba;
pub mod stack;
pub mod state;
pub mod targets;
pub mod turn;

pub use combat::{CombatDamagePass, CombatState, DamageAssignments};
pub use damage::DamageEvent;
pub use events::{EventBus, EventKind, GameEvent, PendingTrigger, SubscriptionId, TriggerHandler};
pub use logger::{GameLogger, LogEntry, OutputMode, VerbosityLevel};
pub use phase::{Phase, Step, TurnState};
pub use priority::{PassResult, PriorityManager};
pub use registry::AbilityRegistry;
pub use replacement::{event_key, DrawReplacement, ReplacementEffect, ReplacementEffects, ReplacementKind};
pub use rules::{CastOptions, CastQuote};
pub use stack::{Stack, StackItem, StackItemId, StackItemKind, StackPayload};
pub use state::GameState;
pub use targets::TargetCheck;
pub use turn::PriorityOutcome;
