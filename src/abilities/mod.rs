//! Ability graphs: schema, node data and compiled runtime form

pub mod condition;
pub mod context;
pub mod effect;
pub mod graph;
pub mod runtime;
pub mod statics;
pub mod targeting;

pub use condition::{ActivationCost, ActivationLimit, Condition, Timing, TriggerFilter, TriggerSpec};
pub use context::{ChoiceValue, ResolveContext};
pub use effect::{Amount, Effect, EffectOutcome, EffectStatus};
pub use graph::{AbilityGraph, AbilityType, GraphEdge, GraphNode, NodeId, NodeType};
pub use runtime::{ResolutionReport, ResolutionStatus, RuntimeAbility};
pub use statics::{Affected, Layer, LayerOp, Modification, StaticEffect};
pub use targeting::{ControllerFilter, TargetKind, TargetRef, TargetRequirement, TargetSpec};
