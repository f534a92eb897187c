//! Game events and the synchronous event bus

use crate::abilities::{RuntimeAbility, TriggerFilter};
use crate::core::{ObjectId, PlayerId};
use crate::game::phase::Step;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BeginStep,
    EndStep,
    Untap,
    Upkeep,
    DrawCard,
    BeginCombat,
    Attacks,
    Blocks,
    CombatDamage,
    EndCombat,
    SpellCast,
    EntersBattlefield,
    LeavesBattlefield,
    Dies,
    Cleanup,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(f, "{text}")
    }
}

/// A published event. Object events carry `object_id`, player events carry
/// `player_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub kind: EventKind,
    pub object_id: Option<ObjectId>,
    pub player_id: Option<PlayerId>,
    /// Controller of the object when the event happened
    pub controller_id: Option<PlayerId>,
    /// Damage source, attacked object, blocked attacker and similar
    pub source_id: Option<ObjectId>,
    pub amount: Option<i32>,
    pub step: Option<Step>,
}

impl GameEvent {
    pub fn object(kind: EventKind, object_id: ObjectId, controller_id: PlayerId) -> Self {
        GameEvent {
            kind,
            object_id: Some(object_id),
            player_id: None,
            controller_id: Some(controller_id),
            source_id: None,
            amount: None,
            step: None,
        }
    }

    pub fn player(kind: EventKind, player_id: PlayerId) -> Self {
        GameEvent {
            kind,
            object_id: None,
            player_id: Some(player_id),
            controller_id: None,
            source_id: None,
            amount: None,
            step: None,
        }
    }

    pub fn with_object(mut self, object_id: ObjectId) -> Self {
        self.object_id = Some(object_id);
        self
    }

    pub fn with_source(mut self, source_id: ObjectId) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn with_player(mut self, player_id: PlayerId) -> Self {
        self.player_id = Some(player_id);
        self
    }

    pub fn with_amount(mut self, amount: i32) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.step = Some(step);
        self
    }

    /// The player the event is about: its player, or the object's controller
    pub fn subject_player(&self) -> Option<PlayerId> {
        self.player_id.or(self.controller_id)
    }
}

/// A triggered ability waiting to be put on the stack
#[derive(Debug, Clone)]
pub struct PendingTrigger {
    pub source_id: ObjectId,
    pub ability: Arc<RuntimeAbility>,
    pub filter: TriggerFilter,
    pub event: GameEvent,
}

pub type TriggerHandler = Arc<dyn Fn(&GameEvent) -> Option<PendingTrigger> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    handler: TriggerHandler,
}

/// Handlers run synchronously on publish. They never mutate state; they
/// queue pending triggers that the game flushes onto the stack.
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
    pending: Vec<PendingTrigger>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, kind: EventKind, handler: TriggerHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, kind, handler });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Run every handler subscribed to the event's kind, in subscription
    /// order. Returns how many triggers were queued.
    pub fn publish(&mut self, event: &GameEvent) -> usize {
        let before = self.pending.len();
        for subscription in &self.subscriptions {
            if subscription.kind == event.kind {
                if let Some(trigger) = (subscription.handler)(event) {
                    self.pending.push(trigger);
                }
            }
        }
        self.pending.len() - before
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_pending(&mut self) -> Vec<PendingTrigger> {
        std::mem::take(&mut self.pending)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
