//! Trigger registration
//!
//! Every triggered ability of a permanent is subscribed to its event while
//! the permanent is on the battlefield. Handlers only look at the event
//! payload; controller-relative filters are checked when pending triggers
//! are flushed, because handlers can't see the game state.

use crate::abilities::{ResolveContext, TriggerFilter};
use crate::core::{ObjectId, PlayerId};
use crate::game::events::{GameEvent, PendingTrigger, SubscriptionId, TriggerHandler};
use crate::game::stack::{StackItem, StackItemKind, StackPayload};
use crate::game::state::GameState;
use crate::Result;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;

/// Subscriptions owned by each object
#[derive(Debug, Clone, Default)]
pub struct AbilityRegistry {
    by_object: FxHashMap<ObjectId, SmallVec<[SubscriptionId; 2]>>,
}

impl AbilityRegistry {
    pub fn is_registered(&self, object: ObjectId) -> bool {
        self.by_object.contains_key(&object)
    }

    pub fn subscription_count(&self) -> usize {
        self.by_object.values().map(|subs| subs.len()).sum()
    }
}

impl GameState {
    /// Subscribe the triggered abilities of a permanent
    pub(crate) fn register_object_triggers(&mut self, id: ObjectId) -> Result<()> {
        self.unregister_object_triggers(id);
        let triggered: Vec<_> = self
            .object(id)?
            .abilities
            .iter()
            .filter_map(|ability| ability.trigger.map(|spec| (spec, Arc::clone(ability))))
            .collect();

        let mut subscriptions = SmallVec::new();
        for (spec, ability) in triggered {
            let filter = spec.filter;
            let handler: TriggerHandler = Arc::new(move |event: &GameEvent| {
                let fires = match filter {
                    TriggerFilter::SelfObject => event.object_id == Some(id),
                    TriggerFilter::Another => event.object_id.is_some_and(|o| o != id),
                    TriggerFilter::Any | TriggerFilter::You | TriggerFilter::Opponent => true,
                };
                fires.then(|| PendingTrigger {
                    source_id: id,
                    ability: Arc::clone(&ability),
                    filter,
                    event: event.clone(),
                })
            });
            subscriptions.push(self.events.subscribe(spec.event, handler));
        }
        if !subscriptions.is_empty() {
            log_if_verbose!(
                self.logger,
                "trigger",
                "{} registered {} trigger(s)",
                self.object(id)?.name(),
                subscriptions.len()
            );
            self.registry.by_object.insert(id, subscriptions);
        }
        Ok(())
    }

    pub(crate) fn unregister_object_triggers(&mut self, id: ObjectId) {
        if let Some(subscriptions) = self.registry.by_object.remove(&id) {
            for subscription in subscriptions {
                self.events.unsubscribe(subscription);
            }
        }
    }

    /// Rebuild every subscription from the battlefield, e.g. after the
    /// state was deserialized
    pub fn register_all_triggers(&mut self) -> Result<()> {
        self.events = Default::default();
        self.registry = AbilityRegistry::default();
        for id in self.battlefield.cards.clone() {
            self.register_object_triggers(id)?;
        }
        Ok(())
    }

    /// Who controls a trigger: the source's controller when the event
    /// happened if the event is about the source, else its current
    /// controller
    fn trigger_controller(&self, trigger: &PendingTrigger) -> Option<PlayerId> {
        if trigger.event.object_id == Some(trigger.source_id) {
            if let Some(controller) = trigger.event.controller_id {
                return Some(controller);
            }
        }
        self.object(trigger.source_id).ok().map(|o| o.controller)
    }

    /// Put pending triggers on the stack in APNAP order: the active
    /// player's triggers go on first (so they resolve last), then each other
    /// player in turn order. Each player's triggers keep event order.
    pub(crate) fn flush_pending_triggers(&mut self) -> Result<usize> {
        let pending = self.events.take_pending();
        if pending.is_empty() {
            return Ok(0);
        }

        let mut ready: Vec<(PlayerId, PendingTrigger)> = Vec::with_capacity(pending.len());
        for trigger in pending {
            let Some(controller) = self.trigger_controller(&trigger) else {
                continue;
            };
            if !self.player(controller).is_ok_and(|p| p.is_active()) {
                continue;
            }
            let subject = trigger.event.subject_player();
            let keep = match trigger.filter {
                TriggerFilter::You => subject == Some(controller),
                TriggerFilter::Opponent => subject.is_some_and(|p| p != controller),
                _ => true,
            };
            if keep {
                ready.push((controller, trigger));
            }
        }

        let active = self.turn.active_player;
        let mut apnap = vec![active];
        apnap.extend(self.opponents(active));

        let mut pushed = 0;
        for player in apnap {
            for (_, trigger) in ready.iter().filter(|(c, _)| *c == player) {
                let context = ResolveContext {
                    source_id: Some(trigger.source_id),
                    controller_id: Some(player),
                    triggering_source_id: trigger.event.object_id,
                    ..ResolveContext::default()
                };
                let item = StackItem {
                    id: self.next_id(),
                    kind: StackItemKind::TriggeredAbility,
                    controller: player,
                    payload: StackPayload::Ability {
                        source: Some(trigger.source_id),
                        ability: Arc::clone(&trigger.ability),
                        context,
                    },
                };
                self.logger.normal(
                    "trigger",
                    &format!(
                        "{} triggers on {}",
                        self.object(trigger.source_id).map_or("?", |o| o.name()),
                        trigger.event.kind
                    ),
                );
                self.stack.push(item);
                pushed += 1;
            }
        }
        Ok(pushed)
    }
}
