//! Main game state structure

use crate::config::RulesConfig;
use crate::core::{
    CardDefinition, CounterType, EffectStamp, EntityId, EntityStore, Face, GameObject, ObjectId,
    PlayerId, PlayerState,
};
use crate::game::events::{EventBus, EventKind, GameEvent};
use crate::game::logger::GameLogger;
use crate::game::phase::TurnState;
use crate::game::registry::AbilityRegistry;
use crate::game::replacement::{DrawReplacement, ReplacementEffect, ReplacementEffects};
use crate::game::stack::Stack;
use crate::zones::{CardZone, PlayerZones, Zone};
use crate::{Result, RulesError};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Complete game state
///
/// This is the central structure that holds all game information. It is
/// cheap enough to clone that every public action snapshots it and rolls
/// back on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub config: RulesConfig,

    /// Every card, token and copy in the game, in any zone
    pub objects: EntityStore<GameObject>,

    /// All players in seating order
    pub players: Vec<PlayerState>,

    /// Zones for each player
    pub player_zones: Vec<(PlayerId, PlayerZones)>,

    /// Shared battlefield (all players)
    pub battlefield: CardZone,

    pub stack: Stack,

    pub turn: TurnState,

    /// Attached object (Aura, Equipment) -> host
    pub attachments: BTreeMap<ObjectId, ObjectId>,

    pub replacements: ReplacementEffects,

    /// Every event published this game, oldest first
    pub event_log: Vec<GameEvent>,

    /// Random number generator (serializable for deterministic replay)
    pub rng: ChaCha12Rng,

    /// Unified entity ID generator (shared across all entity types)
    next_entity_id: u32,

    /// Game-wide ordering for timestamps
    sequence: u64,

    /// Trigger subscriptions; rebuilt by `register_all_triggers` after
    /// deserializing
    #[serde(skip)]
    pub(crate) events: EventBus,

    #[serde(skip)]
    pub(crate) registry: AbilityRegistry,

    /// Centralized logger for game events
    pub logger: GameLogger,
}

impl GameState {
    /// Create a game with one player per name, seated in the given order
    pub fn new(player_names: &[&str], config: RulesConfig) -> Self {
        let mut next_id = 0;
        let mut players = Vec::with_capacity(player_names.len());
        let mut player_zones = Vec::with_capacity(player_names.len());
        for name in player_names {
            let id = PlayerId::new(next_id);
            next_id += 1;
            let mut player = PlayerState::new(id, *name, config.starting_life);
            player.land_plays_allowed = config.land_plays_per_turn;
            players.push(player);
            player_zones.push((id, PlayerZones::new(id)));
        }

        // The battlefield belongs to nobody but zones need an owner id
        let shared_id = PlayerId::new(next_id);
        next_id += 1;

        let order = players.iter().map(|p| p.id).collect();
        GameState {
            objects: EntityStore::new(),
            players,
            player_zones,
            battlefield: CardZone::new(Zone::Battlefield, shared_id),
            stack: Stack::new(),
            turn: TurnState::new(order),
            attachments: BTreeMap::new(),
            replacements: ReplacementEffects::new(),
            event_log: Vec::new(),
            rng: ChaCha12Rng::seed_from_u64(config.rng_seed),
            next_entity_id: next_id,
            sequence: 0,
            events: EventBus::new(),
            registry: AbilityRegistry::default(),
            logger: GameLogger::new(),
            config,
        }
    }

    /// Create a new game with two players
    pub fn new_two_player(player1: &str, player2: &str, config: RulesConfig) -> Self {
        GameState::new(&[player1, player2], config)
    }

    /// Get next entity ID (unified across all entity types)
    pub(crate) fn next_id<T>(&mut self) -> EntityId<T> {
        let id = EntityId::new(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    pub(crate) fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    pub(crate) fn stamp(&mut self) -> EffectStamp {
        EffectStamp {
            turn: self.turn.turn_number,
            sequence: self.next_sequence(),
        }
    }

    pub fn player(&self, id: PlayerId) -> Result<&PlayerState> {
        self.players
            .iter()
            .find(|p| p.id == id)
            .ok_or(RulesError::EntityNotFound(id.as_u32()))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut PlayerState> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RulesError::EntityNotFound(id.as_u32()))
    }

    /// Players still in the game, in seating order
    pub fn active_player_ids(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.id)
            .collect()
    }

    /// Remaining opponents of `player`, in turn order starting after them
    pub fn opponents(&self, player: PlayerId) -> Vec<PlayerId> {
        let start = self.players.iter().position(|p| p.id == player).unwrap_or(0);
        (1..self.players.len())
            .map(|offset| &self.players[(start + offset) % self.players.len()])
            .filter(|p| p.is_active() && p.id != player)
            .map(|p| p.id)
            .collect()
    }

    pub fn object(&self, id: ObjectId) -> Result<&GameObject> {
        self.objects.get(id)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut GameObject> {
        self.objects.get_mut(id)
    }

    pub fn zones(&self, player: PlayerId) -> Result<&PlayerZones> {
        self.player_zones
            .iter()
            .find(|(id, _)| *id == player)
            .map(|(_, zones)| zones)
            .ok_or(RulesError::EntityNotFound(player.as_u32()))
    }

    pub fn zones_mut(&mut self, player: PlayerId) -> Result<&mut PlayerZones> {
        self.player_zones
            .iter_mut()
            .find(|(id, _)| *id == player)
            .map(|(_, zones)| zones)
            .ok_or(RulesError::EntityNotFound(player.as_u32()))
    }

    /// Ids in one of a player's zones. For the battlefield, the permanents
    /// the player controls.
    pub fn zone_cards(&self, player: PlayerId, zone: Zone) -> Result<Vec<ObjectId>> {
        match zone {
            Zone::Battlefield => Ok(self.permanents_controlled_by(player)),
            Zone::Stack => Ok(self
                .stack
                .iter()
                .filter(|item| item.controller == player && item.is_spell())
                .filter_map(|item| item.source())
                .collect()),
            other => Ok(self
                .zones(player)?
                .get_zone(other)
                .map(|z| z.cards.clone())
                .unwrap_or_default()),
        }
    }

    pub fn permanents_controlled_by(&self, player: PlayerId) -> Vec<ObjectId> {
        self.battlefield
            .cards
            .iter()
            .copied()
            .filter(|id| self.objects.get(*id).is_ok_and(|o| o.controller == player))
            .collect()
    }

    pub fn attached_to(&self, object: ObjectId) -> Option<ObjectId> {
        self.attachments.get(&object).copied()
    }

    pub fn attached_objects(&self, host: ObjectId) -> Vec<ObjectId> {
        self.attachments
            .iter()
            .filter(|(_, h)| **h == host)
            .map(|(attached, _)| *attached)
            .collect()
    }

    /// Attach an Aura or Equipment to a permanent. Legality of the host is
    /// checked by state-based actions.
    pub fn attach(&mut self, object: ObjectId, host: ObjectId) -> Result<()> {
        for id in [object, host] {
            if self.object(id)?.zone != Zone::Battlefield {
                return Err(RulesError::IllegalTarget(format!("{id} is not on the battlefield")));
            }
        }
        if object == host {
            return Err(RulesError::IllegalTarget(format!("{object} can't attach to itself")));
        }
        self.attachments.insert(object, host);
        log_if_verbose!(self.logger, "zone", "{object} attached to {host}");
        Ok(())
    }

    /// Create a card from its definition directly in a zone. Objects placed
    /// on the battlefield this way don't trigger enter-the-battlefield
    /// abilities.
    pub fn create_object(&mut self, def: &CardDefinition, owner: PlayerId, zone: Zone) -> Result<ObjectId> {
        if zone == Zone::Stack {
            return Err(RulesError::InvalidAction(
                "objects reach the stack by being cast".to_string(),
            ));
        }
        self.player(owner)?;
        let face = def.build_face()?;
        let back = def
            .back_face
            .as_ref()
            .map(|back| back.build_face())
            .transpose()?;

        let id = self.next_id();
        let mut obj = GameObject::new(id, owner, face, zone);
        obj.back_face = back.map(Box::new);
        obj.timestamp = self.next_sequence();
        self.objects.insert(id, obj);

        if zone == Zone::Battlefield {
            self.battlefield.add(id);
            self.prepare_for_battlefield(id)?;
            self.register_object_triggers(id)?;
        } else if let Some(list) = self.zones_mut(owner)?.get_zone_mut(zone) {
            list.add(id);
        }
        log_if_verbose!(self.logger, "zone", "created {} ({id}) in {zone}", def.name);
        Ok(id)
    }

    /// Create a token under `controller`'s control. It enters the
    /// battlefield like any permanent.
    pub fn create_token(&mut self, def: &CardDefinition, controller: PlayerId) -> Result<ObjectId> {
        self.player(controller)?;
        let face = def.build_face()?;
        self.put_token(face, controller)
    }

    /// A token copy of an object's printed face
    pub fn create_token_copy(&mut self, source: ObjectId, controller: PlayerId) -> Result<ObjectId> {
        let obj = self.object(source)?;
        let face = Face {
            characteristics: obj.base.clone(),
            abilities: obj.abilities.clone(),
        };
        self.put_token(face, controller)
    }

    fn put_token(&mut self, face: Face, controller: PlayerId) -> Result<ObjectId> {
        let id = self.next_id();
        let mut obj = GameObject::new(id, controller, face, Zone::Battlefield);
        obj.is_token = true;
        self.objects.insert(id, obj);
        self.battlefield.add(id);
        self.enter_battlefield(id)?;
        log_if_verbose!(self.logger, "zone", "token {} ({id}) created", self.object(id)?.name());
        Ok(id)
    }

    /// Make an object in the command zone a player's commander
    pub fn set_commander(&mut self, player: PlayerId, object: ObjectId) -> Result<()> {
        let obj = self.object(object)?;
        if obj.owner != player {
            return Err(RulesError::InvalidAction(format!(
                "{} is not owned by player {player}",
                obj.name()
            )));
        }
        self.player_mut(player)?.commander_id = Some(object);
        Ok(())
    }

    fn prepare_for_battlefield(&mut self, id: ObjectId) -> Result<()> {
        // Permanents set up before the game starts count as entering on turn 0
        let turn = if self.turn.started { self.turn.turn_number } else { 0 };
        let timestamp = self.next_sequence();
        let obj = self.objects.get_mut(id)?;
        obj.entered_turn = Some(turn);
        obj.timestamp = timestamp;
        // MTG Rules 306.5b: a planeswalker enters with its printed loyalty
        if let Some(loyalty) = obj.base.loyalty.filter(|l| *l > 0) {
            obj.add_counters(CounterType::loyalty(), loyalty as u32);
        }
        Ok(())
    }

    fn enter_battlefield(&mut self, id: ObjectId) -> Result<()> {
        self.prepare_for_battlefield(id)?;
        self.register_object_triggers(id)?;
        let controller = self.object(id)?.controller;
        self.publish(GameEvent::object(EventKind::EntersBattlefield, id, controller));
        Ok(())
    }

    /// Take an object out of its current zone list
    fn detach_from_zone(&mut self, id: ObjectId, from: Zone, owner: PlayerId) -> Result<()> {
        match from {
            Zone::Battlefield => {
                self.battlefield.remove(id);
            }
            Zone::Stack => {}
            other => {
                if let Some(list) = self.zones_mut(owner)?.get_zone_mut(other) {
                    list.remove(id);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn remove_from_combat(&mut self, id: ObjectId) {
        if let Some(combat) = self.turn.combat.as_mut() {
            combat.remove_creature(id);
        }
        if let Ok(obj) = self.objects.get_mut(id) {
            obj.status.is_attacking = false;
            obj.status.is_blocking = false;
        }
    }

    /// Move an object to another zone, applying zone-change replacements.
    /// Cards always go to their owner's zones. Returns the zone the object
    /// actually ended up in.
    ///
    /// The object keeps its id; every status, counter and temporary effect
    /// is forgotten.
    pub fn move_object(&mut self, id: ObjectId, to: Zone) -> Result<Zone> {
        self.relocate(id, to, None)
    }

    /// Put an object onto the battlefield under `controller`, as a resolving
    /// permanent spell or a `put_onto_battlefield` effect does
    pub fn put_onto_battlefield(&mut self, id: ObjectId, controller: PlayerId) -> Result<Zone> {
        self.relocate(id, Zone::Battlefield, Some(controller))
    }

    fn relocate(&mut self, id: ObjectId, to: Zone, new_controller: Option<PlayerId>) -> Result<Zone> {
        let (from, owner, controller, was_creature) = {
            let obj = self.object(id)?;
            (obj.zone, obj.owner, obj.controller, obj.is_creature())
        };
        let to = self.replacements.replace_zone_change(id, from, to)?;
        if from == to {
            return Ok(to);
        }

        self.detach_from_zone(id, from, owner)?;
        if from == Zone::Battlefield {
            self.remove_from_combat(id);
            self.attachments.remove(&id);
            // Leaves-the-battlefield abilities look back in time, so the
            // object's own triggers still hear these events
            self.publish(GameEvent::object(EventKind::LeavesBattlefield, id, controller));
            if to == Zone::Graveyard && was_creature {
                self.publish(GameEvent::object(EventKind::Dies, id, controller));
            }
            self.unregister_object_triggers(id);
        }

        let timestamp = self.next_sequence();
        {
            let obj = self.objects.get_mut(id)?;
            obj.reset_for_zone_change();
            if let Some(c) = new_controller.filter(|_| to == Zone::Battlefield) {
                obj.controller = c;
                obj.base_controller = c;
            }
            obj.zone = to;
            obj.timestamp = timestamp;
            obj.entered_turn = None;
        }

        match to {
            Zone::Battlefield => {
                self.battlefield.add(id);
                self.enter_battlefield(id)?;
            }
            Zone::Stack => {}
            other => {
                if let Some(list) = self.zones_mut(owner)?.get_zone_mut(other) {
                    list.add(id);
                }
            }
        }
        log_if_verbose!(self.logger, "zone", "{} ({id}): {from} -> {to}", self.object(id)?.name());
        Ok(to)
    }

    /// Give an object a fresh id, as a new object would get. Used when a
    /// permanent is flickered.
    pub(crate) fn rekey_object(&mut self, id: ObjectId) -> Result<ObjectId> {
        let mut obj = self
            .objects
            .remove(id)
            .ok_or(RulesError::EntityNotFound(id.as_u32()))?;
        let new_id: ObjectId = self.next_id();
        obj.id = new_id;
        let (owner, zone) = (obj.owner, obj.zone);
        self.objects.insert(new_id, obj);

        let list = match zone {
            Zone::Battlefield => Some(&mut self.battlefield),
            other => self.zones_mut(owner)?.get_zone_mut(other),
        };
        if let Some(list) = list {
            list.replace(id, new_id);
        }
        for player in &mut self.players {
            if player.commander_id == Some(id) {
                player.commander_id = Some(new_id);
            }
        }
        Ok(new_id)
    }

    /// Draw the top card of a player's library. Drawing from an empty
    /// library marks the player for the state-based loss check.
    pub fn draw_card(&mut self, player: PlayerId) -> Result<Option<ObjectId>> {
        match self.replacements.replace_draw(player)? {
            Some(DrawReplacement::Skip) => {
                self.logger.normal("draw", &format!("player {player}'s draw was skipped"));
                return Ok(None);
            }
            Some(DrawReplacement::Mill(count)) => {
                self.mill(player, count as usize)?;
                return Ok(None);
            }
            None => {}
        }

        let Some(card) = self.zones(player)?.library.peek_top() else {
            self.player_mut(player)?.drew_from_empty_library = true;
            self.logger
                .normal("draw", &format!("player {player} drew from an empty library"));
            return Ok(None);
        };
        self.move_object(card, Zone::Hand)?;
        self.publish(GameEvent::player(EventKind::DrawCard, player).with_object(card));
        Ok(Some(card))
    }

    /// Put the top cards of a library into the graveyard
    pub fn mill(&mut self, player: PlayerId, count: usize) -> Result<Vec<ObjectId>> {
        let cards = self.zones(player)?.library.top_n(count);
        for card in &cards {
            self.move_object(*card, Zone::Graveyard)?;
        }
        Ok(cards)
    }

    /// Shuffle a player's library using the game's RNG
    pub fn shuffle_library(&mut self, player: PlayerId) -> Result<()> {
        let zones = self
            .player_zones
            .iter_mut()
            .find(|(id, _)| *id == player)
            .map(|(_, zones)| zones)
            .ok_or(RulesError::EntityNotFound(player.as_u32()))?;
        zones.library.shuffle(&mut self.rng);
        Ok(())
    }

    /// Record an event and run its subscribers
    pub fn publish(&mut self, event: GameEvent) {
        log_if_verbose!(self.logger, "event", "{} {:?}", event.kind, event.object_id);
        self.events.publish(&event);
        self.event_log.push(event);
    }

    pub fn add_replacement_effect(&mut self, effect: ReplacementEffect) {
        let timestamp = self.next_sequence();
        self.logger.normal(
            "replacement",
            &format!("added {} effect '{}'", effect.kind, effect.effect_id),
        );
        self.replacements.add(effect, timestamp);
    }

    /// Bring the game to a consistent point after any mutation: recompute
    /// continuous effects, sweep state-based actions and put waiting
    /// triggers on the stack.
    pub fn settle(&mut self) -> Result<()> {
        self.check_state_based_actions()?;
        self.flush_pending_triggers()?;
        Ok(())
    }

    /// Run an action against the state and roll every change back if it
    /// fails. The log survives the rollback.
    pub(crate) fn transactional<T>(
        &mut self,
        action: impl FnOnce(&mut GameState) -> Result<T>,
    ) -> Result<T> {
        let snapshot = self.clone();
        match action(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                let logger = std::mem::take(&mut self.logger);
                *self = snapshot;
                self.logger = logger;
                self.logger.normal("rules", &format!("rejected: {err}"));
                Err(err)
            }
        }
    }

    /// The last player standing
    pub fn winner(&self) -> Option<PlayerId> {
        match self.active_player_ids().as_slice() {
            [only] if self.players.len() > 1 => Some(*only),
            _ => None,
        }
    }

    pub fn is_game_over(&self) -> bool {
        let remaining = self.active_player_ids().len();
        remaining == 0 || (self.players.len() > 1 && remaining == 1)
    }

    /// Check the invariants that hold after every action: every object is
    /// listed in exactly the zone it claims, no permanent has both +1/+1 and
    /// -1/-1 counters, the legend rule holds, players who meet a loss
    /// condition have lost, and every attachment has a host.
    pub fn check_invariants(&self) -> Result<()> {
        let broken = |msg: String| Err(RulesError::InvalidAction(format!("invariant: {msg}")));

        let mut listed: BTreeMap<ObjectId, usize> = BTreeMap::new();
        for id in &self.battlefield.cards {
            *listed.entry(*id).or_default() += 1;
            if self.object(*id)?.zone != Zone::Battlefield {
                return broken(format!("{id} is listed on the battlefield"));
            }
        }
        for (owner, zones) in &self.player_zones {
            for zone in [Zone::Library, Zone::Hand, Zone::Graveyard, Zone::Exile, Zone::Command] {
                let Some(list) = zones.get_zone(zone) else {
                    continue;
                };
                for id in &list.cards {
                    *listed.entry(*id).or_default() += 1;
                    let obj = self.object(*id)?;
                    if obj.zone != zone || obj.owner != *owner {
                        return broken(format!("{id} is listed in player {owner}'s {zone}"));
                    }
                }
            }
        }
        for (id, obj) in self.objects.iter() {
            let count = listed.get(id).copied().unwrap_or(0);
            let expected = usize::from(obj.zone != Zone::Stack);
            if count != expected {
                return broken(format!("{id} in {} is listed {count} times", obj.zone));
            }
            if obj.zone == Zone::Stack && !self.stack.iter().any(|i| i.source() == Some(*id) && i.is_spell()) {
                return broken(format!("{id} is on the stack without a spell"));
            }
        }

        let mut legends: BTreeMap<(PlayerId, &str), ObjectId> = BTreeMap::new();
        for id in &self.battlefield.cards {
            let obj = self.object(*id)?;
            if obj.counter(&CounterType::plus_one()) > 0 && obj.counter(&CounterType::minus_one()) > 0 {
                return broken(format!("{id} has both +1/+1 and -1/-1 counters"));
            }
            if obj.is_legendary() && !obj.status.phased_out {
                if let Some(other) = legends.insert((obj.controller, obj.name()), *id) {
                    return broken(format!("legendary {} twice ({other}, {id})", obj.name()));
                }
            }
        }

        for player in &self.players {
            let worst_commander = player.commander_damage.values().copied().max().unwrap_or(0);
            let alive = player.life > 0
                && player.poison < self.config.poison_limit
                && worst_commander < self.config.commander_damage_limit
                && !player.drew_from_empty_library;
            if !alive && !player.has_lost {
                return broken(format!("player {} should have lost", player.id));
            }
        }

        for (attached, host) in &self.attachments {
            if !self.battlefield.contains(*attached) || !self.battlefield.contains(*host) {
                return broken(format!("{attached} is attached to {host} off the battlefield"));
            }
        }
        Ok(())
    }

    /// Shorthand for tests and tools: the object's zone
    pub fn zone_of(&self, id: ObjectId) -> Result<Zone> {
        Ok(self.object(id)?.zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CardDefinition;

    fn game() -> (GameState, PlayerId, PlayerId) {
        let game = GameState::new_two_player("Alice", "Bob", RulesConfig::default());
        let (a, b) = (game.players[0].id, game.players[1].id);
        (game, a, b)
    }

    #[test]
    fn test_new_game() {
        let (game, alice, bob) = game();
        assert_eq!(game.players.len(), 2);
        assert_eq!(game.player(alice).unwrap().life, 20);
        assert_eq!(game.opponents(alice), vec![bob]);
        assert!(!game.is_game_over());
    }

    #[test]
    fn test_create_and_move_object() {
        let (mut game, alice, _) = game();
        let bears = CardDefinition::creature("Grizzly Bears", "{1}{G}", 2, 2);
        let id = game.create_object(&bears, alice, Zone::Hand).unwrap();
        assert!(game.zones(alice).unwrap().hand.contains(id));

        game.move_object(id, Zone::Battlefield).unwrap();
        assert!(game.battlefield.contains(id));
        assert!(!game.zones(alice).unwrap().hand.contains(id));
        assert_eq!(game.object(id).unwrap().entered_turn, Some(0));

        game.move_object(id, Zone::Graveyard).unwrap();
        assert!(game.zones(alice).unwrap().graveyard.contains(id));
        assert!(game
            .event_log
            .iter()
            .any(|e| e.kind == EventKind::Dies && e.object_id == Some(id)));
        game.check_invariants().unwrap();
    }

    #[test]
    fn test_pregame_permanents_can_attack_on_turn_one() {
        let (mut game, alice, _) = game();
        let bears = CardDefinition::creature("Grizzly Bears", "{1}{G}", 2, 2);
        let veteran = game.create_object(&bears, alice, Zone::Battlefield).unwrap();

        game.turn.started = true;
        let recruit = game.create_object(&bears, alice, Zone::Battlefield).unwrap();

        assert_eq!(game.object(veteran).unwrap().entered_turn, Some(0));
        assert!(!game.object(veteran).unwrap().has_summoning_sickness(1));
        assert!(game.object(recruit).unwrap().has_summoning_sickness(1));
    }

    #[test]
    fn test_draw_from_empty_library_sets_flag() {
        let (mut game, alice, _) = game();
        assert_eq!(game.draw_card(alice).unwrap(), None);
        assert!(game.player(alice).unwrap().drew_from_empty_library);
    }

    #[test]
    fn test_draw_takes_top_card() {
        let (mut game, alice, _) = game();
        let bottom = game
            .create_object(&CardDefinition::basic_land("Forest"), alice, Zone::Library)
            .unwrap();
        let top = game
            .create_object(&CardDefinition::basic_land("Island"), alice, Zone::Library)
            .unwrap();
        assert_eq!(game.draw_card(alice).unwrap(), Some(top));
        assert_eq!(game.zones(alice).unwrap().library.cards, vec![bottom]);
    }

    #[test]
    fn test_transaction_rolls_back() {
        let (mut game, alice, _) = game();
        let result: Result<()> = game.transactional(|g| {
            g.player_mut(alice)?.life = 3;
            Err(RulesError::InvalidAction("nope".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(game.player(alice).unwrap().life, 20);
    }

    #[test]
    fn test_rekey_keeps_zone_position() {
        let (mut game, alice, _) = game();
        let id = game
            .create_object(&CardDefinition::basic_land("Plains"), alice, Zone::Exile)
            .unwrap();
        let new_id = game.rekey_object(id).unwrap();
        assert_ne!(id, new_id);
        assert!(game.object(id).is_err());
        assert_eq!(game.zones(alice).unwrap().exile.cards, vec![new_id]);
    }
}
