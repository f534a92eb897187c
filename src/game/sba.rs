//! State-based actions
//!
//! MTG Rules 704: checked whenever a player would receive priority and
//! after every action here. Each sweep recomputes continuous effects first,
//! then performs every applicable action; sweeps repeat until one finds
//! nothing to do.

use crate::abilities::LayerOp;
use crate::core::{CounterType, Keyword, ObjectId, PlayerId};
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};

impl GameState {
    /// Run sweeps until nothing changes. Returns true if any action was
    /// performed.
    pub fn check_state_based_actions(&mut self) -> Result<bool> {
        let mut performed = false;
        for _ in 0..self.config.sba_iteration_limit.max(1) {
            self.recompute_continuous_effects()?;
            if !self.sba_sweep()? {
                return Ok(performed);
            }
            performed = true;
        }
        self.recompute_continuous_effects()?;
        self.logger.normal(
            "sba",
            &format!(
                "state-based actions still pending after {} sweeps",
                self.config.sba_iteration_limit
            ),
        );
        Ok(performed)
    }

    fn sba_sweep(&mut self) -> Result<bool> {
        let mut performed = false;
        performed |= self.sba_legend_rule()?;
        performed |= self.sba_cancel_counters()?;
        performed |= self.sba_planeswalker_uniqueness()?;
        performed |= self.sba_attachments()?;
        performed |= self.sba_token_cleanup()?;
        performed |= self.sba_lethal_damage()?;
        performed |= self.sba_zero_loyalty()?;
        performed |= self.sba_player_loss()?;
        Ok(performed)
    }

    /// Battlefield objects that are not phased out, in battlefield order
    fn live_permanents(&self) -> Vec<ObjectId> {
        self.battlefield
            .cards
            .iter()
            .copied()
            .filter(|id| self.objects.get(*id).is_ok_and(|o| !o.status.phased_out))
            .collect()
    }

    fn put_into_graveyard(&mut self, id: ObjectId, reason: &str) -> Result<()> {
        self.logger.normal(
            "sba",
            &format!("{} ({id}) is put into the graveyard: {reason}", self.object(id)?.name()),
        );
        self.move_object(id, Zone::Graveyard)?;
        Ok(())
    }

    /// MTG Rules 704.5j: keep the newest legendary permanent of each name
    fn sba_legend_rule(&mut self) -> Result<bool> {
        let mut groups: BTreeMap<(PlayerId, String), Vec<ObjectId>> = BTreeMap::new();
        for id in self.live_permanents() {
            let obj = self.object(id)?;
            if obj.is_legendary() {
                groups
                    .entry((obj.controller, obj.name().to_string()))
                    .or_default()
                    .push(id);
            }
        }
        self.keep_newest(groups.into_values(), "legend rule")
    }

    /// Put all but the most recently entered object of each group into the
    /// graveyard
    fn keep_newest(&mut self, groups: impl Iterator<Item = Vec<ObjectId>>, reason: &str) -> Result<bool> {
        let mut losers = BTreeSet::new();
        for group in groups.filter(|g| g.len() > 1) {
            let newest = group
                .iter()
                .copied()
                .max_by_key(|id| {
                    self.objects
                        .get(*id)
                        .map(|o| (o.entered_turn, o.timestamp))
                        .unwrap_or_default()
                });
            losers.extend(group.into_iter().filter(|id| Some(*id) != newest));
        }
        for id in &losers {
            if self.object(*id)?.zone == Zone::Battlefield {
                self.put_into_graveyard(*id, reason)?;
            }
        }
        Ok(!losers.is_empty())
    }

    /// MTG Rules 704.5q
    fn sba_cancel_counters(&mut self) -> Result<bool> {
        let mut performed = false;
        for id in self.battlefield.cards.clone() {
            let obj = self.object_mut(id)?;
            let pairs = obj
                .counter(&CounterType::plus_one())
                .min(obj.counter(&CounterType::minus_one()));
            if pairs > 0 {
                obj.remove_counters(&CounterType::plus_one(), pairs);
                obj.remove_counters(&CounterType::minus_one(), pairs);
                performed = true;
            }
        }
        Ok(performed)
    }

    /// The legend rule applied to planeswalkers: a controller keeps only the
    /// newest planeswalker of each name
    fn sba_planeswalker_uniqueness(&mut self) -> Result<bool> {
        let mut groups: BTreeMap<(PlayerId, String), Vec<ObjectId>> = BTreeMap::new();
        for id in self.live_permanents() {
            let obj = self.object(id)?;
            if obj.is_planeswalker() && !obj.is_legendary() {
                groups
                    .entry((obj.controller, obj.name().to_string()))
                    .or_default()
                    .push(id);
            }
        }
        self.keep_newest(groups.into_values(), "planeswalker uniqueness")
    }

    /// Auras on a missing or protected host go to the graveyard; other
    /// attachments just come off
    fn sba_attachments(&mut self) -> Result<bool> {
        let mut performed = false;
        let entries: Vec<(ObjectId, ObjectId)> = self.attachments.iter().map(|(a, h)| (*a, *h)).collect();
        for (attached, host) in entries {
            let Ok(obj) = self.object(attached) else {
                self.attachments.remove(&attached);
                performed = true;
                continue;
            };
            if obj.zone != Zone::Battlefield {
                self.attachments.remove(&attached);
                performed = true;
                continue;
            }
            let is_aura = obj.chars.has_subtype("Aura");
            let is_equipment = obj.chars.has_subtype("Equipment");
            let colors = obj.chars.colors;
            let legal = match self.object(host) {
                Ok(h) if h.zone == Zone::Battlefield => {
                    !(is_aura && h.chars.protections.intersects(colors))
                        && !(is_equipment && !h.is_creature())
                }
                _ => false,
            };
            if legal {
                continue;
            }
            performed = true;
            if is_aura {
                self.put_into_graveyard(attached, "enchanting an illegal object")?;
            } else {
                self.attachments.remove(&attached);
                self.logger
                    .normal("sba", &format!("{attached} becomes unattached from {host}"));
            }
        }
        Ok(performed)
    }

    /// MTG Rules 704.5d: tokens outside the battlefield cease to exist
    fn sba_token_cleanup(&mut self) -> Result<bool> {
        let gone: Vec<(ObjectId, PlayerId, Zone)> = self
            .objects
            .values()
            .filter(|o| o.is_token && !matches!(o.zone, Zone::Battlefield | Zone::Stack))
            .map(|o| (o.id, o.owner, o.zone))
            .collect();
        for (id, owner, zone) in &gone {
            if let Some(list) = self.zones_mut(*owner)?.get_zone_mut(*zone) {
                list.remove(*id);
            }
            self.objects.remove(*id);
            log_if_verbose!(self.logger, "sba", "token {id} ceased to exist");
        }
        Ok(!gone.is_empty())
    }

    /// MTG Rules 704.5f-704.5h, with regeneration (701.15)
    fn sba_lethal_damage(&mut self) -> Result<bool> {
        let mut performed = false;
        for id in self.live_permanents() {
            let obj = self.object(id)?;
            if !obj.is_creature() {
                continue;
            }
            if obj.toughness() <= 0 {
                self.put_into_graveyard(id, "toughness 0 or less")?;
                performed = true;
                continue;
            }
            if obj.status.damage < obj.toughness() || obj.has_keyword(&Keyword::Indestructible) {
                continue;
            }
            performed = true;
            if obj.status.regeneration_shields > 0 {
                self.regenerate(id)?;
            } else {
                self.put_into_graveyard(id, "lethal damage")?;
            }
        }
        Ok(performed)
    }

    /// Spend a regeneration shield: tap, remove damage and leave combat
    pub(crate) fn regenerate(&mut self, id: ObjectId) -> Result<()> {
        let obj = self.object_mut(id)?;
        obj.status.regeneration_shields = obj.status.regeneration_shields.saturating_sub(1);
        obj.status.damage = 0;
        obj.tap();
        self.remove_from_combat(id);
        self.logger
            .normal("sba", &format!("{} ({id}) regenerates", self.object(id)?.name()));
        Ok(())
    }

    /// MTG Rules 704.5i
    fn sba_zero_loyalty(&mut self) -> Result<bool> {
        let mut performed = false;
        for id in self.live_permanents() {
            let obj = self.object(id)?;
            if obj.is_planeswalker() && obj.loyalty() == 0 {
                self.put_into_graveyard(id, "no loyalty")?;
                performed = true;
            }
        }
        Ok(performed)
    }

    /// MTG Rules 704.5a-704.5c and 903.10a
    fn sba_player_loss(&mut self) -> Result<bool> {
        let poison_limit = self.config.poison_limit;
        let commander_limit = self.config.commander_damage_limit;
        let losers: Vec<(PlayerId, &'static str)> = self
            .players
            .iter()
            .filter(|p| p.is_active())
            .filter_map(|p| {
                let reason = if p.life <= 0 {
                    "life 0 or less"
                } else if p.poison >= poison_limit {
                    "poison"
                } else if p.commander_damage.values().any(|d| *d >= commander_limit) {
                    "commander damage"
                } else if p.drew_from_empty_library {
                    "drew from an empty library"
                } else {
                    return None;
                };
                Some((p.id, reason))
            })
            .collect();

        for (player, reason) in &losers {
            self.logger
                .minimal("sba", &format!("player {player} loses the game: {reason}"));
            self.player_mut(*player)?.has_lost = true;
            self.remove_player(*player)?;
        }
        Ok(!losers.is_empty())
    }

    /// MTG Rules 800.4a: a player who leaves takes their cards with them
    fn remove_player(&mut self, player: PlayerId) -> Result<()> {
        for item in self.stack.remove_controlled_by(player) {
            log_if_verbose!(self.logger, "sba", "stack item {} leaves with player {player}", item.id);
        }
        self.replacements.forget_player(player);

        let owned: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|o| o.owner == player && o.zone != Zone::Exile)
            .map(|o| o.id)
            .collect();
        for id in owned {
            if self.object(id)?.zone == Zone::Stack {
                // Its spell was removed above or belongs to someone else
                let still_cast = self.stack.find_spell(id).map(|item| item.id);
                if let Some(item) = still_cast {
                    self.stack.remove(item);
                }
                let obj = self.object_mut(id)?;
                obj.reset_for_zone_change();
                obj.zone = Zone::Exile;
                self.zones_mut(player)?.exile.add(id);
            } else {
                self.move_object(id, Zone::Exile)?;
            }
        }

        for obj in self.objects.values_mut() {
            if obj.controller == player || obj.base_controller == player {
                obj.base_controller = obj.owner;
                obj.controller = obj.owner;
                obj.temporary_effects
                    .retain(|t| !matches!(t.op, LayerOp::SetController(p) if p == player));
            }
        }

        let player_state = self.player_mut(player)?;
        player_state.removed_from_game = true;
        player_state.mana_pool.clear();

        let remaining = self.active_player_ids();
        let holder = self.turn.priority.current().unwrap_or(player);
        self.turn.priority.update_order(remaining, holder);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::core::{CardDefinition, CardType, Supertype};

    fn setup() -> (GameState, PlayerId, PlayerId) {
        let game = GameState::new_two_player("Alice", "Bob", RulesConfig::default());
        let (a, b) = (game.players[0].id, game.players[1].id);
        (game, a, b)
    }

    fn bear(game: &mut GameState, owner: PlayerId) -> ObjectId {
        game.create_object(&CardDefinition::creature("Bear", "{1}{G}", 2, 2), owner, Zone::Battlefield)
            .unwrap()
    }

    #[test]
    fn test_lethal_damage_and_indestructible() {
        let (mut game, alice, _) = setup();
        let plain = bear(&mut game, alice);
        let tough = CardDefinition::creature("Darksteel Bear", "{4}", 2, 2).with_keyword(Keyword::Indestructible);
        let tough = game.create_object(&tough, alice, Zone::Battlefield).unwrap();
        for id in [plain, tough] {
            game.object_mut(id).unwrap().status.damage = 2;
        }
        assert!(game.check_state_based_actions().unwrap());
        assert_eq!(game.zone_of(plain).unwrap(), Zone::Graveyard);
        assert_eq!(game.zone_of(tough).unwrap(), Zone::Battlefield);
    }

    #[test]
    fn test_zero_toughness_ignores_indestructible() {
        let (mut game, alice, _) = setup();
        let def = CardDefinition::creature("Husk", "{1}", 0, 0).with_keyword(Keyword::Indestructible);
        let husk = game.create_object(&def, alice, Zone::Battlefield).unwrap();
        game.check_state_based_actions().unwrap();
        assert_eq!(game.zone_of(husk).unwrap(), Zone::Graveyard);
    }

    #[test]
    fn test_regeneration_shield() {
        let (mut game, alice, _) = setup();
        let id = bear(&mut game, alice);
        let obj = game.object_mut(id).unwrap();
        obj.status.damage = 5;
        obj.status.regeneration_shields = 1;
        game.check_state_based_actions().unwrap();
        let obj = game.object(id).unwrap();
        assert_eq!(obj.zone, Zone::Battlefield);
        assert!(obj.is_tapped());
        assert_eq!(obj.status.damage, 0);
        assert_eq!(obj.status.regeneration_shields, 0);
    }

    #[test]
    fn test_legend_rule_keeps_newest() {
        let (mut game, alice, _) = setup();
        let def = CardDefinition::creature("Atraxa", "{G}{W}{U}{B}", 4, 4).with_supertype(Supertype::Legendary);
        let old = game.create_object(&def, alice, Zone::Battlefield).unwrap();
        game.object_mut(old).unwrap().entered_turn = Some(1);
        let new = game.create_object(&def, alice, Zone::Battlefield).unwrap();
        game.object_mut(new).unwrap().entered_turn = Some(3);
        game.check_state_based_actions().unwrap();
        assert_eq!(game.zone_of(old).unwrap(), Zone::Graveyard);
        assert_eq!(game.zone_of(new).unwrap(), Zone::Battlefield);
    }

    fn planeswalker(game: &mut GameState, owner: PlayerId, name: &str, subtype: &str) -> ObjectId {
        let def = CardDefinition::new(name)
            .with_cost("{2}{U}{U}")
            .with_types(&[CardType::Planeswalker])
            .with_subtypes(&[subtype])
            .with_loyalty(3);
        game.create_object(&def, owner, Zone::Battlefield).unwrap()
    }

    #[test]
    fn test_planeswalker_uniqueness_is_by_name() {
        let (mut game, alice, bob) = setup();
        let old = planeswalker(&mut game, alice, "Jace", "Jace");
        let new = planeswalker(&mut game, alice, "Jace", "Jace");
        let other_name = planeswalker(&mut game, alice, "Jace, the Mind Sculptor", "Jace");
        let opponents = planeswalker(&mut game, bob, "Jace", "Jace");

        game.check_state_based_actions().unwrap();
        assert_eq!(game.zone_of(old).unwrap(), Zone::Graveyard);
        assert_eq!(game.zone_of(new).unwrap(), Zone::Battlefield);
        assert_eq!(game.zone_of(other_name).unwrap(), Zone::Battlefield);
        assert_eq!(game.zone_of(opponents).unwrap(), Zone::Battlefield);
    }

    #[test]
    fn test_counters_cancel() {
        let (mut game, alice, _) = setup();
        let id = bear(&mut game, alice);
        let obj = game.object_mut(id).unwrap();
        obj.add_counters(CounterType::plus_one(), 3);
        obj.add_counters(CounterType::minus_one(), 1);
        game.check_state_based_actions().unwrap();
        let obj = game.object(id).unwrap();
        assert_eq!(obj.counter(&CounterType::plus_one()), 2);
        assert_eq!(obj.counter(&CounterType::minus_one()), 0);
        assert_eq!(obj.power(), 4);
    }

    #[test]
    fn test_aura_without_host_goes_to_graveyard() {
        let (mut game, alice, _) = setup();
        let host = bear(&mut game, alice);
        let aura = CardDefinition::new("Rancor")
            .with_cost("{G}")
            .with_types(&[CardType::Enchantment])
            .with_subtypes(&["Aura"]);
        let aura = game.create_object(&aura, alice, Zone::Battlefield).unwrap();
        game.attach(aura, host).unwrap();
        game.move_object(host, Zone::Exile).unwrap();
        game.check_state_based_actions().unwrap();
        assert_eq!(game.zone_of(aura).unwrap(), Zone::Graveyard);
        assert!(game.attachments.is_empty());
    }

    #[test]
    fn test_tokens_cease_to_exist() {
        let (mut game, alice, _) = setup();
        let token = game
            .create_token(&CardDefinition::creature("Soldier", "", 1, 1), alice)
            .unwrap();
        game.move_object(token, Zone::Graveyard).unwrap();
        game.check_state_based_actions().unwrap();
        assert!(game.object(token).is_err());
        assert!(game.zones(alice).unwrap().graveyard.is_empty());
    }

    #[test]
    fn test_player_loss_removes_their_objects() {
        let (mut game, alice, bob) = setup();
        let theirs = bear(&mut game, bob);
        let borrowed = bear(&mut game, alice);
        game.object_mut(borrowed).unwrap().base_controller = bob;
        game.player_mut(bob).unwrap().life = 0;

        game.check_state_based_actions().unwrap();
        let bob_state = game.player(bob).unwrap();
        assert!(bob_state.has_lost);
        assert!(bob_state.removed_from_game);
        assert_eq!(game.zone_of(theirs).unwrap(), Zone::Exile);
        assert_eq!(game.object(borrowed).unwrap().controller, alice);
        assert_eq!(game.winner(), Some(alice));
        assert!(game.check_invariants().is_ok());
    }

    #[test]
    fn test_empty_library_draw_loses() {
        let (mut game, alice, _) = setup();
        assert_eq!(game.draw_card(alice).unwrap(), None);
        assert!(!game.player(alice).unwrap().has_lost);
        game.check_state_based_actions().unwrap();
        assert!(game.player(alice).unwrap().has_lost);
    }
}
