//! Turn structure: step transitions, priority passes and stack resolution
//!
//! Steps without priority (untap, and cleanup unless something triggered)
//! run their automatic actions and move straight on. Every other step stops
//! with priority held by the active player until all players pass in
//! succession with an empty stack.

use crate::abilities::ResolveContext;
use crate::core::{Keyword, ObjectId, PlayerId};
use crate::game::events::{EventKind, GameEvent};
use crate::game::phase::Step;
use crate::game::stack::{StackItemId, StackPayload};
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};

/// What a priority pass led to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityOutcome {
    /// Priority moved to the next player
    Passed { next: PlayerId },
    /// Everyone passed and the top of the stack resolved
    Resolved { item: StackItemId },
    /// Everyone passed with an empty stack and the game moved on
    StepAdvanced { turn: u32, step: Step },
    /// At most one player remains
    GameOver { winner: Option<PlayerId> },
}

impl GameState {
    /// Enter the untap step of turn 1 and run forward to the first step
    /// with priority
    pub fn start_game(&mut self) -> Result<()> {
        if self.turn.started {
            return Err(RulesError::Permission("the game has already started".to_string()));
        }
        self.turn.started = true;
        self.turn.turn_number = 1;
        self.turn.active_player_idx = 0;
        self.turn.active_player = self
            .players
            .first()
            .map(|p| p.id)
            .ok_or_else(|| RulesError::InvalidAction("a game needs players".to_string()))?;
        self.logger.minimal(
            "turn",
            &format!("game starts with {} players", self.players.len()),
        );
        self.begin_turn()
    }

    /// Fail unless `player` may act right now
    pub(crate) fn require_priority(&self, player: PlayerId) -> Result<()> {
        if self.is_game_over() {
            return Err(RulesError::Permission("the game is over".to_string()));
        }
        if !self.turn.started {
            return Err(RulesError::Permission("the game has not started".to_string()));
        }
        if !self.player(player)?.is_active() {
            return Err(RulesError::Permission(format!("player {player} has left the game")));
        }
        if self.turn.priority_player() != Some(player) {
            return Err(RulesError::Permission(format!(
                "player {player} does not have priority"
            )));
        }
        Ok(())
    }

    /// Sorcery timing: the active player's main phase with an empty stack
    pub(crate) fn require_sorcery_timing(&self, player: PlayerId) -> Result<()> {
        if player != self.turn.active_player {
            return Err(RulesError::Permission(
                "only the active player can do this".to_string(),
            ));
        }
        if !self.turn.step.is_main() {
            return Err(RulesError::Permission(format!(
                "only during a main phase, not {}",
                self.turn.step
            )));
        }
        if !self.stack.is_empty() {
            return Err(RulesError::Permission("the stack is not empty".to_string()));
        }
        Ok(())
    }

    pub(crate) fn apply_pass_priority(&mut self, player: PlayerId) -> Result<PriorityOutcome> {
        self.require_priority(player)?;
        if let Some(combat) = &self.turn.combat {
            let undeclared = match self.turn.step {
                Step::DeclareAttackers => !combat.attackers_declared,
                Step::DeclareBlockers => !combat.blockers_declared,
                _ => false,
            };
            if undeclared {
                return Err(RulesError::Permission(format!(
                    "declarations for {} must be made before passing (an empty list declares none)",
                    self.turn.step
                )));
            }
        }

        let result = self.turn.priority.pass_priority();
        log_if_verbose!(self.logger, "priority", "player {player} passes");
        if !result.all_passed {
            let next = result.next.unwrap_or(self.turn.active_player);
            return Ok(PriorityOutcome::Passed { next });
        }

        if !self.stack.is_empty() {
            let item = self.resolve_top()?;
            self.after_action()?;
            if self.is_game_over() {
                return Ok(self.game_over_outcome());
            }
            self.turn.priority.reset(self.turn.active_player);
            return Ok(PriorityOutcome::Resolved { item });
        }

        if self.turn.step == Step::CombatDamage && self.turn.combat.is_some() {
            self.resolve_remaining_combat_damage()?;
            self.after_action()?;
            if self.is_game_over() {
                return Ok(self.game_over_outcome());
            }
            // Triggers from combat damage get a priority round of their own
            if !self.stack.is_empty() {
                self.turn.priority.reset(self.turn.active_player);
                return Ok(PriorityOutcome::Passed {
                    next: self.turn.active_player,
                });
            }
        }

        self.advance_step()?;
        if self.is_game_over() {
            return Ok(self.game_over_outcome());
        }
        Ok(PriorityOutcome::StepAdvanced {
            turn: self.turn.turn_number,
            step: self.turn.step,
        })
    }

    fn game_over_outcome(&self) -> PriorityOutcome {
        let winner = self.winner();
        match winner {
            Some(p) => self.logger.minimal("game", &format!("game over, player {p} wins")),
            None => self.logger.minimal("game", "game over, no winner"),
        }
        PriorityOutcome::GameOver { winner }
    }

    /// Settle the state after an action, and start the next turn if the
    /// active player left the game during it
    pub(crate) fn after_action(&mut self) -> Result<()> {
        self.settle()?;
        if self.is_game_over() {
            return Ok(());
        }
        let active = self.turn.active_player;
        if !self.player(active)?.is_active() {
            self.logger
                .normal("turn", &format!("active player {active} left; the turn ends"));
            self.end_combat();
            self.next_turn()?;
        }
        Ok(())
    }

    /// Leave the current step for the next one that grants priority
    pub(crate) fn advance_step(&mut self) -> Result<()> {
        let no_attackers = self
            .turn
            .combat
            .as_ref()
            .is_some_and(|c| c.attackers.is_empty());
        let next = match self.turn.step {
            // MTG Rules 508.8: no attackers means no blockers or damage
            Step::DeclareAttackers if no_attackers => Some(Step::EndCombat),
            step => step.next(),
        };
        match next {
            Some(step) => self.enter_step(step),
            None => self.next_turn(),
        }
    }

    fn next_turn(&mut self) -> Result<()> {
        let count = self.players.len();
        let next_idx = (1..=count)
            .map(|offset| (self.turn.active_player_idx + offset) % count)
            .find(|idx| self.players[*idx].is_active())
            .ok_or_else(|| RulesError::InvalidAction("no player can take a turn".to_string()))?;
        self.turn.active_player_idx = next_idx;
        self.turn.active_player = self.players[next_idx].id;
        self.turn.turn_number += 1;
        self.begin_turn()
    }

    fn begin_turn(&mut self) -> Result<()> {
        self.logger.normal(
            "turn",
            &format!(
                "turn {} ({})",
                self.turn.turn_number,
                self.player(self.turn.active_player)?.name
            ),
        );
        for player in &mut self.players {
            player.lands_played_this_turn = 0;
        }
        for id in self.objects.sorted_ids() {
            let obj = self.objects.get_mut(id)?;
            obj.activation_limits.retain(|key, _| !key.ends_with(":turn"));
        }
        self.enter_step(Step::Untap)
    }

    /// Run a step's automatic actions, then either stop with priority or
    /// keep going
    fn enter_step(&mut self, step: Step) -> Result<()> {
        self.turn.step = step;
        let active = self.turn.active_player;
        for player in &mut self.players {
            player.mana_pool.clear();
        }
        log_if_verbose!(self.logger, "turn", "--- {step} ---");
        self.publish(GameEvent::player(EventKind::BeginStep, active).with_step(step));

        match step {
            Step::Untap => self.untap_step(active)?,
            Step::Upkeep => self.publish(GameEvent::player(EventKind::Upkeep, active)),
            Step::Draw => {
                let first_draw = self.turn.turn_number == 1;
                if first_draw && self.config.skip_first_draw {
                    self.logger.normal("turn", "first turn, no draw");
                } else {
                    self.draw_card(active)?;
                }
            }
            Step::BeginCombat => {
                self.begin_combat();
                self.publish(GameEvent::player(EventKind::BeginCombat, active));
            }
            Step::EndCombat => {
                self.publish(GameEvent::player(EventKind::EndCombat, active));
                self.end_combat();
            }
            Step::End => self.publish(GameEvent::player(EventKind::EndStep, active)),
            Step::Cleanup => self.cleanup_step(active)?,
            Step::Main1 | Step::Main2 | Step::DeclareAttackers | Step::DeclareBlockers | Step::CombatDamage => {}
        }

        self.settle()?;
        if self.is_game_over() {
            return Ok(());
        }
        if !self.player(active)?.is_active() {
            return self.next_turn();
        }
        // MTG Rules 514.3a: cleanup grants priority only if something
        // happened during it
        if step.grants_priority() || (step == Step::Cleanup && !self.stack.is_empty()) {
            self.turn.priority.reset(active);
            return Ok(());
        }
        self.advance_step()
    }

    fn untap_step(&mut self, active: PlayerId) -> Result<()> {
        // MTG Rules 502.1: phasing happens before untapping
        let mine: Vec<ObjectId> = self
            .battlefield
            .cards
            .iter()
            .copied()
            .filter(|id| self.objects.get(*id).is_ok_and(|o| o.controller == active))
            .collect();
        for id in &mine {
            let obj = self.objects.get_mut(*id)?;
            if obj.status.phased_out {
                obj.status.phased_out = false;
                log_if_verbose!(self.logger, "turn", "{} phases in", self.object(*id)?.name());
            }
        }
        self.recompute_continuous_effects()?;
        for id in self.permanents_controlled_by(active) {
            self.objects.get_mut(id)?.untap();
        }
        self.publish(GameEvent::player(EventKind::Untap, active));
        Ok(())
    }

    fn cleanup_step(&mut self, active: PlayerId) -> Result<()> {
        let max_hand = self.config.max_hand_size;
        let mut apnap = vec![active];
        apnap.extend(self.opponents(active));
        for player in apnap {
            let hand = self.zone_cards(player, Zone::Hand)?;
            if hand.len() <= max_hand {
                continue;
            }
            let excess = hand.len() - max_hand;
            self.logger.normal(
                "turn",
                &format!("player {player} discards {excess} down to {max_hand}"),
            );
            for id in hand.iter().rev().take(excess) {
                self.move_object(*id, Zone::Graveyard)?;
            }
        }

        for id in self.battlefield.cards.clone() {
            let obj = self.objects.get_mut(id)?;
            obj.status.damage = 0;
            obj.status.regeneration_shields = 0;
            obj.temporary_effects.retain(|e| !e.until_end_of_turn);
        }
        self.replacements.end_turn();
        self.recompute_continuous_effects()?;
        self.publish(GameEvent::player(EventKind::Cleanup, active));
        Ok(())
    }

    /// Resolve the top stack item. Targets that became illegal are dropped;
    /// an item whose targets are all gone fizzles.
    pub(crate) fn resolve_top(&mut self) -> Result<StackItemId> {
        let item = self
            .stack
            .pop()
            .ok_or_else(|| RulesError::InvalidAction("the stack is empty".to_string()))?;
        let id = item.id;
        let controller = item.controller;

        match item.payload {
            StackPayload::Spell {
                source,
                destination,
                ability,
                mut context,
                copy_of,
            } => {
                let name = self.object(source)?.name().to_string();
                if self.prune_illegal_targets(ability.as_deref(), &mut context, controller) {
                    self.logger
                        .normal("stack", &format!("{name} fizzles: every target is illegal"));
                    if copy_of.is_none() {
                        self.move_object(source, Zone::Graveyard)?;
                    }
                    return Ok(id);
                }
                self.logger.normal("stack", &format!("{name} resolves"));

                if destination == Zone::Battlefield {
                    let permanent = match copy_of {
                        Some(_) => self.create_token_copy(source, controller)?,
                        None => {
                            self.put_onto_battlefield(source, controller)?;
                            source
                        }
                    };
                    self.attach_resolving_aura(permanent, &context)?;
                    if let Some(ability) = ability.filter(|a| !a.effects.is_empty()) {
                        context.source_id = Some(permanent);
                        self.resolve_ability(&ability, &mut context)?;
                    }
                } else {
                    if let Some(ability) = &ability {
                        self.resolve_ability(ability, &mut context)?;
                    }
                    if copy_of.is_none() && self.object(source)?.zone == Zone::Stack {
                        self.move_object(source, destination)?;
                    }
                }
            }
            StackPayload::Ability {
                source,
                ability,
                mut context,
            } => {
                let name = source
                    .and_then(|s| self.object(s).ok())
                    .map_or_else(|| "ability".to_string(), |o| format!("{}'s ability", o.name()));
                if self.prune_illegal_targets(Some(&*ability), &mut context, controller) {
                    self.logger
                        .normal("stack", &format!("{name} fizzles: every target is illegal"));
                    return Ok(id);
                }
                self.logger.normal("stack", &format!("{name} resolves"));
                let report = self.resolve_ability(&ability, &mut context)?;
                log_if_verbose!(self.logger, "stack", "{name}: {:?}", report.status);
            }
        }
        Ok(id)
    }

    /// An Aura spell becomes attached to the object it targeted
    fn attach_resolving_aura(
        &mut self,
        permanent: ObjectId,
        context: &ResolveContext,
    ) -> Result<()> {
        if !self.object(permanent)?.chars.has_subtype("Aura") {
            return Ok(());
        }
        let host = context
            .all_targets()
            .filter_map(|(_, t)| t.object())
            .find(|h| self.objects.get(*h).is_ok_and(|o| o.zone == Zone::Battlefield));
        if let Some(host) = host {
            self.attach(permanent, host)?;
        }
        Ok(())
    }

    /// Creatures that can attack for `player` right now
    pub fn potential_attackers(&self, player: PlayerId) -> Vec<ObjectId> {
        self.permanents_controlled_by(player)
            .into_iter()
            .filter(|id| {
                self.objects.get(*id).is_ok_and(|o| {
                    o.is_creature()
                        && !o.is_tapped()
                        && !o.status.phased_out
                        && !o.has_keyword(&Keyword::Defender)
                        && !o.has_summoning_sickness(self.turn.turn_number)
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::core::CardDefinition;

    fn started(config: RulesConfig) -> (GameState, PlayerId, PlayerId) {
        let mut game = GameState::new_two_player("Alice", "Bob", config);
        game.logger.enable_capture();
        let (a, b) = (game.players[0].id, game.players[1].id);
        for owner in [a, b] {
            for _ in 0..10 {
                game.create_object(&CardDefinition::basic_land("Forest"), owner, Zone::Library)
                    .unwrap();
            }
        }
        game.start_game().unwrap();
        (game, a, b)
    }

    fn pass_round(game: &mut GameState) -> PriorityOutcome {
        let first = game.turn.priority_player().unwrap();
        let mut outcome = game.apply_pass_priority(first).unwrap();
        while let PriorityOutcome::Passed { next } = outcome {
            outcome = game.apply_pass_priority(next).unwrap();
        }
        outcome
    }

    #[test]
    fn test_start_game_stops_at_upkeep() {
        let (game, alice, _) = started(RulesConfig::default());
        assert_eq!(game.turn.step, Step::Upkeep);
        assert_eq!(game.turn.priority_player(), Some(alice));
        assert!(game.event_log.iter().any(|e| e.kind == EventKind::Untap));
    }

    #[test]
    fn test_skip_first_draw() {
        let (mut game, alice, _) = started(RulesConfig::default().with_skip_first_draw(true));
        pass_round(&mut game);
        assert_eq!(game.turn.step, Step::Draw);
        assert!(game.zone_cards(alice, Zone::Hand).unwrap().is_empty());
    }

    #[test]
    fn test_no_attackers_skips_to_end_of_combat() {
        let (mut game, alice, _) = started(RulesConfig::default());
        while game.turn.step != Step::DeclareAttackers {
            pass_round(&mut game);
        }
        let err = game.apply_pass_priority(alice).unwrap_err();
        assert!(matches!(err, RulesError::Permission(_)));
        game.apply_declare_attackers(alice, &[], None, None).unwrap();
        let outcome = pass_round(&mut game);
        assert_eq!(
            outcome,
            PriorityOutcome::StepAdvanced {
                turn: 1,
                step: Step::EndCombat
            }
        );
    }

    #[test]
    fn test_turn_passes_to_next_player() {
        let (mut game, _, bob) = started(RulesConfig::default());
        while game.turn.turn_number == 1 {
            if game.turn.step == Step::DeclareAttackers {
                let active = game.turn.active_player;
                game.apply_declare_attackers(active, &[], None, None).unwrap();
            }
            pass_round(&mut game);
        }
        assert_eq!(game.turn.active_player, bob);
        assert_eq!(game.turn.step, Step::Upkeep);
        assert_eq!(game.turn.priority_player(), Some(bob));
    }

    #[test]
    fn test_cleanup_discards_newest_first() {
        let config = RulesConfig::default().with_max_hand_size(1);
        let (mut game, alice, _) = started(config);
        let old = game
            .create_object(&CardDefinition::creature("Old", "{1}", 1, 1), alice, Zone::Hand)
            .unwrap();
        let new = game
            .create_object(&CardDefinition::creature("New", "{1}", 1, 1), alice, Zone::Hand)
            .unwrap();
        while game.turn.turn_number == 1 {
            if game.turn.step == Step::DeclareAttackers {
                game.apply_declare_attackers(alice, &[], None, None).unwrap();
            }
            pass_round(&mut game);
        }
        let hand = game.zone_cards(alice, Zone::Hand).unwrap();
        assert_eq!(hand.len(), 1);
        assert_eq!(game.zone_of(new).unwrap(), Zone::Graveyard);
        assert_eq!(game.zone_of(old).unwrap(), Zone::Hand);
    }

    #[test]
    fn test_mana_empties_between_steps() {
        let (mut game, alice, _) = started(RulesConfig::default());
        game.player_mut(alice)
            .unwrap()
            .mana_pool
            .add(crate::core::ManaType::Colorless, 3);
        pass_round(&mut game);
        assert_eq!(game.player(alice).unwrap().mana_pool.total(), 0);
    }
}
