//! Rules facade
//!
//! The actions a player can take. Each one checks permission and timing,
//! then runs transactionally: if any step fails, the game state is exactly
//! what it was before the call.

use crate::abilities::{AbilityGraph, AbilityType, ResolveContext, RuntimeAbility};
use crate::core::mana::{find_payment, land_mana_production, pay};
use crate::core::{
    CardType, CounterType, Keyword, ManaCost, ManaPayment, ManaType, ObjectId, PlayerId,
};
use crate::game::combat::{CombatDamagePass, DamageAssignments};
use crate::game::events::{EventKind, GameEvent};
use crate::game::phase::Step;
use crate::game::stack::{StackItem, StackItemId, StackItemKind, StackPayload};
use crate::game::state::GameState;
use crate::game::turn::PriorityOutcome;
use crate::zones::Zone;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Optional inputs to [`GameState::cast_spell`]
#[derive(Debug, Clone, Default)]
pub struct CastOptions {
    pub x_value: u32,
    /// Resolution graph to use instead of the card's own spell ability
    pub ability_graph: Option<AbilityGraph>,
    /// Targets and choices
    pub context: ResolveContext,
    /// Choices for hybrid, two-brid and Phyrexian symbols. Found
    /// automatically when absent.
    pub payment: Option<ManaPayment>,
}

impl CastOptions {
    pub fn with_context(context: ResolveContext) -> Self {
        CastOptions {
            context,
            ..Default::default()
        }
    }

    pub fn with_x(mut self, x_value: u32) -> Self {
        self.x_value = x_value;
        self
    }

    pub fn with_payment(mut self, payment: ManaPayment) -> Self {
        self.payment = Some(payment);
        self
    }
}

/// The cost of casting a spell right now, for display before committing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastQuote {
    pub object_id: ObjectId,
    /// Full cost including X and commander tax
    pub cost: ManaCost,
    pub mana_value: u32,
    /// Generic mana added by commander tax
    pub commander_tax: u32,
    /// Target keys the spell's resolution reads
    pub target_keys: Vec<String>,
    /// A payment from the current pool, if one exists
    pub payment: Option<ManaPayment>,
}

impl CastQuote {
    pub fn can_pay(&self) -> bool {
        self.payment.is_some()
    }
}

impl GameState {
    /// Play a land from hand. Uses no stack and keeps priority.
    pub fn play_land(&mut self, player: PlayerId, card: ObjectId) -> Result<()> {
        self.transactional(|game| {
            game.require_priority(player)?;
            game.require_sorcery_timing(player)?;
            let obj = game.object(card)?;
            if !obj.is_land() {
                return Err(RulesError::InvalidAction(format!("{} is not a land", obj.name())));
            }
            if obj.zone != Zone::Hand || obj.owner != player {
                return Err(RulesError::InvalidAction(format!(
                    "{} is not in player {player}'s hand",
                    obj.name()
                )));
            }
            let state = game.player(player)?;
            if !state.can_play_land() {
                return Err(RulesError::LimitReached(format!(
                    "player {player} has already played {} land(s) this turn",
                    state.lands_played_this_turn
                )));
            }

            game.put_onto_battlefield(card, player)?;
            game.player_mut(player)?.lands_played_this_turn += 1;
            game.logger
                .normal("action", &format!("player {player} plays {}", game.object(card)?.name()));
            game.after_action()
        })
    }

    /// The spell's cost and whether the current pool can pay it
    pub fn prepare_cast(
        &self,
        player: PlayerId,
        card: ObjectId,
        x_value: u32,
        context: &ResolveContext,
    ) -> Result<CastQuote> {
        self.castable_from(player, card)?;
        let ability = self.spell_ability(card, None)?;
        let (cost, commander_tax) = self.spell_cost(player, card, x_value)?;
        let state = self.player(player)?;
        let life = u32::try_from(state.life).unwrap_or(0);
        let payment = find_payment(&state.mana_pool, &cost, Some(life));
        let mut target_keys: Vec<String> = ability
            .as_ref()
            .map(|a| a.target_keys().into_iter().collect())
            .unwrap_or_default();
        target_keys.retain(|k| !context.targets.contains_key(k));
        Ok(CastQuote {
            object_id: card,
            mana_value: cost.mana_value(),
            cost,
            commander_tax,
            target_keys,
            payment,
        })
    }

    /// Cast a spell from hand, or a commander from the command zone
    pub fn cast_spell(
        &mut self,
        player: PlayerId,
        card: ObjectId,
        options: CastOptions,
    ) -> Result<StackItemId> {
        self.transactional(|game| game.apply_cast_spell(player, card, options))
    }

    fn apply_cast_spell(&mut self, player: PlayerId, card: ObjectId, options: CastOptions) -> Result<StackItemId> {
        self.require_priority(player)?;
        let from = self.castable_from(player, card)?;
        let obj = self.object(card)?;
        let instant_speed = obj.is_type(CardType::Instant) || obj.has_keyword(&Keyword::Flash);
        if !instant_speed {
            self.require_sorcery_timing(player)?;
        }
        let destination = if obj.is_permanent() {
            Zone::Battlefield
        } else {
            Zone::Graveyard
        };

        let ability = self.spell_ability(card, options.ability_graph.as_ref())?;
        let mut context = options.context;
        context.source_id = Some(card);
        context.controller_id = Some(player);
        context.x_value = options.x_value;
        self.validate_targets(ability.as_deref(), &context, player)?;

        let (cost, commander_tax) = self.spell_cost(player, card, options.x_value)?;
        self.pay_mana_cost(player, &cost, options.payment.as_ref())?;
        if from == Zone::Command {
            self.player_mut(player)?.commander_tax += 1;
            log_if_verbose!(self.logger, "cast", "commander tax paid: {commander_tax}");
        }

        self.move_object(card, Zone::Stack)?;
        self.object_mut(card)?.was_cast = true;
        let item = StackItem {
            id: self.next_id(),
            kind: StackItemKind::Spell,
            controller: player,
            payload: StackPayload::Spell {
                source: card,
                destination,
                ability,
                context,
                copy_of: None,
            },
        };
        let item_id = item.id;
        self.stack.push(item);
        self.logger.normal(
            "cast",
            &format!("player {player} casts {} for {cost}", self.object(card)?.name()),
        );
        self.publish(GameEvent::object(EventKind::SpellCast, card, player).with_player(player));
        self.turn.priority.after_player_action();
        self.after_action()?;
        Ok(item_id)
    }

    /// Where a card may be cast from: its owner's hand, or the command zone
    /// if it is that player's commander
    fn castable_from(&self, player: PlayerId, card: ObjectId) -> Result<Zone> {
        let obj = self.object(card)?;
        if obj.is_land() {
            return Err(RulesError::InvalidAction(format!(
                "{} is a land; lands are played, not cast",
                obj.name()
            )));
        }
        if obj.owner != player {
            return Err(RulesError::InvalidAction(format!(
                "player {player} does not own {}",
                obj.name()
            )));
        }
        match obj.zone {
            Zone::Hand => Ok(Zone::Hand),
            Zone::Command if self.player(player)?.commander_id == Some(card) => Ok(Zone::Command),
            zone => Err(RulesError::InvalidAction(format!(
                "{} can't be cast from the {zone}",
                obj.name()
            ))),
        }
    }

    fn spell_ability(
        &self,
        card: ObjectId,
        graph: Option<&AbilityGraph>,
    ) -> Result<Option<Arc<RuntimeAbility>>> {
        if let Some(graph) = graph {
            return Ok(Some(Arc::new(RuntimeAbility::compile(graph)?)));
        }
        Ok(self
            .object(card)?
            .abilities
            .iter()
            .find(|a| a.ability_type == AbilityType::Spell)
            .cloned())
    }

    /// Printed cost with X, plus commander tax when cast from the command zone
    fn spell_cost(&self, player: PlayerId, card: ObjectId, x_value: u32) -> Result<(ManaCost, u32)> {
        let obj = self.object(card)?;
        let mut cost = ManaCost::parse(&obj.chars.mana_cost, x_value)?;
        let mut tax = 0;
        if obj.zone == Zone::Command {
            tax = 2 * self.player(player)?.commander_tax;
            cost.add_generic(tax);
        }
        Ok((cost, tax))
    }

    fn pay_mana_cost(&mut self, player: PlayerId, cost: &ManaCost, payment: Option<&ManaPayment>) -> Result<()> {
        if cost.is_free() {
            return Ok(());
        }
        let state = self.player(player)?;
        let payment = match payment {
            Some(p) => p.clone(),
            None if cost.needs_choices() => {
                let life = u32::try_from(state.life).unwrap_or(0);
                find_payment(&state.mana_pool, cost, Some(life)).ok_or_else(|| {
                    RulesError::InsufficientMana(format!("{} can't pay {cost}", state.name))
                })?
            }
            None => ManaPayment::default(),
        };
        let state = self.player_mut(player)?;
        let receipt = pay(&mut state.mana_pool, cost, &payment)?;
        if receipt.life > 0 {
            state.lose_life(receipt.life as i32);
        }
        Ok(())
    }

    /// Activate a mana ability. It resolves at once without using the
    /// stack. Lands without a compiled mana ability use their basic land
    /// types or oracle text.
    pub fn activate_mana_ability(&mut self, player: PlayerId, source: ObjectId) -> Result<()> {
        self.transactional(|game| {
            game.require_priority(player)?;
            game.require_controlled_permanent(player, source)?;
            let obj = game.object(source)?;
            let compiled = obj
                .activated_abilities()
                .position(|a| a.is_mana_ability());
            match compiled {
                Some(index) => game.run_mana_ability(player, source, index, ResolveContext::default(), None),
                None => {
                    let produced = land_mana_production(&obj.chars.subtypes, &obj.chars.oracle_text)
                        .filter(|_| obj.is_land())
                        .ok_or(RulesError::NoManaAbility(source.as_u32()))?;
                    if obj.is_tapped() {
                        return Err(RulesError::InvalidAction(format!("{} is tapped", obj.name())));
                    }
                    game.object_mut(source)?.tap();
                    game.player_mut(player)?.mana_pool.add(produced, 1);
                    log_if_verbose!(game.logger, "mana", "player {player} adds {produced}");
                    game.settle()
                }
            }
        })
    }

    /// Activate the `index`th activated ability of a permanent. Mana
    /// abilities resolve immediately and return `None`; anything else goes on
    /// the stack.
    pub fn activate_ability(
        &mut self,
        player: PlayerId,
        source: ObjectId,
        index: usize,
        context: ResolveContext,
        payment: Option<ManaPayment>,
    ) -> Result<Option<StackItemId>> {
        self.transactional(|game| {
            game.require_priority(player)?;
            game.require_controlled_permanent(player, source)?;
            let ability = game.activated_ability(source, index)?;
            if ability.is_mana_ability() {
                game.run_mana_ability(player, source, index, context, payment.as_ref())?;
                return Ok(None);
            }

            let mut context = context;
            context.source_id = Some(source);
            context.controller_id = Some(player);
            game.validate_targets(Some(&*ability), &context, player)?;
            game.pay_activation_cost(player, source, index, &ability, payment.as_ref())?;

            let item = StackItem {
                id: game.next_id(),
                kind: StackItemKind::ActivatedAbility,
                controller: player,
                payload: StackPayload::Ability {
                    source: Some(source),
                    ability,
                    context,
                },
            };
            let item_id = item.id;
            game.stack.push(item);
            game.logger.normal(
                "activate",
                &format!("player {player} activates {}'s ability", game.object(source)?.name()),
            );
            game.turn.priority.after_player_action();
            game.after_action()?;
            Ok(Some(item_id))
        })
    }

    fn require_controlled_permanent(&self, player: PlayerId, source: ObjectId) -> Result<()> {
        let obj = self.object(source)?;
        if obj.zone != Zone::Battlefield || obj.status.phased_out {
            return Err(RulesError::InvalidAction(format!(
                "{} is not on the battlefield",
                obj.name()
            )));
        }
        if obj.controller != player {
            return Err(RulesError::Permission(format!(
                "player {player} does not control {}",
                obj.name()
            )));
        }
        Ok(())
    }

    fn activated_ability(&self, source: ObjectId, index: usize) -> Result<Arc<RuntimeAbility>> {
        let obj = self.object(source)?;
        obj.activated_abilities().nth(index).cloned().ok_or_else(|| {
            RulesError::InvalidAction(format!("{} has no activated ability {index}", obj.name()))
        })
    }

    fn run_mana_ability(
        &mut self,
        player: PlayerId,
        source: ObjectId,
        index: usize,
        context: ResolveContext,
        payment: Option<&ManaPayment>,
    ) -> Result<()> {
        let ability = self.activated_ability(source, index)?;
        self.pay_activation_cost(player, source, index, &ability, payment)?;
        let mut context = context;
        context.source_id = Some(source);
        context.controller_id = Some(player);
        self.resolve_ability(&ability, &mut context)?;
        log_if_verbose!(
            self.logger,
            "mana",
            "player {player} pool: {}",
            self.player(player)?.mana_pool
        );
        self.settle()
    }

    /// Check timing and limits, then pay every part of an activation cost
    fn pay_activation_cost(
        &mut self,
        player: PlayerId,
        source: ObjectId,
        index: usize,
        ability: &RuntimeAbility,
        payment: Option<&ManaPayment>,
    ) -> Result<()> {
        let cost = ability.cost.clone().unwrap_or_default();
        let name = self.object(source)?.name().to_string();
        if cost.is_sorcery_speed() || cost.loyalty.is_some() {
            self.require_sorcery_timing(player)?;
        }

        let mut limits: Vec<(String, u32)> = Vec::new();
        if let Some(limit) = &cost.limit {
            limits.push((format!("{index}:{}", limit.scope), limit.count));
        }
        // MTG Rules 606.3: one loyalty ability per permanent per turn
        if cost.loyalty.is_some() {
            limits.push(("loyalty:turn".to_string(), 1));
        }
        for (key, count) in &limits {
            let used = self.object(source)?.activation_limits.get(key).copied().unwrap_or(0);
            if used >= *count {
                return Err(RulesError::LimitReached(format!(
                    "{name}: activation limit of {count} reached"
                )));
            }
        }

        if cost.tap {
            let obj = self.object(source)?;
            if obj.is_tapped() {
                return Err(RulesError::InvalidAction(format!("{name} is already tapped")));
            }
            if obj.is_creature() && obj.has_summoning_sickness(self.turn.turn_number) {
                return Err(RulesError::InvalidAction(format!(
                    "{name} has summoning sickness"
                )));
            }
            self.object_mut(source)?.tap();
        }

        if let Some(mana) = &cost.mana {
            let mana_cost = ManaCost::parse(mana, 0)?;
            self.pay_mana_cost(player, &mana_cost, payment)?;
        }

        if cost.life > 0 {
            let state = self.player_mut(player)?;
            if state.life < cost.life as i32 {
                return Err(RulesError::InvalidAction(format!(
                    "{name}: not enough life to pay {}",
                    cost.life
                )));
            }
            state.lose_life(cost.life as i32);
        }

        if let Some(change) = cost.loyalty {
            let obj = self.object_mut(source)?;
            if change >= 0 {
                obj.add_counters(CounterType::loyalty(), change as u32);
            } else {
                let needed = change.unsigned_abs();
                if obj.loyalty() < needed {
                    return Err(RulesError::InvalidAction(format!(
                        "{name} has only {} loyalty",
                        obj.loyalty()
                    )));
                }
                obj.remove_counters(&CounterType::loyalty(), needed);
            }
        }

        if let Some((kind, amount)) = &cost.remove_counters {
            let obj = self.object_mut(source)?;
            if obj.counter(kind) < *amount {
                return Err(RulesError::InvalidAction(format!(
                    "{name} doesn't have {amount} {kind} counter(s)"
                )));
            }
            obj.remove_counters(kind, *amount);
        }

        let obj = self.object_mut(source)?;
        for (key, _) in limits {
            *obj.activation_limits.entry(key).or_default() += 1;
        }

        if cost.sacrifice_self {
            self.move_object(source, Zone::Graveyard)?;
        }
        Ok(())
    }

    /// Declare attackers. An empty list declares that nothing attacks.
    pub fn declare_attackers(
        &mut self,
        player: PlayerId,
        attackers: &[ObjectId],
        defending_player: Option<PlayerId>,
        defending_object: Option<ObjectId>,
    ) -> Result<()> {
        self.transactional(|game| {
            game.require_priority(player)?;
            game.apply_declare_attackers(player, attackers, defending_player, defending_object)?;
            game.after_action()?;
            game.turn.priority.reset(game.turn.active_player);
            Ok(())
        })
    }

    /// Declare blockers as blocker -> attacker
    pub fn declare_blockers(&mut self, player: PlayerId, blocks: &BTreeMap<ObjectId, ObjectId>) -> Result<()> {
        self.transactional(|game| {
            game.require_in_progress()?;
            game.apply_declare_blockers(player, blocks)?;
            game.after_action()?;
            game.turn.priority.reset(game.turn.active_player);
            Ok(())
        })
    }

    /// Set the damage assignment order of a blocked attacker's blockers
    pub fn order_blockers(&mut self, player: PlayerId, attacker: ObjectId, order: &[ObjectId]) -> Result<()> {
        self.transactional(|game| {
            game.require_in_progress()?;
            game.apply_order_blockers(player, attacker, order)
        })
    }

    /// Deal one pass of combat damage with the attacking player's
    /// assignments. `pass` defaults to the next pass due.
    pub fn assign_combat_damage(
        &mut self,
        player: PlayerId,
        assignments: &DamageAssignments,
        pass: Option<CombatDamagePass>,
    ) -> Result<()> {
        self.transactional(|game| {
            game.require_in_progress()?;
            if game.turn.step != Step::CombatDamage {
                return Err(RulesError::Permission(format!(
                    "combat damage is assigned in the combat damage step, not {}",
                    game.turn.step
                )));
            }
            let attacking = game.turn.combat.as_ref().map(|c| c.attacking_player);
            if attacking != Some(player) {
                return Err(RulesError::Permission(
                    "only the attacking player assigns combat damage".to_string(),
                ));
            }
            let due = game.next_damage_pass()?.ok_or_else(|| {
                RulesError::Permission("combat damage has already been dealt".to_string())
            })?;
            let pass = pass.unwrap_or(due);
            if pass != due {
                return Err(RulesError::InvalidAction(format!(
                    "the next combat damage pass is {due:?}, not {pass:?}"
                )));
            }
            game.apply_combat_damage(assignments, pass)?;
            game.after_action()?;
            if !game.is_game_over() {
                game.turn.priority.reset(game.turn.active_player);
            }
            Ok(())
        })
    }

    /// Pass priority. When everyone has passed in succession the top of the
    /// stack resolves, or the game moves to the next step.
    pub fn pass_priority(&mut self, player: PlayerId) -> Result<PriorityOutcome> {
        self.transactional(|game| game.apply_pass_priority(player))
    }

    /// Choose which replacement effect applies to the next event with this
    /// key when more than one could
    pub fn set_replacement_choice(&mut self, event_key: impl Into<String>, effect_id: impl Into<String>) {
        self.replacements.set_choice(event_key, effect_id);
    }

    fn require_in_progress(&self) -> Result<()> {
        if !self.turn.started {
            return Err(RulesError::Permission("the game has not started".to_string()));
        }
        if self.is_game_over() {
            return Err(RulesError::Permission("the game is over".to_string()));
        }
        Ok(())
    }

    /// Total mana of each type in a player's pool, a convenience for callers
    pub fn mana_available(&self, player: PlayerId, mana: ManaType) -> Result<u32> {
        Ok(self.player(player)?.mana_pool.amount(mana))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::ChoiceValue;
    use crate::config::RulesConfig;
    use crate::core::{CardDefinition, Color, Supertype};
    use serde_json::json;

    fn graph(value: serde_json::Value) -> AbilityGraph {
        AbilityGraph::from_value(value).unwrap()
    }

    fn shock() -> CardDefinition {
        CardDefinition::new("Shock")
            .with_cost("{R}")
            .with_types(&[CardType::Instant])
            .with_ability(graph(json!({
                "abilityType": "spell",
                "rootNodeId": 1,
                "nodes": [{"id": 1, "type": "EFFECT", "data": {"type": "damage", "amount": 2}}]
            })))
    }

    /// A started game in Alice's first main phase
    fn main_phase() -> (GameState, PlayerId, PlayerId) {
        let mut game = GameState::new_two_player("Alice", "Bob", RulesConfig::default());
        game.logger.enable_capture();
        let (a, b) = (game.players[0].id, game.players[1].id);
        for owner in [a, b] {
            for _ in 0..5 {
                game.create_object(&CardDefinition::basic_land("Island"), owner, Zone::Library)
                    .unwrap();
            }
        }
        game.start_game().unwrap();
        while game.turn.step != Step::Main1 {
            let p = game.turn.priority_player().unwrap();
            game.pass_priority(p).unwrap();
        }
        (game, a, b)
    }

    fn pass_all(game: &mut GameState) -> PriorityOutcome {
        loop {
            let p = game.turn.priority_player().unwrap();
            let outcome = game.pass_priority(p).unwrap();
            if !matches!(outcome, PriorityOutcome::Passed { .. }) {
                return outcome;
            }
        }
    }

    #[test]
    fn test_play_land_once_per_turn() {
        let (mut game, alice, _) = main_phase();
        let a = game.create_object(&CardDefinition::basic_land("Mountain"), alice, Zone::Hand).unwrap();
        let b = game.create_object(&CardDefinition::basic_land("Mountain"), alice, Zone::Hand).unwrap();
        game.play_land(alice, a).unwrap();
        assert_eq!(game.turn.priority_player(), Some(alice));
        let err = game.play_land(alice, b).unwrap_err();
        assert!(matches!(err, RulesError::LimitReached(_)));
        assert_eq!(game.zone_of(b).unwrap(), Zone::Hand);
    }

    #[test]
    fn test_cast_shock_at_opponent() {
        let (mut game, alice, bob) = main_phase();
        let mountain = game.create_object(&CardDefinition::basic_land("Mountain"), alice, Zone::Battlefield).unwrap();
        let card = game.create_object(&shock(), alice, Zone::Hand).unwrap();
        game.activate_mana_ability(alice, mountain).unwrap();
        assert_eq!(game.mana_available(alice, ManaType::Color(Color::Red)).unwrap(), 1);

        let ctx = ResolveContext::new().with_target("target", bob);
        game.cast_spell(alice, card, CastOptions::with_context(ctx)).unwrap();
        assert_eq!(game.zone_of(card).unwrap(), Zone::Stack);
        assert_eq!(game.turn.priority_player(), Some(bob));

        let outcome = pass_all(&mut game);
        assert!(matches!(outcome, PriorityOutcome::Resolved { .. }));
        assert_eq!(game.player(bob).unwrap().life, 18);
        assert_eq!(game.zone_of(card).unwrap(), Zone::Graveyard);
        assert!(game.check_invariants().is_ok());
    }

    #[test]
    fn test_failed_cast_changes_nothing() {
        let (mut game, alice, bob) = main_phase();
        let card = game.create_object(&shock(), alice, Zone::Hand).unwrap();
        let before = game.player(alice).unwrap().mana_pool;
        let ctx = ResolveContext::new().with_target("target", bob);
        let err = game.cast_spell(alice, card, CastOptions::with_context(ctx)).unwrap_err();
        assert!(matches!(err, RulesError::InsufficientMana(_)));
        assert_eq!(game.zone_of(card).unwrap(), Zone::Hand);
        assert_eq!(game.player(alice).unwrap().mana_pool, before);
        assert!(game.stack.is_empty());
    }

    #[test]
    fn test_sorcery_speed_rejected_with_stack() {
        let (mut game, alice, bob) = main_phase();
        let bear = CardDefinition::creature("Grizzly Bears", "{0}", 2, 2);
        let first = game.create_object(&shock().with_cost("{0}"), alice, Zone::Hand).unwrap();
        let second = game.create_object(&bear, alice, Zone::Hand).unwrap();
        let ctx = ResolveContext::new().with_target("target", bob);
        game.cast_spell(alice, first, CastOptions::with_context(ctx)).unwrap();
        let p = game.turn.priority_player().unwrap();
        assert_eq!(p, bob);
        let err = game.cast_spell(alice, second, CastOptions::default()).unwrap_err();
        assert!(matches!(err, RulesError::Permission(_)));
    }

    #[test]
    fn test_commander_tax() {
        let (mut game, alice, _) = main_phase();
        let def = CardDefinition::creature("Commander", "{1}", 1, 1).with_supertype(Supertype::Legendary);
        let commander = game.create_object(&def, alice, Zone::Command).unwrap();
        game.set_commander(alice, commander).unwrap();

        let quote = game.prepare_cast(alice, commander, 0, &ResolveContext::new()).unwrap();
        assert_eq!(quote.mana_value, 1);
        assert!(!quote.can_pay());

        game.player_mut(alice).unwrap().commander_tax = 2;
        let quote = game.prepare_cast(alice, commander, 0, &ResolveContext::new()).unwrap();
        assert_eq!(quote.commander_tax, 4);
        assert_eq!(quote.mana_value, 5);
    }

    #[test]
    fn test_activation_limit_and_tap_cost() {
        let (mut game, alice, _) = main_phase();
        let def = CardDefinition::new("Totem")
            .with_cost("{0}")
            .with_types(&[CardType::Artifact])
            .with_ability(graph(json!({
                "abilityType": "activated",
                "rootNodeId": 1,
                "nodes": [
                    {"id": 1, "type": "ACTIVATED", "data": {"limit": {"count": 1}}},
                    {"id": 2, "type": "EFFECT", "data": {"type": "life", "amount": 1}}
                ],
                "edges": [{"from_": 1, "to": 2}]
            })));
        let totem = game.create_object(&def, alice, Zone::Battlefield).unwrap();
        game.activate_ability(alice, totem, 0, ResolveContext::new(), None)
            .unwrap()
            .unwrap();
        pass_all(&mut game);
        assert_eq!(game.player(alice).unwrap().life, 21);
        let err = game
            .activate_ability(alice, totem, 0, ResolveContext::new(), None)
            .unwrap_err();
        assert!(matches!(err, RulesError::LimitReached(_)));
    }

    #[test]
    fn test_ward_requires_payment_choice() {
        let (mut game, alice, bob) = main_phase();
        let warded = CardDefinition::creature("Warded", "{1}", 2, 2).with_keyword(Keyword::Ward("{2}".to_string()));
        let target = game.create_object(&warded, bob, Zone::Battlefield).unwrap();
        let card = game.create_object(&shock().with_cost("{0}"), alice, Zone::Hand).unwrap();

        let ctx = ResolveContext::new().with_target("target", target);
        let err = game.cast_spell(alice, card, CastOptions::with_context(ctx.clone())).unwrap_err();
        assert!(matches!(err, RulesError::IllegalTarget(_)));

        let paid = ctx.with_choice("ward_paid", ChoiceValue::Flag(true));
        game.cast_spell(alice, card, CastOptions::with_context(paid)).unwrap();
        pass_all(&mut game);
        assert_eq!(game.zone_of(target).unwrap(), Zone::Graveyard);
    }

    #[test]
    fn test_fizzle_when_target_leaves() {
        let (mut game, alice, bob) = main_phase();
        let bear = game
            .create_object(&CardDefinition::creature("Bear", "{1}", 2, 2), bob, Zone::Battlefield)
            .unwrap();
        let card = game.create_object(&shock().with_cost("{0}"), alice, Zone::Hand).unwrap();
        let ctx = ResolveContext::new().with_target("target", bear);
        game.cast_spell(alice, card, CastOptions::with_context(ctx)).unwrap();
        game.move_object(bear, Zone::Hand).unwrap();
        pass_all(&mut game);
        assert_eq!(game.zone_of(card).unwrap(), Zone::Graveyard);
        assert!(game.logger.contains("stack", "fizzles"));
    }
}
