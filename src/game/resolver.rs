//! Effect resolution
//!
//! Runs the conditions and effect nodes of a compiled ability against the
//! game state. Each effect's outcome is appended to the context's
//! `previous_results` so later nodes can refer to what earlier nodes found.

use crate::abilities::{
    Condition, Effect, EffectOutcome, EffectStatus, LayerOp, ResolutionReport, ResolutionStatus,
    ResolveContext, RuntimeAbility, TargetRef, TargetSpec,
};
use crate::config::ControlPolicy;
use crate::core::{
    CardDefinition, CardType, Color, Keyword, ManaCost, ManaType, ObjectId, PlayerId, TemporaryEffect,
};
use crate::game::damage::DamageEvent;
use crate::game::replacement::{ReplacementEffect, ReplacementKind};
use crate::game::stack::{StackItem, StackItemKind, StackPayload};
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::{Result, RulesError};

fn no_controller() -> RulesError {
    RulesError::InvalidAction("resolving without a controller".to_string())
}

impl GameState {
    /// Every object or player a specifier refers to in this context
    pub fn resolve_refs(&self, spec: &TargetSpec, ctx: &ResolveContext) -> Vec<TargetRef> {
        match spec {
            TargetSpec::Source => ctx.source_id.map(TargetRef::Object).into_iter().collect(),
            TargetSpec::Controller => ctx.controller_id.map(TargetRef::Player).into_iter().collect(),
            TargetSpec::Triggering => ctx
                .triggering_source_id
                .map(TargetRef::Object)
                .into_iter()
                .collect(),
            TargetSpec::Opponent => ctx
                .controller_id
                .and_then(|c| self.opponents(c).first().copied())
                .map(TargetRef::Player)
                .into_iter()
                .collect(),
            TargetSpec::EachOpponent => ctx
                .controller_id
                .map(|c| self.opponents(c))
                .unwrap_or_default()
                .into_iter()
                .map(TargetRef::Player)
                .collect(),
            TargetSpec::EachPlayer => self
                .active_player_ids()
                .into_iter()
                .map(TargetRef::Player)
                .collect(),
            TargetSpec::Attached => ctx
                .source_id
                .and_then(|s| self.attached_to(s))
                .map(TargetRef::Object)
                .into_iter()
                .collect(),
            TargetSpec::FromEffect(index) => ctx
                .previous_results
                .get(*index)
                .map(|r| {
                    r.objects
                        .iter()
                        .copied()
                        .map(TargetRef::Object)
                        .chain(r.players.iter().copied().map(TargetRef::Player))
                        .collect()
                })
                .unwrap_or_default(),
            TargetSpec::Key(key) => ctx.targets.get(key).cloned().unwrap_or_default(),
            TargetSpec::Indexed(key, index) => ctx
                .targets
                .get(key)
                .and_then(|refs| refs.get(*index))
                .copied()
                .into_iter()
                .collect(),
        }
    }

    fn resolve_objects(&self, spec: &TargetSpec, ctx: &ResolveContext) -> Vec<ObjectId> {
        self.resolve_refs(spec, ctx)
            .into_iter()
            .filter_map(|r| r.object())
            .filter(|id| self.objects.contains(*id))
            .collect()
    }

    /// Objects a specifier refers to that are on the battlefield
    fn resolve_permanents(&self, spec: &TargetSpec, ctx: &ResolveContext) -> Vec<ObjectId> {
        self.resolve_objects(spec, ctx)
            .into_iter()
            .filter(|id| self.objects.get(*id).is_ok_and(|o| o.zone == Zone::Battlefield))
            .collect()
    }

    fn resolve_players(&self, spec: &TargetSpec, ctx: &ResolveContext) -> Vec<PlayerId> {
        self.resolve_refs(spec, ctx)
            .into_iter()
            .filter_map(|r| r.player())
            .filter(|p| self.player(*p).is_ok_and(|p| p.is_active()))
            .collect()
    }

    pub fn evaluate_condition(&self, condition: &Condition, ctx: &ResolveContext) -> bool {
        let source = ctx.source_id.and_then(|id| self.objects.get(id).ok());
        let controller = ctx.controller_id.or(source.map(|o| o.controller));
        let Some(controller) = controller else {
            return false;
        };
        let Ok(player) = self.player(controller) else {
            return false;
        };
        let permanents = || {
            self.battlefield
                .cards
                .iter()
                .filter_map(|id| self.objects.get(*id).ok())
                .filter(move |o| o.controller == controller && !o.status.phased_out)
        };
        match condition {
            Condition::SourceOnBattlefield => source.is_some_and(|o| o.zone == Zone::Battlefield),
            Condition::SourceTapped => source.is_some_and(|o| o.is_tapped()),
            Condition::SourceUntapped => source.is_some_and(|o| !o.is_tapped()),
            Condition::YourTurn => self.turn.active_player == controller,
            Condition::LifeAtLeast { amount } => player.life >= *amount,
            Condition::LifeAtMost { amount } => player.life <= *amount,
            Condition::OpponentLifeAtMost { amount } => self
                .opponents(controller)
                .iter()
                .filter_map(|p| self.player(*p).ok())
                .any(|p| p.life <= *amount),
            Condition::ControlsAtLeast { card_type, count } => {
                permanents().filter(|o| o.is_type(*card_type)).count() as u32 >= *count
            }
            Condition::ControlsSubtype { subtype } => {
                permanents().any(|o| o.chars.has_subtype(subtype.as_str()))
            }
            Condition::HandEmpty => self
                .zones(controller)
                .is_ok_and(|z| z.hand.is_empty()),
            Condition::GraveyardAtLeast { count } => self
                .zones(controller)
                .is_ok_and(|z| z.graveyard.len() as u32 >= *count),
            Condition::Unknown { name } => {
                self.logger
                    .normal("resolve", &format!("unknown condition '{name}' treated as met"));
                true
            }
        }
    }

    /// Check conditions, then run every effect node in order
    pub fn resolve_ability(
        &mut self,
        ability: &RuntimeAbility,
        ctx: &mut ResolveContext,
    ) -> Result<ResolutionReport> {
        if let Some(failed) = ability
            .conditions
            .iter()
            .find(|c| !self.evaluate_condition(c, ctx))
        {
            self.logger
                .normal("resolve", &format!("condition {failed:?} not met; nothing happens"));
            return Ok(ResolutionReport::condition_failed());
        }

        let mut outcomes = Vec::with_capacity(ability.effects.len());
        for effect in &ability.effects {
            let outcome = self.execute_effect(effect, ctx)?;
            log_if_verbose!(
                self.logger,
                "resolve",
                "{} -> {:?} (amount {})",
                outcome.effect,
                outcome.status,
                outcome.amount
            );
            ctx.previous_results.push(outcome.clone());
            outcomes.push(outcome);
        }
        Ok(ResolutionReport {
            status: ResolutionStatus::Resolved,
            effects: outcomes,
        })
    }

    fn add_temporary_effect(&mut self, id: ObjectId, op: LayerOp, source: Option<ObjectId>, until_end_of_turn: bool) -> Result<()> {
        let stamp = self.stamp();
        self.object_mut(id)?.temporary_effects.push(TemporaryEffect {
            op,
            stamp,
            source,
            until_end_of_turn,
        });
        Ok(())
    }

    fn replacement_id(&mut self, prefix: &str, given: &Option<String>) -> String {
        match given {
            Some(id) => id.clone(),
            None => format!("{prefix}-{}", self.next_sequence()),
        }
    }

    /// Put each of `ids` into a zone, returning those that moved
    fn move_all(&mut self, ids: &[ObjectId], to: Zone) -> Result<Vec<ObjectId>> {
        let mut moved = Vec::with_capacity(ids.len());
        for &id in ids {
            if self.object(id)?.zone != to {
                self.move_object(id, to)?;
                moved.push(id);
            }
        }
        Ok(moved)
    }

    /// Run one effect node
    pub fn execute_effect(&mut self, effect: &Effect, ctx: &ResolveContext) -> Result<EffectOutcome> {
        let name = effect.name().to_string();
        let applied = || EffectOutcome::applied(&name);
        let skipped = || EffectOutcome::skipped(&name);

        let outcome = match effect {
            Effect::Damage { amount, target } => {
                let amount = amount.resolve(ctx).max(0) as u32;
                let refs = self.resolve_refs(target, ctx);
                if refs.is_empty() {
                    return Ok(skipped());
                }
                let mut dealt = 0;
                for target in &refs {
                    dealt += self.deal_damage(DamageEvent::new(ctx.source_id, *target, amount))?;
                }
                applied()
                    .with_objects(refs.iter().filter_map(|r| r.object()).collect())
                    .with_players(refs.iter().filter_map(|r| r.player()).collect())
                    .with_amount(dealt as i32)
            }

            Effect::Draw { amount, player } => {
                let count = amount.resolve(ctx).max(0);
                let players = self.resolve_players(player, ctx);
                let mut drawn = Vec::new();
                for p in &players {
                    for _ in 0..count {
                        match self.draw_card(*p)? {
                            Some(card) => drawn.push(card),
                            None if self.player(*p)?.drew_from_empty_library => break,
                            None => {}
                        }
                    }
                }
                applied()
                    .with_amount(drawn.len() as i32)
                    .with_objects(drawn)
                    .with_players(players)
            }

            Effect::Life { amount, player } => {
                let delta = amount.resolve(ctx);
                let players = self.resolve_players(player, ctx);
                for p in &players {
                    let state = self.player_mut(*p)?;
                    if delta >= 0 {
                        state.gain_life(delta);
                    } else {
                        state.lose_life(-delta);
                    }
                }
                applied().with_players(players).with_amount(delta)
            }

            Effect::Mana { mana, any, player } => {
                let cost = ManaCost::parse(mana, 0)?;
                let players = self.resolve_players(player, ctx);
                let mut total = 0;
                for p in &players {
                    let pool = &mut self.player_mut(*p)?.mana_pool;
                    for color in Color::ALL {
                        pool.add(ManaType::Color(color), cost.colored_of(color));
                    }
                    pool.add(ManaType::Colorless, cost.colorless + cost.generic);
                    pool.add(ManaType::Any, *any);
                    total += cost.mana_value() + any;
                }
                applied().with_players(players).with_amount(total as i32)
            }

            Effect::Token {
                count,
                name: token_name,
                power,
                toughness,
                types,
                subtypes,
                colors,
                keywords,
                controller,
            } => {
                let count = count.resolve(ctx).max(0);
                let mut def = CardDefinition::new(token_name.clone());
                def.types = if types.is_empty() {
                    vec![CardType::Creature]
                } else {
                    types.clone()
                };
                def.subtypes = subtypes.clone();
                def.colors = Some(colors.clone());
                def.keywords = keywords.clone();
                if def.types.contains(&CardType::Creature) {
                    def = def.with_pt(*power, *toughness);
                }
                let mut created = Vec::new();
                for p in self.resolve_players(controller, ctx) {
                    for _ in 0..count {
                        created.push(self.create_token(&def, p)?);
                    }
                }
                applied().with_amount(created.len() as i32).with_objects(created)
            }

            Effect::Counters { kind, amount, target } => {
                let amount = amount.resolve(ctx);
                let refs = self.resolve_refs(target, ctx);
                let mut objects = Vec::new();
                for target in refs {
                    match target {
                        TargetRef::Object(id) if self.object(id)?.zone == Zone::Battlefield => {
                            let obj = self.object_mut(id)?;
                            if amount >= 0 {
                                obj.add_counters(kind.clone(), amount as u32);
                            } else {
                                obj.remove_counters(kind, amount.unsigned_abs());
                            }
                            objects.push(id);
                        }
                        TargetRef::Player(p) if kind.as_str() == "poison" && amount > 0 => {
                            self.player_mut(p)?.poison += amount as u32;
                        }
                        _ => {}
                    }
                }
                applied().with_objects(objects).with_amount(amount)
            }

            Effect::Tap { target } | Effect::Untap { target } => {
                let tap = matches!(effect, Effect::Tap { .. });
                let ids = self.resolve_permanents(target, ctx);
                for id in &ids {
                    let obj = self.object_mut(*id)?;
                    if tap {
                        obj.tap();
                    } else {
                        obj.untap();
                    }
                }
                applied().with_objects(ids)
            }

            Effect::Destroy { target } => {
                let mut destroyed = Vec::new();
                for id in self.resolve_permanents(target, ctx) {
                    let obj = self.object(id)?;
                    if obj.has_keyword(&Keyword::Indestructible) {
                        continue;
                    }
                    if obj.status.regeneration_shields > 0 {
                        self.regenerate(id)?;
                        continue;
                    }
                    self.move_object(id, Zone::Graveyard)?;
                    destroyed.push(id);
                }
                applied().with_objects(destroyed)
            }

            Effect::Exile { target } => {
                let ids = self.resolve_objects(target, ctx);
                let moved = self.move_all(&ids, Zone::Exile)?;
                applied().with_objects(moved)
            }

            Effect::Return { target } => {
                let ids = self.resolve_permanents(target, ctx);
                let moved = self.move_all(&ids, Zone::Hand)?;
                applied().with_objects(moved)
            }

            Effect::Sacrifice { target } => {
                let ids = self.resolve_permanents(target, ctx);
                let moved = self.move_all(&ids, Zone::Graveyard)?;
                applied().with_objects(moved)
            }

            Effect::Search {
                zone,
                player,
                key,
                types,
                max,
                to,
                shuffle,
            } => {
                let owner = self
                    .resolve_players(player, ctx)
                    .first()
                    .copied()
                    .or(ctx.controller_id)
                    .ok_or_else(no_controller)?;
                let wanted: Vec<ObjectId> = match ctx.choice_objects(key) {
                    Some(ids) => ids.to_vec(),
                    None => ctx
                        .targets
                        .get(key)
                        .map(|refs| refs.iter().filter_map(|r| r.object()).collect())
                        .unwrap_or_default(),
                };
                let mut found: Vec<ObjectId> = wanted
                    .into_iter()
                    .filter(|id| {
                        self.objects.get(*id).is_ok_and(|o| {
                            o.zone == *zone
                                && o.owner == owner
                                && (types.is_empty() || types.iter().any(|t| o.is_type(*t)))
                        })
                    })
                    .collect();
                if let Some(max) = max {
                    found.truncate(*max as usize);
                }
                if let Some(to) = to {
                    self.move_all(&found, *to)?;
                }
                if *shuffle {
                    self.shuffle_library(owner)?;
                }
                applied()
                    .with_amount(found.len() as i32)
                    .with_objects(found)
                    .with_players(vec![owner])
            }

            Effect::PutOntoBattlefield { from_effect, tapped } => {
                let controller = ctx.controller_id.ok_or_else(no_controller)?;
                let ids = ctx
                    .previous_results
                    .get(*from_effect)
                    .map(|r| r.objects.clone())
                    .unwrap_or_default();
                let mut placed = Vec::new();
                for id in ids {
                    if !self.objects.contains(id) || self.object(id)?.zone == Zone::Battlefield {
                        continue;
                    }
                    if self.put_onto_battlefield(id, controller)? != Zone::Battlefield {
                        continue;
                    }
                    if *tapped {
                        self.object_mut(id)?.tap();
                    }
                    placed.push(id);
                }
                applied().with_objects(placed)
            }

            Effect::Attach {
                from_effect,
                object,
                to,
            } => {
                let attachments = match from_effect {
                    Some(index) => ctx
                        .previous_results
                        .get(*index)
                        .map(|r| r.objects.clone())
                        .unwrap_or_default(),
                    None => self.resolve_objects(object, ctx),
                };
                let Some(host) = self.resolve_permanents(to, ctx).first().copied() else {
                    return Ok(skipped());
                };
                let mut attached = Vec::new();
                for id in attachments {
                    if id != host && self.object(id)?.zone == Zone::Battlefield {
                        self.attach(id, host)?;
                        attached.push(id);
                    }
                }
                applied().with_objects(attached)
            }

            Effect::Fight { first, second } => {
                let a = self.resolve_permanents(first, ctx).first().copied();
                let b = self.resolve_permanents(second, ctx).first().copied();
                let (Some(a), Some(b)) = (a, b) else {
                    return Ok(skipped());
                };
                if !self.object(a)?.is_creature() || !self.object(b)?.is_creature() {
                    return Ok(skipped());
                }
                let power_a = self.object(a)?.power().max(0) as u32;
                let power_b = self.object(b)?.power().max(0) as u32;
                self.deal_damage(DamageEvent::new(Some(a), TargetRef::Object(b), power_a))?;
                self.deal_damage(DamageEvent::new(Some(b), TargetRef::Object(a), power_b))?;
                applied().with_objects(vec![a, b])
            }

            Effect::Mill { amount, player } => {
                let count = amount.resolve(ctx).max(0) as usize;
                let mut milled = Vec::new();
                for p in self.resolve_players(player, ctx) {
                    milled.extend(self.mill(p, count)?);
                }
                applied().with_amount(milled.len() as i32).with_objects(milled)
            }

            Effect::Discard { amount, player, key } => {
                let count = amount.resolve(ctx).max(0) as usize;
                let chosen = ctx.choice_objects(key).unwrap_or_default();
                let mut discarded = Vec::new();
                for p in self.resolve_players(player, ctx) {
                    let hand = self.zone_cards(p, Zone::Hand)?;
                    let mut picks: Vec<ObjectId> = chosen.iter().copied().filter(|id| hand.contains(id)).collect();
                    for id in hand.iter().rev() {
                        if !picks.contains(id) {
                            picks.push(*id);
                        }
                    }
                    picks.truncate(count);
                    discarded.extend(self.move_all(&picks, Zone::Graveyard)?);
                }
                applied().with_amount(discarded.len() as i32).with_objects(discarded)
            }

            Effect::Scry { amount } => {
                let controller = ctx.controller_id.ok_or_else(no_controller)?;
                let count = amount.resolve(ctx).max(0) as usize;
                let bottom = ctx.choice_objects("scry_bottom").unwrap_or_default().to_vec();
                let library = &mut self.zones_mut(controller)?.library;
                let seen = library.top_n(count);
                for id in seen.iter().filter(|id| bottom.contains(id)) {
                    library.remove(*id);
                    library.add_to_bottom(*id);
                }
                applied().with_amount(seen.len() as i32).with_objects(seen)
            }

            Effect::LookAt { amount, player } | Effect::Reveal { amount, player } => {
                let count = amount.resolve(ctx).max(0) as usize;
                let mut seen = Vec::new();
                for p in self.resolve_players(player, ctx) {
                    seen.extend(self.zones(p)?.library.top_n(count));
                }
                self.logger
                    .normal("resolve", &format!("{name}: {} card(s)", seen.len()));
                applied().with_amount(seen.len() as i32).with_objects(seen)
            }

            Effect::CopySpell { target } => {
                let controller = ctx.controller_id.ok_or_else(no_controller)?;
                let mut copied = Vec::new();
                for id in self.resolve_objects(target, ctx) {
                    let Some(original) = self.stack.find_spell(id).cloned() else {
                        continue;
                    };
                    let StackPayload::Spell {
                        source,
                        destination,
                        ability,
                        context,
                        ..
                    } = original.payload
                    else {
                        continue;
                    };
                    let item = StackItem {
                        id: self.next_id(),
                        kind: StackItemKind::Spell,
                        controller,
                        payload: StackPayload::Spell {
                            source,
                            destination,
                            ability,
                            context: ResolveContext {
                                controller_id: Some(controller),
                                ..context
                            },
                            copy_of: Some(original.id),
                        },
                    };
                    self.logger
                        .normal("stack", &format!("copy of {} put on the stack", self.object(source)?.name()));
                    self.stack.push(item);
                    copied.push(source);
                }
                applied().with_objects(copied)
            }

            Effect::CounterSpell { target } => {
                let mut countered = Vec::new();
                for id in self.resolve_objects(target, ctx) {
                    let Some(item_id) = self.stack.find_spell(id).map(|item| item.id) else {
                        continue;
                    };
                    self.stack.remove(item_id);
                    self.move_object(id, Zone::Graveyard)?;
                    self.logger
                        .normal("stack", &format!("{} is countered", self.object(id)?.name()));
                    countered.push(id);
                }
                applied().with_objects(countered)
            }

            Effect::Regenerate { target } => {
                let ids = self.resolve_permanents(target, ctx);
                for id in &ids {
                    self.object_mut(*id)?.status.regeneration_shields += 1;
                }
                applied().with_objects(ids)
            }

            Effect::PhaseOut { target } => {
                let mut phased = Vec::new();
                for id in self.resolve_permanents(target, ctx) {
                    // Attached permanents phase out with their host
                    let mut group = vec![id];
                    group.extend(self.attached_objects(id));
                    for member in group {
                        self.remove_from_combat(member);
                        self.object_mut(member)?.status.phased_out = true;
                        phased.push(member);
                    }
                }
                applied().with_objects(phased)
            }

            Effect::Transform { target } => {
                let mut transformed = Vec::new();
                for id in self.resolve_permanents(target, ctx) {
                    if self.object_mut(id)?.swap_faces() {
                        transformed.push(id);
                    }
                }
                self.recompute_continuous_effects()?;
                applied().with_objects(transformed)
            }

            Effect::Flicker { target } => {
                let mut returned = Vec::new();
                for id in self.resolve_permanents(target, ctx) {
                    if self.move_object(id, Zone::Exile)? != Zone::Exile {
                        continue;
                    }
                    let new_id = self.rekey_object(id)?;
                    self.move_object(new_id, Zone::Battlefield)?;
                    returned.push(new_id);
                }
                applied().with_objects(returned)
            }

            Effect::ChangeControl {
                target,
                new_controller,
                until_end_of_turn,
            } => {
                let Some(new_controller) = self.resolve_players(new_controller, ctx).first().copied() else {
                    return Ok(skipped());
                };
                let ids = self.resolve_permanents(target, ctx);
                for id in &ids {
                    self.add_temporary_effect(
                        *id,
                        LayerOp::SetController(new_controller),
                        ctx.source_id,
                        *until_end_of_turn,
                    )?;
                    if self.config.control_policy == ControlPolicy::Sticky {
                        self.object_mut(*id)?.base_controller = new_controller;
                    }
                }
                self.recompute_continuous_effects()?;
                applied().with_objects(ids).with_players(vec![new_controller])
            }

            Effect::PreventDamage {
                target,
                amount,
                uses,
                source,
                effect_id,
            } => {
                let from = source
                    .as_ref()
                    .and_then(|s| self.resolve_objects(s, ctx).first().copied());
                let refs = self.resolve_refs(target, ctx);
                for target in &refs {
                    let id = self.replacement_id("prevent", effect_id);
                    let mut effect = ReplacementEffect::new(id, ReplacementKind::PreventDamage)
                        .protecting(*target)
                        .until_end_of_turn();
                    effect.amount = *amount;
                    effect.uses = *uses;
                    effect.source = from;
                    self.add_replacement_effect(effect);
                }
                applied()
                    .with_objects(refs.iter().filter_map(|r| r.object()).collect())
                    .with_players(refs.iter().filter_map(|r| r.player()).collect())
            }

            Effect::RedirectDamage {
                target,
                to,
                amount,
                uses,
                source,
                effect_id,
            } => {
                let Some(to) = self.resolve_refs(to, ctx).first().copied() else {
                    return Ok(skipped());
                };
                let from = source
                    .as_ref()
                    .and_then(|s| self.resolve_objects(s, ctx).first().copied());
                let refs = self.resolve_refs(target, ctx);
                for target in refs.iter().filter(|r| **r != to) {
                    let id = self.replacement_id("redirect", effect_id);
                    let mut effect = ReplacementEffect::new(id, ReplacementKind::RedirectDamage { to })
                        .protecting(*target)
                        .until_end_of_turn();
                    effect.amount = *amount;
                    effect.uses = *uses;
                    effect.source = from;
                    self.add_replacement_effect(effect);
                }
                applied()
            }

            Effect::AddPoison { amount, player } => {
                let amount = amount.resolve(ctx).max(0) as u32;
                let players = self.resolve_players(player, ctx);
                for p in &players {
                    self.player_mut(*p)?.poison += amount;
                }
                applied().with_players(players).with_amount(amount as i32)
            }

            Effect::Pump {
                target,
                power,
                toughness,
            } => {
                let ids = self.resolve_permanents(target, ctx);
                for id in &ids {
                    self.add_temporary_effect(*id, LayerOp::ModifyPt(*power, *toughness), ctx.source_id, true)?;
                }
                self.recompute_continuous_effects()?;
                applied().with_objects(ids)
            }

            Effect::GrantKeyword { target, keyword } => {
                let ids = self.resolve_permanents(target, ctx);
                for id in &ids {
                    self.add_temporary_effect(
                        *id,
                        LayerOp::AddKeywords(vec![keyword.clone()]),
                        ctx.source_id,
                        true,
                    )?;
                }
                self.recompute_continuous_effects()?;
                applied().with_objects(ids)
            }

            Effect::Shuffle { player } => {
                let players = self.resolve_players(player, ctx);
                for p in &players {
                    self.shuffle_library(*p)?;
                }
                applied().with_players(players)
            }

            Effect::Unhandled { name } => {
                self.logger
                    .normal("resolve", &RulesError::UnhandledEffect(name.clone()).to_string());
                EffectOutcome {
                    status: EffectStatus::Unhandled,
                    ..EffectOutcome::applied(name)
                }
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::{AbilityGraph, Amount, ChoiceValue};
    use crate::config::RulesConfig;
    use crate::core::CounterType;
    use serde_json::json;

    fn setup() -> (GameState, PlayerId, PlayerId) {
        let mut game = GameState::new_two_player("Alice", "Bob", RulesConfig::default());
        game.logger.enable_capture();
        let (a, b) = (game.players[0].id, game.players[1].id);
        (game, a, b)
    }

    fn ctx_for(source: Option<ObjectId>, controller: PlayerId) -> ResolveContext {
        ResolveContext {
            source_id: source,
            controller_id: Some(controller),
            ..ResolveContext::default()
        }
    }

    fn bear(game: &mut GameState, owner: PlayerId) -> ObjectId {
        game.create_object(&CardDefinition::creature("Bear", "{1}{G}", 2, 2), owner, Zone::Battlefield)
            .unwrap()
    }

    fn compile(value: serde_json::Value) -> RuntimeAbility {
        RuntimeAbility::compile(&AbilityGraph::from_value(value).unwrap()).unwrap()
    }

    #[test]
    fn test_unhandled_effect_keeps_going() {
        let (mut game, alice, _) = setup();
        let ability = compile(json!({
            "abilityType": "spell",
            "rootNodeId": 1,
            "nodes": [
                {"id": 1, "type": "EFFECT", "data": {"type": "venture_into_dungeon"}},
                {"id": 2, "type": "EFFECT", "data": {"type": "life", "amount": 3}}
            ],
            "edges": [{"from_": 1, "to": 2}]
        }));
        let mut ctx = ctx_for(None, alice);
        let report = game.resolve_ability(&ability, &mut ctx).unwrap();
        assert_eq!(report.status, ResolutionStatus::Resolved);
        assert_eq!(report.effects[0].status, EffectStatus::Unhandled);
        assert_eq!(game.player(alice).unwrap().life, 23);
        assert!(game.logger.contains("resolve", "venture_into_dungeon"));
    }

    #[test]
    fn test_failed_condition_stops_resolution() {
        let (mut game, _, bob) = setup();
        let ability = compile(json!({
            "abilityType": "spell",
            "rootNodeId": 1,
            "nodes": [
                {"id": 1, "type": "CONDITION", "data": {"kind": "life_at_most", "amount": 5}},
                {"id": 2, "type": "EFFECT", "data": {"type": "draw", "amount": 2}}
            ],
            "edges": [{"from_": 1, "to": 2}]
        }));
        let mut ctx = ctx_for(None, bob);
        let report = game.resolve_ability(&ability, &mut ctx).unwrap();
        assert_eq!(report.status, ResolutionStatus::ConditionFailed);
        assert!(report.effects.is_empty());
    }

    #[test]
    fn test_search_then_put_onto_battlefield() {
        let (mut game, alice, _) = setup();
        let forest = game
            .create_object(&CardDefinition::basic_land("Forest"), alice, Zone::Library)
            .unwrap();
        let ability = compile(json!({
            "abilityType": "spell",
            "rootNodeId": 1,
            "nodes": [
                {"id": 1, "type": "EFFECT", "data": {"type": "search", "types": ["Land"], "max": 1}},
                {"id": 2, "type": "EFFECT", "data": {"type": "put_onto_battlefield", "fromEffect": 0, "tapped": true}}
            ],
            "edges": [{"from_": 1, "to": 2}]
        }));
        let mut ctx = ctx_for(None, alice).with_choice("search", ChoiceValue::Objects(vec![forest]));
        let report = game.resolve_ability(&ability, &mut ctx).unwrap();
        assert_eq!(report.effects[0].objects, vec![forest]);
        let obj = game.object(forest).unwrap();
        assert_eq!(obj.zone, Zone::Battlefield);
        assert!(obj.is_tapped());
    }

    #[test]
    fn test_destroy_respects_indestructible_and_regeneration() {
        let (mut game, alice, bob) = setup();
        let plain = bear(&mut game, bob);
        let shielded = bear(&mut game, bob);
        game.object_mut(shielded).unwrap().status.regeneration_shields = 1;
        let ctx = ctx_for(None, alice)
            .with_target("target", plain)
            .with_target("target", shielded);
        let outcome = game
            .execute_effect(&Effect::Destroy { target: TargetSpec::target() }, &ctx)
            .unwrap();
        assert_eq!(outcome.objects, vec![plain]);
        assert_eq!(game.zone_of(plain).unwrap(), Zone::Graveyard);
        assert_eq!(game.zone_of(shielded).unwrap(), Zone::Battlefield);
        assert!(game.object(shielded).unwrap().is_tapped());
    }

    #[test]
    fn test_flicker_gives_new_identity() {
        let (mut game, alice, _) = setup();
        let id = bear(&mut game, alice);
        game.object_mut(id)
            .unwrap()
            .add_counters(CounterType::plus_one(), 2);
        let ctx = ctx_for(None, alice).with_target("target", id);
        let outcome = game
            .execute_effect(&Effect::Flicker { target: TargetSpec::target() }, &ctx)
            .unwrap();
        let new_id = outcome.objects[0];
        assert_ne!(new_id, id);
        assert!(game.object(id).is_err());
        let obj = game.object(new_id).unwrap();
        assert_eq!(obj.zone, Zone::Battlefield);
        assert_eq!(obj.counter(&CounterType::plus_one()), 0);
        assert!(game.check_invariants().is_ok());
    }

    #[test]
    fn test_pump_lasts_and_is_layered() {
        let (mut game, alice, _) = setup();
        let id = bear(&mut game, alice);
        let ctx = ctx_for(None, alice).with_target("target", id);
        game.execute_effect(
            &Effect::Pump {
                target: TargetSpec::target(),
                power: 3,
                toughness: 3,
            },
            &ctx,
        )
        .unwrap();
        game.recompute_continuous_effects().unwrap();
        assert_eq!(game.object(id).unwrap().power(), 5);
    }

    #[test]
    fn test_change_control_policies() {
        for (policy, base_after) in [(ControlPolicy::Layered, 1), (ControlPolicy::Sticky, 0)] {
            let config = RulesConfig::default().with_control_policy(policy);
            let mut game = GameState::new_two_player("Alice", "Bob", config);
            let (alice, bob) = (game.players[0].id, game.players[1].id);
            let id = bear(&mut game, bob);
            let ctx = ctx_for(None, alice).with_target("target", id);
            let effect = Effect::ChangeControl {
                target: TargetSpec::target(),
                new_controller: TargetSpec::you(),
                until_end_of_turn: false,
            };
            game.execute_effect(&effect, &ctx).unwrap();
            let obj = game.object(id).unwrap();
            assert_eq!(obj.controller, alice);
            assert_eq!(obj.base_controller.as_u32(), base_after);
        }
    }

    #[test]
    fn test_mana_for_each_player_totals_all_pools() {
        let (mut game, alice, bob) = setup();
        let ctx = ctx_for(None, alice);
        let outcome = game
            .execute_effect(
                &Effect::Mana {
                    mana: "{R}{R}".to_string(),
                    any: 0,
                    player: TargetSpec::EachPlayer,
                },
                &ctx,
            )
            .unwrap();
        assert_eq!(outcome.amount, 4);
        for p in [alice, bob] {
            assert_eq!(game.player(p).unwrap().mana_pool.amount(ManaType::Color(Color::Red)), 2);
        }
    }

    #[test]
    fn test_mana_effect_fills_pool() {
        let (mut game, alice, _) = setup();
        let ctx = ctx_for(None, alice);
        game.execute_effect(
            &Effect::Mana {
                mana: "{G}{G}{C}".to_string(),
                any: 1,
                player: TargetSpec::you(),
            },
            &ctx,
        )
        .unwrap();
        let pool = game.player(alice).unwrap().mana_pool;
        assert_eq!(pool.amount(ManaType::Color(Color::Green)), 2);
        assert_eq!(pool.amount(ManaType::Colorless), 1);
        assert_eq!(pool.amount(ManaType::Any), 1);
    }

    #[test]
    fn test_discard_prefers_chosen_cards() {
        let (mut game, alice, _) = setup();
        let cards: Vec<ObjectId> = (0..3)
            .map(|i| {
                game.create_object(&CardDefinition::creature(format!("Card {i}"), "{1}", 1, 1), alice, Zone::Hand)
                    .unwrap()
            })
            .collect();
        let ctx = ctx_for(None, alice).with_choice("discard", ChoiceValue::Objects(vec![cards[0]]));
        let outcome = game
            .execute_effect(
                &Effect::Discard {
                    amount: Amount::Fixed(2),
                    player: TargetSpec::you(),
                    key: "discard".to_string(),
                },
                &ctx,
            )
            .unwrap();
        assert_eq!(outcome.objects, vec![cards[0], cards[2]]);
        assert_eq!(game.zone_cards(alice, Zone::Hand).unwrap(), vec![cards[1]]);
    }

    #[test]
    fn test_redirect_effect_registers_replacement() {
        let (mut game, alice, _) = setup();
        let guard = bear(&mut game, alice);
        let ctx = ctx_for(Some(guard), alice);
        game.execute_effect(
            &Effect::RedirectDamage {
                target: TargetSpec::you(),
                to: TargetSpec::source(),
                amount: Some(2),
                uses: None,
                source: None,
                effect_id: Some("guard".to_string()),
            },
            &ctx,
        )
        .unwrap();
        let dealt = game
            .deal_damage(DamageEvent::new(None, TargetRef::Player(alice), 3))
            .unwrap();
        assert_eq!(dealt, 1);
        assert_eq!(game.object(guard).unwrap().status.damage, 2);
        assert!(game.replacements.is_empty());
    }
}
