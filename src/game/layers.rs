//! Continuous effects
//!
//! MTG Rules 613: characteristics of permanents are recomputed from their
//! base values by applying static abilities and temporary effects layer by
//! layer. Control and type changes can change which effects apply, so the
//! whole computation is repeated until nothing changes, up to
//! `layer_iteration_limit` times.

use crate::abilities::{Affected, Layer, LayerOp, Modification, ResolveContext};
use crate::core::{CardType, Characteristics, CounterType, EffectStamp, Keyword, ObjectId, PlayerId};
use crate::game::state::GameState;
use crate::Result;
use rustc_hash::FxHashMap;

/// One continuous effect waiting to be applied
#[derive(Debug, Clone)]
struct LayeredEffect {
    stamp: EffectStamp,
    order: usize,
    source: Option<ObjectId>,
    controller: PlayerId,
    /// Static effects pick their objects when applied; temporary effects
    /// apply to the object carrying them
    affects: Option<Affected>,
    carrier: Option<ObjectId>,
    op: LayerOp,
}

type Signature = Vec<(ObjectId, PlayerId, Characteristics)>;

impl GameState {
    fn layer_signature(&self) -> Signature {
        self.battlefield
            .cards
            .iter()
            .filter_map(|id| self.objects.get(*id).ok())
            .map(|o| (o.id, o.controller, o.chars.clone()))
            .collect()
    }

    /// Objects a static effect applies to right now
    pub(crate) fn affected_objects(&self, affects: &Affected, source: ObjectId, controller: PlayerId) -> Vec<ObjectId> {
        if let Affected::Attached = affects {
            return self.attached_to(source).into_iter().collect();
        }
        self.battlefield
            .cards
            .iter()
            .filter_map(|id| self.objects.get(*id).ok())
            .filter(|o| !o.status.phased_out)
            .filter(|o| match affects {
                Affected::Source => o.id == source,
                Affected::Attached => false,
                Affected::CreaturesYouControl => o.is_creature() && o.controller == controller,
                Affected::OtherCreaturesYouControl => {
                    o.is_creature() && o.controller == controller && o.id != source
                }
                Affected::CreaturesOpponentsControl => o.is_creature() && o.controller != controller,
                Affected::AllCreatures => o.is_creature(),
                Affected::OtherCreatures => o.is_creature() && o.id != source,
                Affected::PermanentsYouControl => o.controller == controller,
                Affected::LandsYouControl => o.is_land() && o.controller == controller,
                Affected::ArtifactsYouControl => {
                    o.is_type(CardType::Artifact) && o.controller == controller
                }
                Affected::CreaturesWithSubtype(subtype) => {
                    o.is_creature() && o.chars.has_subtype(subtype.as_str())
                }
            })
            .map(|o| o.id)
            .collect()
    }

    /// Static effects of every permanent whose conditions hold, plus each
    /// object's temporary effects. Also returns extra land plays per player.
    fn gather_continuous_effects(&self) -> (Vec<LayeredEffect>, FxHashMap<PlayerId, u32>) {
        let mut effects = Vec::new();
        let mut extra_lands: FxHashMap<PlayerId, u32> = FxHashMap::default();

        for id in &self.battlefield.cards {
            let Ok(obj) = self.objects.get(*id) else {
                continue;
            };
            if obj.status.phased_out {
                continue;
            }
            let ctx = ResolveContext {
                source_id: Some(obj.id),
                controller_id: Some(obj.controller),
                ..ResolveContext::default()
            };
            for ability in &obj.abilities {
                if ability.statics.is_empty()
                    || !ability.conditions.iter().all(|c| self.evaluate_condition(c, &ctx))
                {
                    continue;
                }
                for effect in &ability.statics {
                    if let Modification::ExtraLandPlays { count } = effect.modification {
                        *extra_lands.entry(obj.controller).or_default() += count;
                        continue;
                    }
                    let Some(op) = effect.modification.to_op(obj.id, obj.controller) else {
                        continue;
                    };
                    effects.push(LayeredEffect {
                        stamp: EffectStamp {
                            turn: obj.entered_turn.unwrap_or(0),
                            sequence: obj.timestamp,
                        },
                        order: effects.len(),
                        source: Some(obj.id),
                        controller: obj.controller,
                        affects: Some(effect.affects.clone()),
                        carrier: None,
                        op,
                    });
                }
            }
            for temp in &obj.temporary_effects {
                effects.push(LayeredEffect {
                    stamp: temp.stamp,
                    order: effects.len(),
                    source: temp.source,
                    controller: obj.controller,
                    affects: None,
                    carrier: Some(obj.id),
                    op: temp.op.clone(),
                });
            }
        }
        (effects, extra_lands)
    }

    fn apply_op(&mut self, target: ObjectId, op: &LayerOp) -> Result<()> {
        // Characteristic-defining counts are taken before the borrow below
        let counted = match op {
            LayerOp::CharacteristicPt {
                count,
                source,
                controller,
                ..
            } => self.affected_objects(count, *source, *controller).len() as i32,
            _ => 0,
        };
        let obj = self.object_mut(target)?;
        let chars = &mut obj.chars;
        match op {
            LayerOp::SetController(player) => obj.controller = *player,
            LayerOp::AddTypes(types) => {
                for t in types {
                    if !chars.types.contains(t) {
                        chars.types.push(*t);
                    }
                }
            }
            LayerOp::RemoveTypes(types) => chars.types.retain(|t| !types.contains(t)),
            LayerOp::SetTypes(types) => chars.types = types.iter().copied().collect(),
            LayerOp::AddSubtypes(subtypes) => {
                for s in subtypes {
                    if !chars.subtypes.contains(s) {
                        chars.subtypes.push(s.clone());
                    }
                }
            }
            LayerOp::AddColors(colors) => chars.colors = chars.colors.union(*colors),
            LayerOp::SetColors(colors) => chars.colors = *colors,
            LayerOp::AddKeywords(keywords) => {
                for k in keywords {
                    if !chars.keywords.contains(k) {
                        chars.keywords.push(k.clone());
                    }
                }
            }
            LayerOp::RemoveKeywords(keywords) => chars.keywords.retain(|k| !keywords.contains(k)),
            LayerOp::CharacteristicPt {
                power_offset,
                toughness_offset,
                ..
            } => {
                chars.power = Some(counted + power_offset);
                chars.toughness = Some(counted + toughness_offset);
            }
            LayerOp::SetPt(power, toughness) => {
                chars.power = Some(*power);
                chars.toughness = Some(*toughness);
            }
            LayerOp::ModifyPt(power, toughness) => {
                chars.power = Some(chars.power.unwrap_or(0) + power);
                chars.toughness = Some(chars.toughness.unwrap_or(0) + toughness);
            }
        }
        Ok(())
    }

    fn apply_layers_once(&mut self) -> Result<()> {
        let (mut effects, extra_lands) = self.gather_continuous_effects();
        effects.sort_by_key(|e| (e.stamp, e.order));

        let ids: Vec<ObjectId> = self.battlefield.cards.clone();
        for id in &ids {
            let obj = self.object_mut(*id)?;
            obj.chars = obj.base.clone();
            obj.controller = obj.base_controller;
        }

        for layer in Layer::ORDER {
            for effect in effects.iter().filter(|e| e.op.layer() == layer) {
                let targets = match (&effect.affects, effect.carrier) {
                    (_, Some(carrier)) => vec![carrier],
                    (Some(affects), None) => match effect.source {
                        Some(source) => {
                            // A control change earlier in this pass moves
                            // "you" along with it
                            let controller = self.object(source).map_or(effect.controller, |o| o.controller);
                            self.affected_objects(affects, source, controller)
                        }
                        None => Vec::new(),
                    },
                    (None, None) => Vec::new(),
                };
                for target in targets {
                    if self.object(target).is_ok_and(|o| !o.status.phased_out) {
                        self.apply_op(target, &effect.op)?;
                    }
                }
            }
        }

        // 7d: counters, then protections granted as keywords
        for id in &ids {
            let obj = self.object_mut(*id)?;
            let delta = obj.counter(&CounterType::plus_one()) as i32 - obj.counter(&CounterType::minus_one()) as i32;
            if delta != 0 && obj.chars.power.is_some() {
                obj.chars.power = obj.chars.power.map(|p| p + delta);
                obj.chars.toughness = obj.chars.toughness.map(|t| t + delta);
            }
            let granted: Vec<_> = obj
                .chars
                .keywords
                .iter()
                .filter_map(|k| match k {
                    Keyword::ProtectionFrom(color) => Some(*color),
                    _ => None,
                })
                .collect();
            for color in granted {
                obj.chars.protections.insert(color);
            }
        }

        let base_plays = self.config.land_plays_per_turn;
        for player in &mut self.players {
            player.land_plays_allowed = base_plays + extra_lands.get(&player.id).copied().unwrap_or(0);
        }
        Ok(())
    }

    /// Recompute every permanent's characteristics and controller from base
    /// values. Stops when a pass changes nothing; on hitting the iteration
    /// limit the last pass's result is kept.
    pub fn recompute_continuous_effects(&mut self) -> Result<()> {
        let limit = self.config.layer_iteration_limit.max(1);
        let mut before = self.layer_signature();
        for _ in 0..limit {
            self.apply_layers_once()?;
            let after = self.layer_signature();
            if after == before {
                return Ok(());
            }
            before = after;
        }
        self.logger.normal(
            "layers",
            &format!("continuous effects did not settle after {limit} passes; keeping the last result"),
        );
        Ok(())
    }
}
