//! Damage events
//!
//! Every point of damage in the game, combat or not, goes through
//! [`GameState::deal_damage`], which applies protection, prevention and
//! redirection before marking damage, removing loyalty or adding poison.

use crate::abilities::TargetRef;
use crate::core::{ColorSet, CounterType, Keyword, ObjectId, PlayerId};
use crate::game::events::{EventKind, GameEvent};
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    pub source: Option<ObjectId>,
    pub target: TargetRef,
    pub amount: u32,
    pub combat: bool,
    /// Cleared once the damage has been redirected
    redirectable: bool,
}

impl DamageEvent {
    pub fn new(source: Option<ObjectId>, target: TargetRef, amount: u32) -> Self {
        DamageEvent {
            source,
            target,
            amount,
            combat: false,
            redirectable: true,
        }
    }

    pub fn combat(source: ObjectId, target: TargetRef, amount: u32) -> Self {
        DamageEvent {
            combat: true,
            ..DamageEvent::new(Some(source), target, amount)
        }
    }
}

/// What the damage source looked like when it dealt damage. Sources that
/// already left the battlefield are read where they are now.
#[derive(Debug, Default)]
struct SourceInfo {
    controller: Option<PlayerId>,
    colors: ColorSet,
    deathtouch: bool,
    lifelink: bool,
    infect: bool,
    commander: bool,
}

impl GameState {
    fn source_info(&self, source: Option<ObjectId>) -> SourceInfo {
        let Some(obj) = source.and_then(|id| self.objects.get(id).ok()) else {
            return SourceInfo::default();
        };
        SourceInfo {
            controller: Some(obj.controller),
            colors: obj.chars.colors,
            deathtouch: obj.has_keyword(&Keyword::Deathtouch),
            lifelink: obj.has_keyword(&Keyword::Lifelink),
            infect: obj.has_keyword(&Keyword::Infect),
            commander: self.players.iter().any(|p| p.commander_id == Some(obj.id)),
        }
    }

    /// Whether anything can still be dealt damage at `target`
    fn can_be_damaged(&self, target: TargetRef) -> bool {
        match target {
            TargetRef::Player(id) => self.player(id).is_ok_and(|p| p.is_active()),
            TargetRef::Object(id) => self
                .object(id)
                .is_ok_and(|o| o.zone == Zone::Battlefield && !o.status.phased_out),
        }
    }

    /// Deal damage, returning how much was actually dealt to the original
    /// target. Fails with `ReplacementChoiceRequired` when more than one
    /// prevention or redirection effect applies and no choice was given.
    pub fn deal_damage(&mut self, event: DamageEvent) -> Result<u32> {
        if event.amount == 0 || !self.can_be_damaged(event.target) {
            return Ok(0);
        }
        let info = self.source_info(event.source);

        if let TargetRef::Object(id) = event.target {
            let obj = self.object(id)?;
            if obj.chars.protections.intersects(info.colors) {
                self.logger.normal(
                    "damage",
                    &format!("{} ({id}) is protected from {} damage", obj.name(), event.amount),
                );
                return Ok(0);
            }
        }

        let mut amount = event.amount;
        let prevented = self
            .replacements
            .prevent_damage(event.target, event.source, amount)?;
        if prevented > 0 {
            amount -= prevented;
            self.logger.normal(
                "damage",
                &format!("prevented {prevented} damage to {}", event.target),
            );
        }

        if event.redirectable && amount > 0 {
            if let Some(shift) = self
                .replacements
                .redirect_damage(event.target, event.source, amount)?
            {
                amount -= shift.amount;
                if let Some(to) = shift.redirect_to {
                    self.logger.normal(
                        "damage",
                        &format!("redirected {} damage from {} to {to}", shift.amount, event.target),
                    );
                    self.deal_damage(DamageEvent {
                        target: to,
                        amount: shift.amount,
                        redirectable: false,
                        ..event
                    })?;
                }
            }
        }
        if amount == 0 {
            return Ok(0);
        }

        match event.target {
            TargetRef::Object(id) => self.damage_object(id, amount, &info)?,
            TargetRef::Player(id) => self.damage_player(id, event.source, amount, event.combat, &info)?,
        }

        if info.lifelink {
            if let Some(controller) = info.controller {
                self.player_mut(controller)?.gain_life(amount as i32);
            }
        }

        self.logger.normal(
            "damage",
            &format!(
                "{} dealt {amount} {}damage to {}",
                event
                    .source
                    .and_then(|s| self.objects.get(s).ok())
                    .map_or("?", |o| o.name()),
                if event.combat { "combat " } else { "" },
                event.target
            ),
        );

        if let (true, Some(source), Some(controller)) = (event.combat, event.source, info.controller) {
            self.publish(
                GameEvent::object(EventKind::CombatDamage, source, controller).with_amount(amount as i32),
            );
        }
        Ok(amount)
    }

    fn damage_object(&mut self, id: ObjectId, amount: u32, info: &SourceInfo) -> Result<()> {
        let obj = self.object_mut(id)?;
        if obj.is_planeswalker() {
            obj.remove_counters(&CounterType::loyalty(), amount);
        }
        if obj.is_creature() {
            if info.infect {
                obj.add_counters(CounterType::minus_one(), amount);
            } else {
                obj.status.damage += amount as i32;
                if info.deathtouch {
                    obj.status.damage = obj.status.damage.max(obj.toughness().max(1));
                }
            }
        }
        Ok(())
    }

    fn damage_player(
        &mut self,
        id: PlayerId,
        source: Option<ObjectId>,
        amount: u32,
        combat: bool,
        info: &SourceInfo,
    ) -> Result<()> {
        let player = self.player_mut(id)?;
        if info.infect {
            player.poison += amount;
        } else {
            player.lose_life(amount as i32);
        }
        if let (true, true, Some(source)) = (combat, info.commander, source) {
            *player.commander_damage.entry(source).or_default() += amount;
        }
        Ok(())
    }
}
