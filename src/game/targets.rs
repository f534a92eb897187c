//! Target legality
//!
//! Targets are checked when a spell is cast or an ability is activated, and
//! again when it resolves. Ward only matters at the first check: its cost
//! is either paid then (recorded as the `ward_paid` choice) or the target
//! can't be chosen.

use crate::abilities::{
    ControllerFilter, ResolveContext, RuntimeAbility, TargetKind, TargetRef, TargetRequirement,
};
use crate::core::{CardType, ColorSet, Keyword, ObjectId, PlayerId};
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::{Result, RulesError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetCheck {
    Cast,
    Resolution,
}

fn illegal(message: String) -> RulesError {
    RulesError::IllegalTarget(message)
}

impl GameState {
    fn source_colors(&self, source: Option<ObjectId>) -> ColorSet {
        source
            .and_then(|id| self.objects.get(id).ok())
            .map(|o| o.chars.colors)
            .unwrap_or_default()
    }

    fn ward_paid(ctx: &ResolveContext, target: ObjectId) -> bool {
        ctx.choice_flag("ward_paid") || ctx.choice_flag(&format!("ward_paid:{}", target.as_u32()))
    }

    fn check_kind(&self, target: TargetRef, requirement: &TargetRequirement, controller: PlayerId) -> Result<()> {
        let obj = match target {
            TargetRef::Player(player) => {
                let allowed = matches!(requirement.kind, TargetKind::Any | TargetKind::Player);
                let relation_ok = match requirement.controller {
                    ControllerFilter::Any => true,
                    ControllerFilter::You => player == controller,
                    ControllerFilter::Opponent => player != controller,
                };
                return if allowed && relation_ok {
                    Ok(())
                } else {
                    Err(illegal(format!("player {player} is not a legal {:?} target", requirement.kind)))
                };
            }
            TargetRef::Object(id) => self.object(id)?,
        };

        let (zone_ok, kind_ok) = match requirement.kind {
            TargetKind::Any => (
                obj.zone == Zone::Battlefield,
                obj.is_creature() || obj.is_planeswalker(),
            ),
            TargetKind::Creature => (obj.zone == Zone::Battlefield, obj.is_creature()),
            TargetKind::Planeswalker => (obj.zone == Zone::Battlefield, obj.is_planeswalker()),
            TargetKind::CreatureOrPlaneswalker => (
                obj.zone == Zone::Battlefield,
                obj.is_creature() || obj.is_planeswalker(),
            ),
            TargetKind::Artifact => (obj.zone == Zone::Battlefield, obj.is_type(CardType::Artifact)),
            TargetKind::Enchantment => (
                obj.zone == Zone::Battlefield,
                obj.is_type(CardType::Enchantment),
            ),
            TargetKind::Land => (obj.zone == Zone::Battlefield, obj.is_land()),
            TargetKind::Permanent => (obj.zone == Zone::Battlefield, obj.is_permanent()),
            TargetKind::Player => (false, false),
            TargetKind::Spell => (obj.zone == Zone::Stack, true),
            TargetKind::CardInGraveyard => (obj.zone == Zone::Graveyard, true),
        };
        if !zone_ok {
            return Err(illegal(format!("{} ({}) is in the {}", obj.name(), obj.id, obj.zone)));
        }
        if !kind_ok {
            return Err(illegal(format!(
                "{} ({}) is not a legal {:?} target",
                obj.name(),
                obj.id,
                requirement.kind
            )));
        }
        let relation_ok = match requirement.controller {
            ControllerFilter::Any => true,
            ControllerFilter::You => obj.controller == controller,
            ControllerFilter::Opponent => obj.controller != controller,
        };
        if !relation_ok {
            return Err(illegal(format!(
                "{} ({}) has the wrong controller",
                obj.name(),
                obj.id
            )));
        }
        Ok(())
    }

    /// Whether one target is legal for a spell or ability controlled by
    /// `controller` with the given source
    pub fn check_target(
        &self,
        target: TargetRef,
        requirement: Option<&TargetRequirement>,
        source: Option<ObjectId>,
        controller: PlayerId,
        ctx: &ResolveContext,
        check: TargetCheck,
    ) -> Result<()> {
        if let Some(requirement) = requirement {
            self.check_kind(target, requirement, controller)?;
        }

        let id = match target {
            TargetRef::Player(player) => {
                return match self.player(player) {
                    Ok(p) if p.is_active() => Ok(()),
                    _ => Err(illegal(format!("player {player} is not in the game"))),
                };
            }
            TargetRef::Object(id) => id,
        };
        let obj = self
            .object(id)
            .map_err(|_| illegal(format!("{id} does not exist")))?;

        if requirement.is_none() && !matches!(obj.zone, Zone::Battlefield | Zone::Stack) {
            return Err(illegal(format!("{} ({id}) is in the {}", obj.name(), obj.zone)));
        }
        if obj.zone != Zone::Battlefield {
            return Ok(());
        }
        if obj.status.phased_out {
            return Err(illegal(format!("{} ({id}) is phased out", obj.name())));
        }
        if obj.has_keyword(&Keyword::Shroud) {
            return Err(illegal(format!("{} ({id}) has shroud", obj.name())));
        }
        let opposing = obj.controller != controller;
        if opposing && obj.has_keyword(&Keyword::Hexproof) {
            return Err(illegal(format!("{} ({id}) has hexproof", obj.name())));
        }
        if check == TargetCheck::Cast && opposing {
            if let Some(cost) = obj.chars.ward_cost() {
                if !Self::ward_paid(ctx, id) {
                    return Err(illegal(format!(
                        "{} ({id}) has ward {cost} and it was not paid",
                        obj.name()
                    )));
                }
            }
        }
        if obj.chars.protections.intersects(self.source_colors(source)) {
            return Err(illegal(format!(
                "{} ({id}) has protection from the source",
                obj.name()
            )));
        }
        Ok(())
    }

    /// Check every chosen target, and that every target key the ability
    /// reads has been chosen
    pub fn validate_targets(
        &self,
        ability: Option<&RuntimeAbility>,
        ctx: &ResolveContext,
        controller: PlayerId,
    ) -> Result<()> {
        if let Some(ability) = ability {
            for key in ability.target_keys() {
                if ctx.targets.get(&key).map_or(true, |refs| refs.is_empty()) {
                    return Err(illegal(format!("no target chosen for '{key}'")));
                }
            }
        }
        for (key, target) in ctx.all_targets() {
            let requirement = ability.and_then(|a| a.targets.get(key));
            self.check_target(target, requirement, ctx.source_id, controller, ctx, TargetCheck::Cast)?;
        }
        Ok(())
    }

    /// Drop targets that became illegal. Returns true when the context had
    /// targets and none of them is still legal.
    pub fn prune_illegal_targets(
        &self,
        ability: Option<&RuntimeAbility>,
        ctx: &mut ResolveContext,
        controller: PlayerId,
    ) -> bool {
        if !ctx.has_targets() {
            return false;
        }
        let snapshot = ctx.clone();
        for (key, refs) in ctx.targets.iter_mut() {
            let requirement = ability.and_then(|a| a.targets.get(key));
            refs.retain(|target| {
                self.check_target(
                    *target,
                    requirement,
                    snapshot.source_id,
                    controller,
                    &snapshot,
                    TargetCheck::Resolution,
                )
                .is_ok()
            });
        }
        !ctx.has_targets()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::core::{CardDefinition, Color};

    fn setup() -> (GameState, PlayerId, PlayerId) {
        let game = GameState::new_two_player("Alice", "Bob", RulesConfig::default());
        let (a, b) = (game.players[0].id, game.players[1].id);
        (game, a, b)
    }

    #[test]
    fn test_hexproof_only_stops_opponents() {
        let (mut game, alice, bob) = setup();
        let def = CardDefinition::creature("Slippery Bogle", "{G/U}", 1, 1).with_keyword(Keyword::Hexproof);
        let id = game.create_object(&def, bob, Zone::Battlefield).unwrap();
        let ctx = ResolveContext::new();
        let target = TargetRef::Object(id);
        assert!(game.check_target(target, None, None, alice, &ctx, TargetCheck::Cast).is_err());
        assert!(game.check_target(target, None, None, bob, &ctx, TargetCheck::Cast).is_ok());
    }

    #[test]
    fn test_ward_requires_payment_at_cast() {
        let (mut game, alice, bob) = setup();
        let def = CardDefinition::creature("Warded Bear", "{1}{G}", 2, 2)
            .with_keyword(Keyword::Ward("{2}".to_string()));
        let id = game.create_object(&def, bob, Zone::Battlefield).unwrap();
        let target = TargetRef::Object(id);

        let unpaid = ResolveContext::new();
        let err = game
            .check_target(target, None, None, alice, &unpaid, TargetCheck::Cast)
            .unwrap_err();
        assert!(matches!(err, RulesError::IllegalTarget(_)));
        assert!(game
            .check_target(target, None, None, alice, &unpaid, TargetCheck::Resolution)
            .is_ok());

        let paid = ResolveContext::new().with_choice(
            format!("ward_paid:{}", id.as_u32()),
            crate::abilities::ChoiceValue::Flag(true),
        );
        assert!(game.check_target(target, None, None, alice, &paid, TargetCheck::Cast).is_ok());
    }

    #[test]
    fn test_protection_from_source_color() {
        let (mut game, alice, bob) = setup();
        let knight = CardDefinition::creature("White Knight", "{W}{W}", 2, 2).with_protection(Color::Red);
        let knight = game.create_object(&knight, bob, Zone::Battlefield).unwrap();
        let bolt = CardDefinition::new("Lightning Bolt")
            .with_cost("{R}")
            .with_types(&[CardType::Instant]);
        let bolt = game.create_object(&bolt, alice, Zone::Hand).unwrap();
        let ctx = ResolveContext::new();
        let err = game
            .check_target(TargetRef::Object(knight), None, Some(bolt), alice, &ctx, TargetCheck::Cast)
            .unwrap_err();
        assert!(err.to_string().contains("protection"));
    }

    #[test]
    fn test_requirement_kind() {
        let (mut game, alice, bob) = setup();
        let land = game
            .create_object(&CardDefinition::basic_land("Forest"), bob, Zone::Battlefield)
            .unwrap();
        let creature_only = TargetRequirement::new(TargetKind::Creature);
        let ctx = ResolveContext::new();
        assert!(game
            .check_target(TargetRef::Object(land), Some(&creature_only), None, alice, &ctx, TargetCheck::Cast)
            .is_err());
        assert!(game
            .check_target(TargetRef::Player(bob), Some(&creature_only), None, alice, &ctx, TargetCheck::Cast)
            .is_err());
    }

    #[test]
    fn test_prune_reports_fizzle() {
        let (mut game, alice, bob) = setup();
        let bears = game
            .create_object(&CardDefinition::creature("Bears", "{1}{G}", 2, 2), bob, Zone::Battlefield)
            .unwrap();
        let mut ctx = ResolveContext::new().with_target("target", bears);
        assert!(!game.prune_illegal_targets(None, &mut ctx, alice));
        game.move_object(bears, Zone::Graveyard).unwrap();
        assert!(game.prune_illegal_targets(None, &mut ctx, alice));
    }
}
