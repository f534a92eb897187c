//! Combat system for MTG
//!
//! Handles declaring attackers, declaring blockers, damage assignment order
//! and the combat damage passes.

use crate::abilities::TargetRef;
use crate::core::{GameObject, Keyword, ObjectId, PlayerId};
use crate::game::damage::DamageEvent;
use crate::game::events::{EventKind, GameEvent};
use crate::game::phase::Step;
use crate::game::state::GameState;
use crate::zones::Zone;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Attacker -> list of (recipient, damage)
pub type DamageAssignments = BTreeMap<ObjectId, Vec<(TargetRef, u32)>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatDamagePass {
    FirstStrike,
    Regular,
}

impl CombatDamagePass {
    /// MTG Rules 510.4: with two passes, first and double strikers deal
    /// damage first, then creatures without first strike plus double
    /// strikers.
    pub fn deals_damage(self, creature: &GameObject, two_passes: bool) -> bool {
        let first = creature.has_keyword(&Keyword::FirstStrike);
        let double = creature.has_keyword(&Keyword::DoubleStrike);
        match self {
            CombatDamagePass::FirstStrike => first || double,
            CombatDamagePass::Regular => !two_passes || !first || double,
        }
    }
}

/// Combat state for the current combat phase
///
/// Created at the beginning of combat and dropped at end of combat.
/// Uses BTreeMap for deterministic iteration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatState {
    pub attacking_player: PlayerId,
    pub defending_player: PlayerId,
    /// Planeswalker being attacked, if any
    pub defending_object: Option<ObjectId>,
    /// In declaration order
    pub attackers: Vec<ObjectId>,
    /// Attacker -> blockers in damage assignment order. Blocked attackers
    /// keep their entry even after every blocker is gone.
    pub blockers: BTreeMap<ObjectId, SmallVec<[ObjectId; 2]>>,
    pub attackers_declared: bool,
    pub blockers_declared: bool,
    pub first_strike_resolved: bool,
    pub combat_damage_resolved: bool,
}

impl CombatState {
    pub fn new(attacking_player: PlayerId, defending_player: PlayerId) -> Self {
        CombatState {
            attacking_player,
            defending_player,
            defending_object: None,
            attackers: Vec::new(),
            blockers: BTreeMap::new(),
            attackers_declared: false,
            blockers_declared: false,
            first_strike_resolved: false,
            combat_damage_resolved: false,
        }
    }

    pub fn is_attacking(&self, id: ObjectId) -> bool {
        self.attackers.contains(&id)
    }

    pub fn is_blocking(&self, id: ObjectId) -> bool {
        self.blockers.values().any(|list| list.contains(&id))
    }

    pub fn is_blocked(&self, attacker: ObjectId) -> bool {
        self.blockers.contains_key(&attacker)
    }

    pub fn blockers_of(&self, attacker: ObjectId) -> &[ObjectId] {
        self.blockers.get(&attacker).map_or(&[], |list| list.as_slice())
    }

    pub fn blocked_attacker(&self, blocker: ObjectId) -> Option<ObjectId> {
        self.blockers
            .iter()
            .find(|(_, list)| list.contains(&blocker))
            .map(|(attacker, _)| *attacker)
    }

    /// Attackers followed by blockers
    pub fn combatants(&self) -> Vec<ObjectId> {
        let mut all = self.attackers.clone();
        for list in self.blockers.values() {
            for blocker in list {
                if !all.contains(blocker) {
                    all.push(*blocker);
                }
            }
        }
        all
    }

    pub fn remove_creature(&mut self, id: ObjectId) {
        self.attackers.retain(|a| *a != id);
        self.blockers.remove(&id);
        for list in self.blockers.values_mut() {
            list.retain(|b| *b != id);
        }
    }

    pub fn damage_started(&self) -> bool {
        self.first_strike_resolved || self.combat_damage_resolved
    }
}

impl GameState {
    fn combat(&self) -> Result<&CombatState> {
        self.turn
            .combat
            .as_ref()
            .ok_or_else(|| RulesError::Permission("no combat in progress".to_string()))
    }

    fn combat_mut(&mut self) -> Result<&mut CombatState> {
        self.turn
            .combat
            .as_mut()
            .ok_or_else(|| RulesError::Permission("no combat in progress".to_string()))
    }

    fn require_step(&self, step: Step) -> Result<()> {
        if self.turn.step != step {
            return Err(RulesError::Permission(format!(
                "only allowed during {step}, not {}",
                self.turn.step
            )));
        }
        Ok(())
    }

    /// Open a combat against the next opponent in turn order
    pub(crate) fn begin_combat(&mut self) {
        let attacker = self.turn.active_player;
        let defender = self.opponents(attacker).first().copied().unwrap_or(attacker);
        self.turn.combat = Some(CombatState::new(attacker, defender));
    }

    /// Take every creature out of combat
    pub(crate) fn end_combat(&mut self) {
        if let Some(combat) = self.turn.combat.take() {
            for id in combat.combatants() {
                if let Ok(obj) = self.objects.get_mut(id) {
                    obj.status.is_attacking = false;
                    obj.status.is_blocking = false;
                }
            }
        }
    }

    fn check_attacker(&self, player: PlayerId, id: ObjectId) -> Result<()> {
        let obj = self.object(id)?;
        let reason = if obj.zone != Zone::Battlefield {
            Some("is not on the battlefield")
        } else if !obj.is_creature() {
            Some("is not a creature")
        } else if obj.controller != player {
            Some("is not controlled by the attacking player")
        } else if obj.status.phased_out {
            Some("is phased out")
        } else if obj.is_tapped() {
            Some("is tapped")
        } else if obj.has_keyword(&Keyword::Defender) {
            Some("has defender")
        } else if obj.has_summoning_sickness(self.turn.turn_number) {
            Some("has summoning sickness")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(RulesError::InvalidAction(format!(
                "{} ({id}) can't attack: it {reason}",
                obj.name()
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn apply_declare_attackers(
        &mut self,
        player: PlayerId,
        attackers: &[ObjectId],
        defending_player: Option<PlayerId>,
        defending_object: Option<ObjectId>,
    ) -> Result<()> {
        self.require_step(Step::DeclareAttackers)?;
        if player != self.turn.active_player {
            return Err(RulesError::Permission(
                "only the active player declares attackers".to_string(),
            ));
        }
        if self.combat()?.attackers_declared {
            return Err(RulesError::Permission("attackers already declared".to_string()));
        }

        let defender = defending_player.unwrap_or(self.combat()?.defending_player);
        if !self.opponents(player).contains(&defender) {
            return Err(RulesError::IllegalTarget(format!(
                "player {defender} can't be attacked"
            )));
        }
        if let Some(pw) = defending_object {
            let obj = self.object(pw)?;
            if obj.zone != Zone::Battlefield
                || !obj.is_planeswalker()
                || obj.controller != defender
                || obj.status.phased_out
            {
                return Err(RulesError::IllegalTarget(format!(
                    "{} ({pw}) is not a planeswalker controlled by the defending player",
                    obj.name()
                )));
            }
        }

        for (i, id) in attackers.iter().enumerate() {
            if attackers[..i].contains(id) {
                return Err(RulesError::InvalidAction(format!("{id} declared twice")));
            }
            self.check_attacker(player, *id)?;
        }

        {
            let combat = self.combat_mut()?;
            combat.defending_player = defender;
            combat.defending_object = defending_object;
            combat.attackers = attackers.to_vec();
            combat.attackers_declared = true;
        }

        for &id in attackers {
            let obj = self.objects.get_mut(id)?;
            obj.status.is_attacking = true;
            // MTG Rules 702.20b: vigilance means attacking doesn't cause it to tap
            if !obj.has_keyword(&Keyword::Vigilance) {
                obj.tap();
            }
            let mut event = GameEvent::object(EventKind::Attacks, id, player).with_player(defender);
            if let Some(pw) = defending_object {
                event = event.with_source(pw);
            }
            log_if_verbose!(self.logger, "combat", "{} attacks", self.object(id)?.name());
            self.publish(event);
        }
        self.logger.normal(
            "combat",
            &format!("{} attacker(s) declared against player {defender}", attackers.len()),
        );
        Ok(())
    }

    fn check_blocker(&self, player: PlayerId, blocker: ObjectId, attacker: ObjectId) -> Result<()> {
        if !self.combat()?.is_attacking(attacker) {
            return Err(RulesError::InvalidAction(format!("{attacker} is not attacking")));
        }
        let obj = self.object(blocker)?;
        let reason = if obj.zone != Zone::Battlefield {
            Some("is not on the battlefield")
        } else if !obj.is_creature() {
            Some("is not a creature")
        } else if obj.controller != player {
            Some("is not controlled by the defending player")
        } else if obj.status.phased_out {
            Some("is phased out")
        } else if obj.is_tapped() {
            Some("is tapped")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(RulesError::InvalidAction(format!(
                "{} ({blocker}) can't block: it {reason}",
                obj.name()
            )));
        }

        let attacking = self.object(attacker)?;
        // MTG Rules 702.9b
        if attacking.has_keyword(&Keyword::Flying)
            && !obj.has_keyword(&Keyword::Flying)
            && !obj.has_keyword(&Keyword::Reach)
        {
            return Err(RulesError::InvalidAction(format!(
                "{} can't block {}: it has flying",
                obj.name(),
                attacking.name()
            )));
        }
        if attacking.chars.protections.intersects(obj.chars.colors) {
            return Err(RulesError::IllegalTarget(format!(
                "{} can't block {}: protection",
                obj.name(),
                attacking.name()
            )));
        }
        Ok(())
    }

    /// `blocks` maps each blocker to the attacker it blocks
    pub(crate) fn apply_declare_blockers(
        &mut self,
        player: PlayerId,
        blocks: &BTreeMap<ObjectId, ObjectId>,
    ) -> Result<()> {
        self.require_step(Step::DeclareBlockers)?;
        let combat = self.combat()?;
        if player != combat.defending_player {
            return Err(RulesError::Permission(
                "only the defending player declares blockers".to_string(),
            ));
        }
        if combat.blockers_declared {
            return Err(RulesError::Permission("blockers already declared".to_string()));
        }

        let mut by_attacker: BTreeMap<ObjectId, SmallVec<[ObjectId; 2]>> = BTreeMap::new();
        for (&blocker, &attacker) in blocks {
            self.check_blocker(player, blocker, attacker)?;
            by_attacker.entry(attacker).or_default().push(blocker);
        }
        // MTG Rules 702.110b
        for (attacker, list) in &by_attacker {
            let obj = self.object(*attacker)?;
            if obj.has_keyword(&Keyword::Menace) && list.len() < 2 {
                return Err(RulesError::LimitReached(format!(
                    "{} has menace and needs two or more blockers",
                    obj.name()
                )));
            }
        }

        for (&blocker, &attacker) in blocks {
            self.objects.get_mut(blocker)?.status.is_blocking = true;
            log_if_verbose!(
                self.logger,
                "combat",
                "{} blocks {}",
                self.object(blocker)?.name(),
                self.object(attacker)?.name()
            );
            self.publish(GameEvent::object(EventKind::Blocks, blocker, player).with_source(attacker));
        }
        let combat = self.combat_mut()?;
        combat.blockers = by_attacker;
        combat.blockers_declared = true;
        Ok(())
    }

    pub(crate) fn apply_order_blockers(
        &mut self,
        player: PlayerId,
        attacker: ObjectId,
        order: &[ObjectId],
    ) -> Result<()> {
        let combat = self.combat()?;
        if player != combat.attacking_player {
            return Err(RulesError::Permission(
                "only the attacking player orders blockers".to_string(),
            ));
        }
        if !combat.blockers_declared || combat.damage_started() {
            return Err(RulesError::Permission(
                "blockers can only be ordered after blocks and before damage".to_string(),
            ));
        }
        let current = combat.blockers_of(attacker);
        let same_set = order.len() == current.len() && current.iter().all(|b| order.contains(b));
        if !same_set {
            return Err(RulesError::InvalidAction(format!(
                "order must list exactly the blockers of {attacker}"
            )));
        }
        let order: SmallVec<[ObjectId; 2]> = order.iter().copied().collect();
        self.combat_mut()?.blockers.insert(attacker, order);
        Ok(())
    }

    fn on_battlefield(&self, id: ObjectId) -> bool {
        self.objects
            .get(id)
            .is_ok_and(|o| o.zone == Zone::Battlefield && !o.status.phased_out)
    }

    fn any_first_strike(&self) -> Result<bool> {
        Ok(self.combat()?.combatants().into_iter().any(|id| {
            self.on_battlefield(id)
                && self.objects.get(id).is_ok_and(|o| {
                    o.has_keyword(&Keyword::FirstStrike) || o.has_keyword(&Keyword::DoubleStrike)
                })
        }))
    }

    /// The pass to resolve next, if combat damage isn't finished
    pub fn next_damage_pass(&self) -> Result<Option<CombatDamagePass>> {
        let combat = self.combat()?;
        if combat.combat_damage_resolved {
            return Ok(None);
        }
        if combat.first_strike_resolved || !self.any_first_strike()? {
            return Ok(Some(CombatDamagePass::Regular));
        }
        Ok(Some(CombatDamagePass::FirstStrike))
    }

    /// Who unblocked and trampling damage goes to
    fn defender_target(&self) -> Result<Option<TargetRef>> {
        let combat = self.combat()?;
        Ok(match combat.defending_object {
            Some(pw) if self.on_battlefield(pw) => Some(TargetRef::Object(pw)),
            Some(_) => None,
            None => Some(TargetRef::Player(combat.defending_player)),
        })
    }

    /// MTG Rules 510.1c-d: lethal damage accounts for damage already marked;
    /// any nonzero deathtouch damage is lethal
    fn lethal_damage(&self, blocker: ObjectId, deathtouch: bool) -> u32 {
        let remaining = self
            .objects
            .get(blocker)
            .map_or(0, |o| o.lethal_damage_remaining() as u32);
        if deathtouch {
            remaining.min(1)
        } else {
            remaining
        }
    }

    fn live_blockers(&self, attacker: ObjectId) -> Result<Vec<ObjectId>> {
        Ok(self
            .combat()?
            .blockers_of(attacker)
            .iter()
            .copied()
            .filter(|b| self.on_battlefield(*b))
            .collect())
    }

    fn validate_assignment(&self, attacker: &GameObject, assignment: &[(TargetRef, u32)]) -> Result<()> {
        let power = attacker.power().max(0) as u32;
        let total: u32 = assignment.iter().map(|(_, amount)| amount).sum();
        if total > power {
            return Err(RulesError::InvalidAction(format!(
                "{} assigns {total} damage but has power {power}",
                attacker.name()
            )));
        }

        let defender = self.defender_target()?;
        if !self.combat()?.is_blocked(attacker.id) {
            if assignment.iter().any(|(target, _)| Some(*target) != defender) {
                return Err(RulesError::IllegalTarget(format!(
                    "unblocked {} can only damage the defender",
                    attacker.name()
                )));
            }
            return Ok(());
        }

        let blockers = self.live_blockers(attacker.id)?;
        let trample = attacker.has_keyword(&Keyword::Trample);
        let mut per_target: BTreeMap<TargetRef, u32> = BTreeMap::new();
        for (target, amount) in assignment {
            let is_blocker = target.object().is_some_and(|id| blockers.contains(&id));
            let is_trample = trample && Some(*target) == defender;
            if !is_blocker && !is_trample {
                return Err(RulesError::IllegalTarget(format!(
                    "{} can't assign damage to {target}",
                    attacker.name()
                )));
            }
            *per_target.entry(*target).or_default() += amount;
        }

        let deathtouch = attacker.has_keyword(&Keyword::Deathtouch);
        let mut short = false;
        for blocker in &blockers {
            let got = per_target.get(&TargetRef::Object(*blocker)).copied().unwrap_or(0);
            if short && got > 0 {
                return Err(RulesError::InvalidAction(format!(
                    "{} must assign lethal damage to earlier blockers before {blocker}",
                    attacker.name()
                )));
            }
            if got < self.lethal_damage(*blocker, deathtouch) {
                short = true;
            }
        }
        let to_defender = defender
            .and_then(|d| per_target.get(&d).copied())
            .unwrap_or(0);
        if short && to_defender > 0 {
            return Err(RulesError::InvalidAction(format!(
                "{} must assign lethal damage to every blocker before trampling over",
                attacker.name()
            )));
        }
        Ok(())
    }

    /// Lethal damage to each blocker in order, then the rest to the defender
    /// with trample or onto the last blocker without it
    pub fn default_assignment(&self, attacker: ObjectId) -> Result<Vec<(TargetRef, u32)>> {
        let obj = self.object(attacker)?;
        let power = obj.power().max(0) as u32;
        if power == 0 {
            return Ok(Vec::new());
        }
        let defender = self.defender_target()?;
        if !self.combat()?.is_blocked(attacker) {
            return Ok(defender.map(|d| vec![(d, power)]).unwrap_or_default());
        }

        let trample = obj.has_keyword(&Keyword::Trample);
        let deathtouch = obj.has_keyword(&Keyword::Deathtouch);
        let blockers = self.live_blockers(attacker)?;
        let mut remaining = power;
        let mut assignment: Vec<(TargetRef, u32)> = Vec::new();
        for blocker in &blockers {
            let give = remaining.min(self.lethal_damage(*blocker, deathtouch));
            if give > 0 {
                assignment.push((TargetRef::Object(*blocker), give));
            }
            remaining -= give;
        }
        if remaining > 0 {
            match (trample, defender, blockers.last()) {
                (true, Some(d), _) => assignment.push((d, remaining)),
                (false, _, Some(last)) => {
                    let target = TargetRef::Object(*last);
                    match assignment.iter_mut().find(|(t, _)| *t == target) {
                        Some((_, amount)) => *amount += remaining,
                        None => assignment.push((target, remaining)),
                    }
                }
                _ => {}
            }
        }
        Ok(assignment)
    }

    /// Deal one pass of combat damage. Attackers missing from `assignments`
    /// use the default assignment. All damage in a pass is dealt before any
    /// state-based action is checked.
    pub(crate) fn apply_combat_damage(
        &mut self,
        assignments: &DamageAssignments,
        pass: CombatDamagePass,
    ) -> Result<()> {
        let combat = self.combat()?.clone();
        if let Some(stray) = assignments.keys().find(|a| !combat.is_attacking(**a)) {
            return Err(RulesError::InvalidAction(format!("{stray} is not attacking")));
        }
        let two_passes = pass == CombatDamagePass::FirstStrike || combat.first_strike_resolved;

        let mut events: Vec<DamageEvent> = Vec::new();
        for &attacker in &combat.attackers {
            if !self.on_battlefield(attacker) {
                continue;
            }
            let obj = self.object(attacker)?;
            if !pass.deals_damage(obj, two_passes) {
                continue;
            }
            let assignment = match assignments.get(&attacker) {
                Some(chosen) => {
                    self.validate_assignment(obj, chosen)?;
                    chosen.clone()
                }
                None => self.default_assignment(attacker)?,
            };
            for (target, amount) in assignment {
                events.push(DamageEvent::combat(attacker, target, amount));
            }
        }

        // Blockers deal their full power to the attacker they block
        for (&attacker, blockers) in &combat.blockers {
            if !self.on_battlefield(attacker) {
                continue;
            }
            for &blocker in blockers {
                if !self.on_battlefield(blocker) {
                    continue;
                }
                let obj = self.object(blocker)?;
                let power = obj.power().max(0) as u32;
                if power > 0 && pass.deals_damage(obj, two_passes) {
                    events.push(DamageEvent::combat(blocker, TargetRef::Object(attacker), power));
                }
            }
        }

        for event in events {
            self.deal_damage(event)?;
        }

        let combat = self.combat_mut()?;
        match pass {
            CombatDamagePass::FirstStrike => combat.first_strike_resolved = true,
            CombatDamagePass::Regular => combat.combat_damage_resolved = true,
        }
        self.logger.normal("combat", &format!("{pass:?} combat damage dealt"));
        Ok(())
    }

    /// Resolve every pass not yet assigned, with default assignments
    pub(crate) fn resolve_remaining_combat_damage(&mut self) -> Result<()> {
        while let Some(pass) = self.next_damage_pass()? {
            self.apply_combat_damage(&DamageAssignments::new(), pass)?;
            self.settle()?;
            if self.turn.combat.is_none() {
                break;
            }
        }
        Ok(())
    }
}
