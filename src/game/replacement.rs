//! Replacement effects: prevention, redirection, draw and zone-change
//! replacements
//!
//! Effects live in one game-wide list. When more than one effect could
//! replace the same event, the caller names the one to apply through
//! `choices[event_key]`; without that choice the action fails with
//! `ReplacementChoiceRequired` and can be retried.

use crate::abilities::TargetRef;
use crate::core::{ObjectId, PlayerId};
use crate::zones::Zone;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReplacement {
    Skip,
    /// Mill this many cards instead of drawing
    Mill(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementKind {
    PreventDamage,
    RedirectDamage {
        to: TargetRef,
    },
    Draw {
        instead: DrawReplacement,
    },
    ZoneChange {
        /// Any origin when absent
        from: Option<Zone>,
        to: Zone,
        instead: Zone,
    },
}

impl ReplacementKind {
    fn family(&self) -> &'static str {
        match self {
            ReplacementKind::PreventDamage => "damage",
            ReplacementKind::RedirectDamage { .. } => "redirect",
            ReplacementKind::Draw { .. } => "draw",
            ReplacementKind::ZoneChange { .. } => "zone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementEffect {
    pub effect_id: String,
    pub kind: ReplacementKind,
    /// The affected player, for player events
    pub player_id: Option<PlayerId>,
    /// The affected object, for object events
    pub object_id: Option<ObjectId>,
    /// Only events caused by this source are replaced
    pub source: Option<ObjectId>,
    /// Remaining damage to prevent or redirect; unlimited when absent
    pub amount: Option<u32>,
    /// Remaining applications; unlimited when absent
    pub uses: Option<u32>,
    pub until_end_of_turn: bool,
    pub timestamp: u64,
    pub order: u32,
}

impl ReplacementEffect {
    pub fn new(effect_id: impl Into<String>, kind: ReplacementKind) -> Self {
        ReplacementEffect {
            effect_id: effect_id.into(),
            kind,
            player_id: None,
            object_id: None,
            source: None,
            amount: None,
            uses: None,
            until_end_of_turn: false,
            timestamp: 0,
            order: 0,
        }
    }

    pub fn protecting(mut self, target: TargetRef) -> Self {
        match target {
            TargetRef::Object(id) => self.object_id = Some(id),
            TargetRef::Player(id) => self.player_id = Some(id),
        }
        self
    }

    pub fn with_amount(mut self, amount: u32) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_uses(mut self, uses: u32) -> Self {
        self.uses = Some(uses);
        self
    }

    pub fn from_source(mut self, source: ObjectId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn until_end_of_turn(mut self) -> Self {
        self.until_end_of_turn = true;
        self
    }

    fn affects(&self, subject: TargetRef) -> bool {
        match subject {
            TargetRef::Object(id) => self.object_id == Some(id),
            TargetRef::Player(id) => self.player_id == Some(id),
        }
    }

    fn source_matches(&self, source: Option<ObjectId>) -> bool {
        self.source.is_none() || self.source == source
    }
}

/// The key the caller uses to pick among competing replacements
pub fn event_key(family: &str, subject: TargetRef) -> String {
    match subject {
        TargetRef::Object(id) => format!("{family}:object:{}", id.as_u32()),
        TargetRef::Player(id) => format!("{family}:player:{}", id.as_u32()),
    }
}

/// Damage after prevention or redirection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageShift {
    /// Damage taken off the event
    pub amount: u32,
    /// Where redirected damage goes
    pub redirect_to: Option<TargetRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplacementEffects {
    effects: Vec<ReplacementEffect>,
    /// event key -> effect id
    choices: BTreeMap<String, String>,
    next_order: u32,
}

impl ReplacementEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut effect: ReplacementEffect, timestamp: u64) {
        effect.timestamp = timestamp;
        effect.order = self.next_order;
        self.next_order += 1;
        self.effects.push(effect);
    }

    pub fn set_choice(&mut self, event_key: impl Into<String>, effect_id: impl Into<String>) {
        self.choices.insert(event_key.into(), effect_id.into());
    }

    pub fn effects(&self) -> &[ReplacementEffect] {
        &self.effects
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Index of the single effect to apply, sorted by timestamp then order.
    /// A recorded choice is spent once it has picked an effect.
    fn select(
        &mut self,
        key: &str,
        matches: impl Fn(&ReplacementEffect) -> bool,
    ) -> Result<Option<usize>> {
        let mut candidates: Vec<usize> = (0..self.effects.len())
            .filter(|&i| matches(&self.effects[i]))
            .collect();
        candidates.sort_by_key(|&i| (self.effects[i].timestamp, self.effects[i].order));
        match candidates.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            many => {
                let chosen = self.choices.get(key).and_then(|effect_id| {
                    many.iter()
                        .copied()
                        .find(|&i| &self.effects[i].effect_id == effect_id)
                });
                match chosen {
                    Some(index) => {
                        self.choices.remove(key);
                        Ok(Some(index))
                    }
                    None => Err(RulesError::ReplacementChoiceRequired {
                        event_key: key.to_string(),
                    }),
                }
            }
        }
    }

    /// Spend one use and `amount` of the effect's budget
    fn consume(&mut self, index: usize, amount: u32) {
        let effect = &mut self.effects[index];
        if let Some(budget) = effect.amount.as_mut() {
            *budget = budget.saturating_sub(amount);
        }
        if let Some(uses) = effect.uses.as_mut() {
            *uses = uses.saturating_sub(1);
        }
        if effect.amount == Some(0) || effect.uses == Some(0) {
            self.effects.remove(index);
        }
    }

    /// Apply one prevention effect to `amount` damage about to be dealt to
    /// `subject`. Returns how much was prevented.
    pub fn prevent_damage(
        &mut self,
        subject: TargetRef,
        source: Option<ObjectId>,
        amount: u32,
    ) -> Result<u32> {
        if amount == 0 {
            return Ok(0);
        }
        let key = event_key("damage", subject);
        let Some(index) = self.select(&key, |e| {
            e.kind == ReplacementKind::PreventDamage && e.affects(subject) && e.source_matches(source)
        })?
        else {
            return Ok(0);
        };
        let prevented = self.effects[index].amount.map_or(amount, |budget| budget.min(amount));
        self.consume(index, prevented);
        Ok(prevented)
    }

    /// Apply one redirection effect. Redirected damage is not redirected
    /// again.
    pub fn redirect_damage(
        &mut self,
        subject: TargetRef,
        source: Option<ObjectId>,
        amount: u32,
    ) -> Result<Option<DamageShift>> {
        if amount == 0 {
            return Ok(None);
        }
        let key = event_key("redirect", subject);
        let Some(index) = self.select(&key, |e| {
            matches!(e.kind, ReplacementKind::RedirectDamage { .. })
                && e.affects(subject)
                && e.source_matches(source)
        })?
        else {
            return Ok(None);
        };
        let ReplacementKind::RedirectDamage { to } = self.effects[index].kind.clone() else {
            return Ok(None);
        };
        let moved = self.effects[index].amount.map_or(amount, |budget| budget.min(amount));
        self.consume(index, moved);
        Ok(Some(DamageShift {
            amount: moved,
            redirect_to: Some(to),
        }))
    }

    pub fn replace_draw(&mut self, player: PlayerId) -> Result<Option<DrawReplacement>> {
        let subject = TargetRef::Player(player);
        let key = event_key("draw", subject);
        let Some(index) = self.select(&key, |e| {
            matches!(e.kind, ReplacementKind::Draw { .. }) && e.affects(subject)
        })?
        else {
            return Ok(None);
        };
        let ReplacementKind::Draw { instead } = self.effects[index].kind else {
            return Ok(None);
        };
        self.consume(index, 0);
        Ok(Some(instead))
    }

    /// The zone an object actually goes to when it would move `from -> to`
    pub fn replace_zone_change(&mut self, object: ObjectId, from: Zone, to: Zone) -> Result<Zone> {
        let subject = TargetRef::Object(object);
        let key = event_key("zone", subject);
        let index = self.select(&key, |e| match &e.kind {
            ReplacementKind::ZoneChange {
                from: origin,
                to: destination,
                ..
            } => {
                *destination == to
                    && origin.map_or(true, |o| o == from)
                    && (e.object_id.is_none() || e.affects(subject))
            }
            _ => false,
        })?;
        let Some(index) = index else {
            return Ok(to);
        };
        let ReplacementKind::ZoneChange { instead, .. } = self.effects[index].kind else {
            return Ok(to);
        };
        self.consume(index, 0);
        Ok(instead)
    }

    /// Drop effects that last until end of turn
    pub fn end_turn(&mut self) {
        self.effects.retain(|e| !e.until_end_of_turn);
    }

    /// Drop effects tied to a player or object that left the game
    pub fn forget_player(&mut self, player: PlayerId) {
        self.effects.retain(|e| e.player_id != Some(player));
    }
}

impl std::fmt::Display for ReplacementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.family())
    }
}
