//! Game objects: cards, tokens and spells in any zone

use crate::abilities::{AbilityType, LayerOp, RuntimeAbility};
use crate::core::entity::{ObjectId, PlayerId};
use crate::core::keywords::Keyword;
use crate::core::mana::ColorSet;
use crate::core::types::{CardName, CounterType, Subtype};
use crate::zones::Zone;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Card types in MTG
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CardType {
    Artifact,
    Battle,
    Creature,
    Enchantment,
    Instant,
    Land,
    Planeswalker,
    Sorcery,
    Kindred,
}

impl CardType {
    pub fn is_permanent_type(&self) -> bool {
        !matches!(self, CardType::Instant | CardType::Sorcery | CardType::Kindred)
    }
}

impl FromStr for CardType {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "artifact" => Ok(CardType::Artifact),
            "battle" => Ok(CardType::Battle),
            "creature" => Ok(CardType::Creature),
            "enchantment" => Ok(CardType::Enchantment),
            "instant" => Ok(CardType::Instant),
            "land" => Ok(CardType::Land),
            "planeswalker" => Ok(CardType::Planeswalker),
            "sorcery" => Ok(CardType::Sorcery),
            "kindred" | "tribal" => Ok(CardType::Kindred),
            other => Err(RulesError::Parse(format!("unknown card type '{other}'"))),
        }
    }
}

impl TryFrom<String> for CardType {
    type Error = RulesError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CardType> for String {
    fn from(t: CardType) -> String {
        t.to_string()
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CardType::Artifact => "Artifact",
            CardType::Battle => "Battle",
            CardType::Creature => "Creature",
            CardType::Enchantment => "Enchantment",
            CardType::Instant => "Instant",
            CardType::Land => "Land",
            CardType::Planeswalker => "Planeswalker",
            CardType::Sorcery => "Sorcery",
            CardType::Kindred => "Kindred",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Supertype {
    #[serde(alias = "basic")]
    Basic,
    #[serde(alias = "legendary")]
    Legendary,
    #[serde(alias = "snow")]
    Snow,
    #[serde(alias = "world")]
    World,
}

impl Supertype {
    fn parse(word: &str) -> Option<Supertype> {
        match word.to_ascii_lowercase().as_str() {
            "basic" => Some(Supertype::Basic),
            "legendary" => Some(Supertype::Legendary),
            "snow" => Some(Supertype::Snow),
            "world" => Some(Supertype::World),
            _ => None,
        }
    }
}

/// A parsed type line such as `Legendary Creature — Elf Druid`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeLine {
    pub supertypes: SmallVec<[Supertype; 1]>,
    pub types: SmallVec<[CardType; 2]>,
    pub subtypes: SmallVec<[Subtype; 2]>,
}

impl FromStr for TypeLine {
    type Err = RulesError;

    fn from_str(line: &str) -> Result<Self> {
        let (main, sub) = match line.split_once('—').or_else(|| line.split_once(" - ")) {
            Some((main, sub)) => (main, sub),
            None => (line, ""),
        };
        let mut parsed = TypeLine::default();
        for word in main.split_whitespace() {
            match Supertype::parse(word) {
                Some(supertype) => parsed.supertypes.push(supertype),
                None => parsed.types.push(word.parse()?),
            }
        }
        parsed.subtypes = sub.split_whitespace().map(Subtype::from).collect();
        Ok(parsed)
    }
}

/// The characteristics the layer system reads and writes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristics {
    pub name: CardName,
    pub mana_cost: String,
    pub mana_value: u32,
    pub supertypes: SmallVec<[Supertype; 1]>,
    pub types: SmallVec<[CardType; 2]>,
    pub subtypes: SmallVec<[Subtype; 2]>,
    pub colors: ColorSet,
    pub keywords: SmallVec<[Keyword; 4]>,
    pub protections: ColorSet,
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    pub loyalty: Option<i32>,
    pub oracle_text: String,
}

impl Characteristics {
    pub fn is_type(&self, card_type: CardType) -> bool {
        self.types.contains(&card_type)
    }

    pub fn has_supertype(&self, supertype: Supertype) -> bool {
        self.supertypes.contains(&supertype)
    }

    pub fn has_subtype(&self, subtype: &str) -> bool {
        self.subtypes.iter().any(|s| s.matches(subtype))
    }

    pub fn has_keyword(&self, keyword: &Keyword) -> bool {
        self.keywords.contains(keyword)
    }

    pub fn ward_cost(&self) -> Option<&str> {
        self.keywords.iter().find_map(|k| match k {
            Keyword::Ward(cost) => Some(cost.as_str()),
            _ => None,
        })
    }
}

/// One face of a card together with the abilities printed on it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Face {
    pub characteristics: Characteristics,
    pub abilities: Vec<Arc<RuntimeAbility>>,
}

/// Per-object status that does not come from printed characteristics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStatus {
    pub tapped: bool,
    pub damage: i32,
    /// Counters (+1/+1, -1/-1, loyalty, ...)
    pub counters: SmallVec<[(CounterType, u32); 2]>,
    pub is_attacking: bool,
    pub is_blocking: bool,
    pub phased_out: bool,
    pub transformed: bool,
    pub regeneration_shields: u32,
}

/// Ordering key for continuous effects: turn, then a game-wide sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EffectStamp {
    pub turn: u32,
    pub sequence: u64,
}

/// A continuous effect from a resolved spell or ability, applied to the
/// object that carries it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryEffect {
    pub op: LayerOp,
    pub stamp: EffectStamp,
    pub source: Option<ObjectId>,
    /// Removed in the cleanup step when set; lasts until the object changes
    /// zones otherwise
    pub until_end_of_turn: bool,
}

/// A card, token or copy in some zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameObject {
    pub id: ObjectId,
    pub owner: PlayerId,
    /// Current controller, derived by the layer system on the battlefield
    pub controller: PlayerId,
    /// Controller the layer system resets to
    pub base_controller: PlayerId,
    pub zone: Zone,

    /// Characteristics before continuous effects
    pub base: Characteristics,
    /// Characteristics after continuous effects
    pub chars: Characteristics,
    pub abilities: Vec<Arc<RuntimeAbility>>,
    /// The hidden face of a double-faced card
    pub back_face: Option<Box<Face>>,

    pub status: ObjectStatus,
    pub temporary_effects: Vec<TemporaryEffect>,
    /// Activations this turn, keyed by ability index and scope
    pub activation_limits: BTreeMap<String, u32>,

    pub is_token: bool,
    pub was_cast: bool,
    pub entered_turn: Option<u32>,
    /// Sequence number of the last zone entry
    pub timestamp: u64,
}

impl GameObject {
    pub fn new(id: ObjectId, owner: PlayerId, face: Face, zone: Zone) -> Self {
        GameObject {
            id,
            owner,
            controller: owner,
            base_controller: owner,
            zone,
            chars: face.characteristics.clone(),
            base: face.characteristics,
            abilities: face.abilities,
            back_face: None,
            status: ObjectStatus::default(),
            temporary_effects: Vec::new(),
            activation_limits: BTreeMap::new(),
            is_token: false,
            was_cast: false,
            entered_turn: None,
            timestamp: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.chars.name.as_str()
    }

    pub fn is_type(&self, card_type: CardType) -> bool {
        self.chars.is_type(card_type)
    }

    pub fn is_creature(&self) -> bool {
        self.is_type(CardType::Creature)
    }

    pub fn is_land(&self) -> bool {
        self.is_type(CardType::Land)
    }

    pub fn is_planeswalker(&self) -> bool {
        self.is_type(CardType::Planeswalker)
    }

    pub fn is_permanent(&self) -> bool {
        self.chars.types.iter().any(|t| t.is_permanent_type())
    }

    pub fn is_legendary(&self) -> bool {
        self.chars.has_supertype(Supertype::Legendary)
    }

    pub fn has_keyword(&self, keyword: &Keyword) -> bool {
        self.chars.has_keyword(keyword)
    }

    pub fn power(&self) -> i32 {
        self.chars.power.unwrap_or(0)
    }

    pub fn toughness(&self) -> i32 {
        self.chars.toughness.unwrap_or(0)
    }

    /// Damage still needed to destroy this creature
    pub fn lethal_damage_remaining(&self) -> i32 {
        (self.toughness() - self.status.damage).max(0)
    }

    pub fn is_tapped(&self) -> bool {
        self.status.tapped
    }

    pub fn tap(&mut self) {
        self.status.tapped = true;
    }

    pub fn untap(&mut self) {
        self.status.tapped = false;
    }

    pub fn counter(&self, kind: &CounterType) -> u32 {
        self.status
            .counters
            .iter()
            .find(|(t, _)| t == kind)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn add_counters(&mut self, kind: CounterType, amount: u32) {
        if amount == 0 {
            return;
        }
        if let Some((_, count)) = self.status.counters.iter_mut().find(|(t, _)| *t == kind) {
            *count += amount;
        } else {
            self.status.counters.push((kind, amount));
        }
    }

    /// Remove up to `amount` counters, returning how many were removed
    pub fn remove_counters(&mut self, kind: &CounterType, amount: u32) -> u32 {
        let Some(index) = self.status.counters.iter().position(|(t, _)| t == kind) else {
            return 0;
        };
        let removed = self.status.counters[index].1.min(amount);
        self.status.counters[index].1 -= removed;
        if self.status.counters[index].1 == 0 {
            self.status.counters.remove(index);
        }
        removed
    }

    pub fn loyalty(&self) -> u32 {
        self.counter(&CounterType::loyalty())
    }

    /// Whether a creature can't attack or use tap abilities this turn
    pub fn has_summoning_sickness(&self, current_turn: u32) -> bool {
        self.entered_turn == Some(current_turn) && !self.has_keyword(&Keyword::Haste)
    }

    pub fn activated_abilities(&self) -> impl Iterator<Item = &Arc<RuntimeAbility>> {
        self.abilities
            .iter()
            .filter(|a| a.ability_type == AbilityType::Activated)
    }

    /// Forget everything tied to the object's previous zone
    pub(crate) fn reset_for_zone_change(&mut self) {
        if self.status.transformed {
            self.swap_faces();
        }
        self.status = ObjectStatus::default();
        self.temporary_effects.clear();
        self.activation_limits.clear();
        self.controller = self.owner;
        self.base_controller = self.owner;
        self.chars = self.base.clone();
    }

    /// Exchange the front and back faces. Returns false for single-faced
    /// objects.
    pub(crate) fn swap_faces(&mut self) -> bool {
        let Some(back) = self.back_face.as_mut() else {
            return false;
        };
        std::mem::swap(&mut self.base, &mut back.characteristics);
        std::mem::swap(&mut self.abilities, &mut back.abilities);
        self.status.transformed = !self.status.transformed;
        self.chars = self.base.clone();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bear() -> GameObject {
        let chars = Characteristics {
            name: CardName::from("Grizzly Bears"),
            types: smallvec::smallvec![CardType::Creature],
            power: Some(2),
            toughness: Some(2),
            ..Default::default()
        };
        GameObject::new(
            ObjectId::new(10),
            PlayerId::new(0),
            Face {
                characteristics: chars,
                abilities: Vec::new(),
            },
            Zone::Hand,
        )
    }

    #[test]
    fn test_type_line_parsing() {
        let line: TypeLine = "Legendary Creature — Elf Druid".parse().unwrap();
        assert_eq!(line.supertypes.as_slice(), &[Supertype::Legendary]);
        assert_eq!(line.types.as_slice(), &[CardType::Creature]);
        assert_eq!(line.subtypes.len(), 2);

        let land: TypeLine = "Basic Land - Forest".parse().unwrap();
        assert_eq!(land.types.as_slice(), &[CardType::Land]);
        assert!(land.subtypes[0].matches("forest"));

        assert!("Wizard Thing".parse::<TypeLine>().is_err());
    }

    #[test]
    fn test_counters() {
        let mut obj = bear();
        obj.add_counters(CounterType::plus_one(), 2);
        assert_eq!(obj.counter(&CounterType::plus_one()), 2);
        assert_eq!(obj.remove_counters(&CounterType::plus_one(), 5), 2);
        assert!(obj.status.counters.is_empty());
    }

    #[test]
    fn test_zone_change_reset() {
        let mut obj = bear();
        obj.tap();
        obj.status.damage = 1;
        obj.controller = PlayerId::new(1);
        obj.reset_for_zone_change();
        assert!(!obj.is_tapped());
        assert_eq!(obj.status.damage, 0);
        assert_eq!(obj.controller, obj.owner);
    }

    #[test]
    fn test_swap_faces_without_back_face() {
        let mut obj = bear();
        assert!(!obj.swap_faces());
        assert!(!obj.status.transformed);
    }
}
