//! Card definitions used to create game objects

use crate::abilities::{AbilityGraph, AbilityType, RuntimeAbility};
use crate::core::keywords::Keyword;
use crate::core::mana::{Color, ColorSet, ManaCost};
use crate::core::object::{CardType, Characteristics, Face, Supertype, TypeLine};
use crate::core::types::{CardName, Subtype};
use crate::Result;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::sync::Arc;

/// Everything printed on a card
///
/// ```
/// use mtg_rules_engine::core::{CardDefinition, Keyword};
///
/// let bears = CardDefinition::creature("Grizzly Bears", "{1}{G}", 2, 2)
///     .with_keyword(Keyword::Trample);
/// assert_eq!(bears.power, Some(2));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CardDefinition {
    pub name: CardName,
    pub mana_cost: String,
    pub supertypes: Vec<Supertype>,
    pub types: Vec<CardType>,
    pub subtypes: Vec<Subtype>,
    /// Color indicator; colors come from the mana cost when absent
    pub colors: Option<Vec<Color>>,
    pub power: Option<i32>,
    pub toughness: Option<i32>,
    pub loyalty: Option<i32>,
    pub keywords: Vec<Keyword>,
    pub protections: Vec<Color>,
    pub oracle_text: String,
    pub ability_graphs: Vec<AbilityGraph>,
    pub back_face: Option<Box<CardDefinition>>,
}

impl CardDefinition {
    pub fn new(name: impl Into<CardName>) -> Self {
        CardDefinition {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn creature(name: impl Into<CardName>, cost: &str, power: i32, toughness: i32) -> Self {
        CardDefinition::new(name)
            .with_cost(cost)
            .with_types(&[CardType::Creature])
            .with_pt(power, toughness)
    }

    pub fn basic_land(name: &str) -> Self {
        CardDefinition::new(name)
            .with_supertype(Supertype::Basic)
            .with_types(&[CardType::Land])
            .with_subtypes(&[name])
    }

    pub fn with_cost(mut self, cost: &str) -> Self {
        self.mana_cost = cost.to_string();
        self
    }

    pub fn with_types(mut self, types: &[CardType]) -> Self {
        self.types = types.to_vec();
        self
    }

    pub fn with_supertype(mut self, supertype: Supertype) -> Self {
        self.supertypes.push(supertype);
        self
    }

    pub fn with_subtypes(mut self, subtypes: &[&str]) -> Self {
        self.subtypes = subtypes.iter().map(|s| Subtype::from(*s)).collect();
        self
    }

    /// Replace supertypes, types and subtypes from a type line
    pub fn with_type_line(mut self, line: &str) -> Result<Self> {
        let parsed: TypeLine = line.parse()?;
        self.supertypes = parsed.supertypes.to_vec();
        self.types = parsed.types.to_vec();
        self.subtypes = parsed.subtypes.to_vec();
        Ok(self)
    }

    pub fn with_colors(mut self, colors: &[Color]) -> Self {
        self.colors = Some(colors.to_vec());
        self
    }

    pub fn with_pt(mut self, power: i32, toughness: i32) -> Self {
        self.power = Some(power);
        self.toughness = Some(toughness);
        self
    }

    pub fn with_loyalty(mut self, loyalty: i32) -> Self {
        self.loyalty = Some(loyalty);
        self
    }

    pub fn with_keyword(mut self, keyword: Keyword) -> Self {
        self.keywords.push(keyword);
        self
    }

    pub fn with_protection(mut self, color: Color) -> Self {
        self.protections.push(color);
        self
    }

    pub fn with_oracle_text(mut self, text: &str) -> Self {
        self.oracle_text = text.to_string();
        self
    }

    pub fn with_ability(mut self, graph: AbilityGraph) -> Self {
        self.ability_graphs.push(graph);
        self
    }

    pub fn with_back_face(mut self, back: CardDefinition) -> Self {
        self.back_face = Some(Box::new(back));
        self
    }

    /// Build the front face: parse the cost, fold keyword graphs into the
    /// keyword list and compile every ability graph
    pub fn build_face(&self) -> Result<Face> {
        let cost = ManaCost::parse(&self.mana_cost, 0)?;
        let colors: ColorSet = match &self.colors {
            Some(colors) => colors.iter().copied().collect(),
            None => cost.colors(),
        };

        let mut abilities = Vec::with_capacity(self.ability_graphs.len());
        let mut keywords: SmallVec<[Keyword; 4]> = self.keywords.iter().cloned().collect();
        for graph in &self.ability_graphs {
            let ability = RuntimeAbility::compile(graph)?;
            if ability.ability_type == AbilityType::Keyword {
                if let Some(keyword) = &ability.keyword {
                    if !keywords.contains(keyword) {
                        keywords.push(keyword.clone());
                    }
                }
            }
            abilities.push(Arc::new(ability));
        }

        let characteristics = Characteristics {
            name: self.name.clone(),
            mana_cost: self.mana_cost.clone(),
            mana_value: cost.mana_value(),
            supertypes: self.supertypes.iter().copied().collect(),
            types: self.types.iter().copied().collect(),
            subtypes: self.subtypes.iter().cloned().collect(),
            colors,
            keywords,
            protections: self.protections.iter().copied().collect(),
            power: self.power,
            toughness: self.toughness,
            loyalty: self.loyalty,
            oracle_text: self.oracle_text.clone(),
        };
        Ok(Face {
            characteristics,
            abilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colors_default_from_cost() {
        let face = CardDefinition::creature("Boros Recruit", "{R/W}", 1, 1)
            .build_face()
            .unwrap();
        let colors: Vec<Color> = face.characteristics.colors.iter().collect();
        assert_eq!(colors, vec![Color::White, Color::Red]);
        assert_eq!(face.characteristics.mana_value, 1);
    }

    #[test]
    fn test_keyword_graphs_fold_into_keywords() {
        let graph = AbilityGraph::from_json(
            r#"{"abilityType": "keyword", "rootNodeId": 1,
                "nodes": [{"id": 1, "type": "KEYWORD", "data": {"keyword": "Flying"}}]}"#,
        )
        .unwrap();
        let face = CardDefinition::creature("Wind Drake", "{2}{U}", 2, 2)
            .with_ability(graph)
            .build_face()
            .unwrap();
        assert!(face.characteristics.has_keyword(&Keyword::Flying));
        assert_eq!(face.abilities.len(), 1);
    }

    #[test]
    fn test_type_line_builder() {
        let def = CardDefinition::new("Atraxa")
            .with_type_line("Legendary Creature — Phyrexian Angel")
            .unwrap();
        assert_eq!(def.supertypes, vec![Supertype::Legendary]);
        assert_eq!(def.subtypes.len(), 2);
    }
}
