//! Compiled abilities

use crate::abilities::condition::{ActivationCost, Condition, TriggerSpec};
use crate::abilities::effect::{Effect, EffectOutcome};
use crate::abilities::graph::{AbilityGraph, AbilityType, NodeType};
use crate::abilities::statics::StaticEffect;
use crate::abilities::targeting::TargetRequirement;
use crate::core::Keyword;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// An ability graph flattened into the pieces the engine runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeAbility {
    pub ability_type: AbilityType,
    pub trigger: Option<TriggerSpec>,
    pub cost: Option<ActivationCost>,
    pub keyword: Option<Keyword>,
    pub statics: Vec<StaticEffect>,
    pub conditions: Vec<Condition>,
    pub effects: Vec<Effect>,
    pub targets: BTreeMap<String, TargetRequirement>,
}

impl RuntimeAbility {
    /// Walk the graph from its root and collect node data in traversal order
    pub fn compile(graph: &AbilityGraph) -> Result<RuntimeAbility> {
        let mut ability = RuntimeAbility {
            ability_type: graph.ability_type,
            trigger: None,
            cost: None,
            keyword: None,
            statics: Vec::new(),
            conditions: Vec::new(),
            effects: Vec::new(),
            targets: graph.targets.clone(),
        };

        for node in graph.traverse()? {
            let bad_node = |e: serde_json::Error| {
                RulesError::Parse(format!("{:?} node '{}': {e}", node.node_type, node.id))
            };
            match node.node_type {
                NodeType::Trigger => {
                    ability.trigger = Some(serde_json::from_value(node.data.clone()).map_err(bad_node)?);
                }
                NodeType::Activated => {
                    let cost = if node.data.is_null() {
                        ActivationCost::default()
                    } else {
                        serde_json::from_value(node.data.clone()).map_err(bad_node)?
                    };
                    ability.cost = Some(cost);
                }
                NodeType::Keyword => {
                    let text = node
                        .data
                        .get("keyword")
                        .and_then(|k| k.as_str())
                        .ok_or_else(|| {
                            RulesError::Parse(format!("KEYWORD node '{}' has no keyword", node.id))
                        })?;
                    ability.keyword = Some(text.parse()?);
                }
                NodeType::Static => {
                    ability
                        .statics
                        .push(serde_json::from_value(node.data.clone()).map_err(bad_node)?);
                }
                NodeType::Condition => ability.conditions.push(Condition::decode(&node.data)?),
                NodeType::Effect => ability.effects.push(Effect::decode(&node.data)?),
            }
        }

        match ability.ability_type {
            AbilityType::Triggered if ability.trigger.is_none() => {
                return Err(RulesError::Parse("triggered ability without a TRIGGER node".into()))
            }
            AbilityType::Keyword if ability.keyword.is_none() => {
                return Err(RulesError::Parse("keyword ability without a KEYWORD node".into()))
            }
            AbilityType::Activated if ability.cost.is_none() => ability.cost = Some(ActivationCost::default()),
            _ => {}
        }
        Ok(ability)
    }

    /// Activated, targetless, and only produces mana
    pub fn is_mana_ability(&self) -> bool {
        self.ability_type == AbilityType::Activated
            && !self.effects.is_empty()
            && self.targets.is_empty()
            && self
                .effects
                .iter()
                .all(|e| matches!(e, Effect::Mana { .. }) && !e.uses_targets())
    }

    /// Target keys the effects read
    pub fn target_keys(&self) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = self.targets.keys().cloned().collect();
        for effect in &self.effects {
            for spec in effect.target_specs() {
                if let Some(key) = spec.target_key() {
                    keys.insert(key.to_string());
                }
            }
        }
        keys
    }

    pub fn uses_targets(&self) -> bool {
        !self.targets.is_empty() || self.effects.iter().any(Effect::uses_targets)
    }

    pub fn is_sorcery_speed(&self) -> bool {
        self.cost.as_ref().is_some_and(ActivationCost::is_sorcery_speed)
    }
}

/// How a resolution ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Resolved,
    ConditionFailed,
    /// Every target was illegal
    Fizzled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub status: ResolutionStatus,
    pub effects: Vec<EffectOutcome>,
}

impl ResolutionReport {
    pub fn condition_failed() -> Self {
        ResolutionReport {
            status: ResolutionStatus::ConditionFailed,
            effects: Vec::new(),
        }
    }

    pub fn fizzled() -> Self {
        ResolutionReport {
            status: ResolutionStatus::Fizzled,
            effects: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::condition::TriggerFilter;
    use crate::game::events::EventKind;

    #[test]
    fn test_compile_triggered_ability() {
        let graph = AbilityGraph::from_json(
            r#"{
                "abilityType": "triggered",
                "rootNodeId": "t",
                "nodes": [
                    {"id": "t", "type": "TRIGGER", "data": {"event": "enters_battlefield", "filter": "self"}},
                    {"id": "c", "type": "CONDITION", "data": {"kind": "your_turn"}},
                    {"id": "e", "type": "EFFECT", "data": {"type": "draw", "amount": 1}}
                ],
                "edges": [{"from_": "t", "to": "c"}, {"from_": "c", "to": "e"}]
            }"#,
        )
        .unwrap();
        let ability = RuntimeAbility::compile(&graph).unwrap();
        let trigger = ability.trigger.unwrap();
        assert_eq!(trigger.event, EventKind::EntersBattlefield);
        assert_eq!(trigger.filter, TriggerFilter::SelfObject);
        assert_eq!(ability.conditions, vec![Condition::YourTurn]);
        assert_eq!(ability.effects.len(), 1);
        assert!(!ability.uses_targets());
    }

    #[test]
    fn test_mana_ability_detection() {
        let graph = AbilityGraph::from_json(
            r#"{
                "abilityType": "activated",
                "rootNodeId": 1,
                "nodes": [
                    {"id": 1, "type": "ACTIVATED", "data": {"tap": true}},
                    {"id": 2, "type": "EFFECT", "data": {"type": "mana", "mana": "{G}"}}
                ],
                "edges": [{"from_": 1, "to": 2}]
            }"#,
        )
        .unwrap();
        let ability = RuntimeAbility::compile(&graph).unwrap();
        assert!(ability.is_mana_ability());
        assert!(ability.cost.unwrap().tap);
    }

    #[test]
    fn test_triggered_without_trigger_fails() {
        let graph = AbilityGraph::from_json(
            r#"{"abilityType": "triggered", "rootNodeId": 1,
                "nodes": [{"id": 1, "type": "EFFECT", "data": {"type": "draw"}}]}"#,
        )
        .unwrap();
        assert!(matches!(RuntimeAbility::compile(&graph), Err(RulesError::Parse(_))));
    }

    #[test]
    fn test_target_keys_include_declared_and_used() {
        let graph = AbilityGraph::from_json(
            r#"{
                "abilityType": "spell",
                "rootNodeId": 1,
                "targets": {"target": {"kind": "creature"}},
                "nodes": [
                    {"id": 1, "type": "EFFECT", "data": {"type": "damage", "amount": 2}},
                    {"id": 2, "type": "EFFECT", "data": {"type": "draw", "player": "target_player"}}
                ],
                "edges": [{"from_": 1, "to": 2}]
            }"#,
        )
        .unwrap();
        let ability = RuntimeAbility::compile(&graph).unwrap();
        let keys: Vec<String> = ability.target_keys().into_iter().collect();
        assert_eq!(keys, vec!["target".to_string(), "target_player".to_string()]);
    }
}
