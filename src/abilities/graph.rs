//! Ability graph schema
//!
//! Card text arrives as a small DAG of typed nodes. The graph is plain data;
//! `RuntimeAbility::compile` turns it into something the engine can run.

use crate::abilities::targeting::TargetRequirement;
use crate::{Result, RulesError};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityType {
    Triggered,
    Activated,
    Static,
    Keyword,
    /// The resolution of an instant or sorcery, or the extra effect of a
    /// permanent spell
    Spell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Trigger,
    Activated,
    Keyword,
    Static,
    Condition,
    Effect,
}

/// Node ids may be written as numbers or strings
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "RawNodeId", into = "String")]
pub struct NodeId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNodeId {
    Number(i64),
    Text(String),
}

impl From<RawNodeId> for NodeId {
    fn from(raw: RawNodeId) -> Self {
        match raw {
            RawNodeId::Number(n) => NodeId(n.to_string()),
            RawNodeId::Text(s) => NodeId(s),
        }
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> String {
        id.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    #[serde(rename = "from_", alias = "from")]
    pub from: NodeId,
    pub to: NodeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityGraph {
    #[serde(rename = "abilityType")]
    pub ability_type: AbilityType,
    #[serde(rename = "rootNodeId")]
    pub root_node_id: NodeId,
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    /// What each target key may reference
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, TargetRequirement>,
}

impl AbilityGraph {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RulesError::Parse(format!("ability graph: {e}")))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| RulesError::Parse(format!("ability graph: {e}")))
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Nodes reachable from the root in depth-first preorder. Children are
    /// visited in edge order and every node is visited once.
    pub fn traverse(&self) -> Result<Vec<&GraphNode>> {
        let by_id: FxHashMap<&NodeId, &GraphNode> = self.nodes.iter().map(|n| (&n.id, n)).collect();
        if !by_id.contains_key(&self.root_node_id) {
            return Err(RulesError::Parse(format!(
                "root node '{}' not found",
                self.root_node_id
            )));
        }

        let mut adjacency: FxHashMap<&NodeId, Vec<&NodeId>> = FxHashMap::default();
        for edge in &self.edges {
            if !by_id.contains_key(&edge.to) {
                return Err(RulesError::Parse(format!("edge to unknown node '{}'", edge.to)));
            }
            adjacency.entry(&edge.from).or_default().push(&edge.to);
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited: FxHashSet<&NodeId> = FxHashSet::default();
        let mut pending = vec![&self.root_node_id];
        while let Some(id) = pending.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = by_id.get(id) {
                order.push(*node);
            }
            if let Some(children) = adjacency.get(id) {
                pending.extend(children.iter().rev());
            }
        }
        Ok(order)
    }
}
