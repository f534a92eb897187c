//! Resolution context carried by stack items

use crate::abilities::effect::EffectOutcome;
use crate::abilities::targeting::TargetRef;
use crate::core::{ObjectId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A caller-supplied choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    Flag(bool),
    Number(i64),
    Objects(Vec<ObjectId>),
    Text(String),
}

/// Everything an ability needs while it resolves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveContext {
    pub source_id: Option<ObjectId>,
    pub controller_id: Option<PlayerId>,
    pub triggering_source_id: Option<ObjectId>,
    pub x_value: u32,
    pub targets: BTreeMap<String, Vec<TargetRef>>,
    pub choices: BTreeMap<String, ChoiceValue>,
    /// Results of earlier effect nodes in this resolution
    pub previous_results: Vec<EffectOutcome>,
}

impl ResolveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, key: impl Into<String>, target: impl Into<TargetRef>) -> Self {
        self.targets.entry(key.into()).or_default().push(target.into());
        self
    }

    pub fn with_choice(mut self, key: impl Into<String>, value: ChoiceValue) -> Self {
        self.choices.insert(key.into(), value);
        self
    }

    pub fn with_x(mut self, x_value: u32) -> Self {
        self.x_value = x_value;
        self
    }

    pub fn has_targets(&self) -> bool {
        self.targets.values().any(|refs| !refs.is_empty())
    }

    pub fn all_targets(&self) -> impl Iterator<Item = (&str, TargetRef)> + '_ {
        self.targets
            .iter()
            .flat_map(|(key, refs)| refs.iter().map(move |r| (key.as_str(), *r)))
    }

    pub fn choice_flag(&self, key: &str) -> bool {
        matches!(self.choices.get(key), Some(ChoiceValue::Flag(true)))
    }

    pub fn choice_number(&self, key: &str) -> Option<i64> {
        match self.choices.get(key) {
            Some(ChoiceValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn choice_objects(&self, key: &str) -> Option<&[ObjectId]> {
        match self.choices.get(key) {
            Some(ChoiceValue::Objects(ids)) => Some(ids),
            _ => None,
        }
    }
}
