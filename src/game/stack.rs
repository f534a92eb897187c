//! The spell and ability stack

use crate::abilities::{ResolveContext, RuntimeAbility};
use crate::core::{EntityId, ObjectId, PlayerId};
use crate::zones::Zone;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type StackItemId = EntityId<StackItem>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackItemKind {
    Spell,
    ActivatedAbility,
    TriggeredAbility,
    /// A bare graph pushed by a caller or copied from another item
    AbilityGraph,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackPayload {
    Spell {
        source: ObjectId,
        /// Where the card goes when it resolves
        destination: Zone,
        ability: Option<Arc<RuntimeAbility>>,
        context: ResolveContext,
        /// Set on copies; a copy never moves its source card
        copy_of: Option<StackItemId>,
    },
    Ability {
        source: Option<ObjectId>,
        ability: Arc<RuntimeAbility>,
        context: ResolveContext,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackItem {
    pub id: StackItemId,
    pub kind: StackItemKind,
    pub controller: PlayerId,
    pub payload: StackPayload,
}

impl StackItem {
    /// The card or permanent the item came from
    pub fn source(&self) -> Option<ObjectId> {
        match &self.payload {
            StackPayload::Spell { source, .. } => Some(*source),
            StackPayload::Ability { source, .. } => *source,
        }
    }

    pub fn context(&self) -> &ResolveContext {
        match &self.payload {
            StackPayload::Spell { context, .. } | StackPayload::Ability { context, .. } => context,
        }
    }

    pub fn is_spell(&self) -> bool {
        matches!(self.payload, StackPayload::Spell { .. })
    }

    pub fn is_copy(&self) -> bool {
        matches!(
            self.payload,
            StackPayload::Spell {
                copy_of: Some(_),
                ..
            }
        )
    }
}

/// Last in, first out. Index 0 is the bottom.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stack {
    items: Vec<StackItem>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: StackItem) {
        self.items.push(item);
    }

    pub fn pop(&mut self) -> Option<StackItem> {
        self.items.pop()
    }

    pub fn peek(&self) -> Option<&StackItem> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bottom to top
    pub fn iter(&self) -> impl Iterator<Item = &StackItem> {
        self.items.iter()
    }

    pub fn get(&self, id: StackItemId) -> Option<&StackItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn remove(&mut self, id: StackItemId) -> Option<StackItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    /// The topmost original (non-copy) spell whose card is `source`
    pub fn find_spell(&self, source: ObjectId) -> Option<&StackItem> {
        self.items
            .iter()
            .rev()
            .find(|item| item.is_spell() && !item.is_copy() && item.source() == Some(source))
    }

    /// Drop every item a player controls, returning them bottom to top
    pub fn remove_controlled_by(&mut self, player: PlayerId) -> Vec<StackItem> {
        let (removed, kept) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|item| item.controller == player);
        self.items = kept;
        removed
    }
}
