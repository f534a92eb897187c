//! Game entity system with typed integer IDs

use crate::{Result, RulesError};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Integer ID tagged with the kind of entity it names
///
/// IDs are allocated from a single game-wide counter, so an object ID and a
/// player ID never share a number. They are stable for the whole game except
/// where a rule says an object becomes a new object (flicker).
pub struct EntityId<T> {
    id: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> EntityId<T> {
    pub const fn new(id: u32) -> Self {
        EntityId {
            id,
            _marker: PhantomData,
        }
    }

    pub fn as_u32(&self) -> u32 {
        self.id
    }
}

impl<T> Clone for EntityId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EntityId<T> {}

impl<T> PartialEq for EntityId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for EntityId<T> {}

impl<T> PartialOrd for EntityId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for EntityId<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> Hash for EntityId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for EntityId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)
    }
}

impl<T> fmt::Display for EntityId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> Serialize for EntityId<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.id)
    }
}

impl<'de, T> Deserialize<'de> for EntityId<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        u32::deserialize(deserializer).map(EntityId::new)
    }
}

pub type ObjectId = EntityId<crate::core::object::GameObject>;
pub type PlayerId = EntityId<crate::core::player::PlayerState>;

/// Storage for entities keyed by their typed ID
///
/// Uses FxHashMap for fast hashing of integer keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: Deserialize<'de>"))]
pub struct EntityStore<T> {
    entities: FxHashMap<EntityId<T>, T>,
}

impl<T> EntityStore<T> {
    pub fn new() -> Self {
        EntityStore {
            entities: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, id: EntityId<T>, entity: T) {
        self.entities.insert(id, entity);
    }

    pub fn get(&self, id: EntityId<T>) -> Result<&T> {
        self.entities
            .get(&id)
            .ok_or(RulesError::EntityNotFound(id.as_u32()))
    }

    pub fn get_mut(&mut self, id: EntityId<T>) -> Result<&mut T> {
        self.entities
            .get_mut(&id)
            .ok_or(RulesError::EntityNotFound(id.as_u32()))
    }

    pub fn contains(&self, id: EntityId<T>) -> bool {
        self.entities.contains_key(&id)
    }

    /// Remove an entity. Only ceased-to-exist tokens and flickered objects
    /// leave the store.
    pub fn remove(&mut self, id: EntityId<T>) -> Option<T> {
        self.entities.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId<T>, &T)> {
        self.entities.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entities.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entities.values_mut()
    }

    /// IDs in ascending order, for deterministic sweeps
    pub fn sorted_ids(&self) -> Vec<EntityId<T>> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<T> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestEntity {
        name: String,
    }

    #[test]
    fn test_entity_store() {
        let mut store: EntityStore<TestEntity> = EntityStore::new();
        let id1 = EntityId::new(3);
        let id2 = EntityId::new(1);

        store.insert(id1, TestEntity { name: "Test1".to_string() });
        store.insert(id2, TestEntity { name: "Test2".to_string() });

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(id1).unwrap().name, "Test1");
        assert_eq!(store.sorted_ids(), vec![id2, id1]);
        assert_eq!(
            store.get(EntityId::new(999)).unwrap_err(),
            RulesError::EntityNotFound(999)
        );
    }

    #[test]
    fn test_values_mut_updates_in_place() {
        let mut store: EntityStore<TestEntity> = EntityStore::new();
        store.insert(EntityId::new(1), TestEntity { name: "a".to_string() });
        store.insert(EntityId::new(2), TestEntity { name: "b".to_string() });

        for entity in store.values_mut() {
            entity.name.push('!');
        }
        assert_eq!(store.get(EntityId::new(1)).unwrap().name, "a!");
        assert_eq!(store.get(EntityId::new(2)).unwrap().name, "b!");
    }

    #[test]
    fn test_store_serializes_with_integer_keys() {
        let mut store: EntityStore<TestEntity> = EntityStore::new();
        store.insert(EntityId::new(7), TestEntity { name: "Seven".to_string() });

        let json = serde_json::to_string(&store).unwrap();
        let back: EntityStore<TestEntity> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(EntityId::new(7)).unwrap().name, "Seven");
    }
}
