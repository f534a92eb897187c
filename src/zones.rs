//! Where objects live
//!
//! Each player owns a library, hand, graveyard, exile and command zone, kept
//! here as ordered id lists. The battlefield and the stack are shared and
//! live on `GameState`. An object's `zone` field always names the list that
//! holds its id.

use crate::core::{ObjectId, PlayerId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// MTG Rules 400.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Library,
    Hand,
    Battlefield,
    Graveyard,
    Exile,
    Stack,
    Command,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Zone::Library => "library",
            Zone::Hand => "hand",
            Zone::Battlefield => "battlefield",
            Zone::Graveyard => "graveyard",
            Zone::Exile => "exile",
            Zone::Stack => "stack",
            Zone::Command => "command",
        };
        write!(f, "{name}")
    }
}

/// Object ids in zone order. The last element is the library's top card,
/// the newest graveyard card, and the most recent permanent to enter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardZone {
    pub zone_type: Zone,
    pub owner: PlayerId,
    pub cards: Vec<ObjectId>,
}

impl CardZone {
    pub fn new(zone_type: Zone, owner: PlayerId) -> Self {
        CardZone {
            zone_type,
            owner,
            cards: Vec::new(),
        }
    }

    pub fn add(&mut self, id: ObjectId) {
        self.cards.push(id);
    }

    /// Returns false if the object was not here. The rest keep their order,
    /// so the hand still says which card is newest at cleanup.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        match self.cards.iter().position(|&c| c == id) {
            Some(pos) => {
                self.cards.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Swap an old id for a new one in place, as a flickered object returns
    pub fn replace(&mut self, old: ObjectId, new: ObjectId) -> bool {
        match self.cards.iter_mut().find(|c| **c == old) {
            Some(slot) => {
                *slot = new;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.cards.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn peek_top(&self) -> Option<ObjectId> {
        self.cards.last().copied()
    }

    /// Up to `n` ids from the top, topmost first. Scry and surveil look here.
    pub fn top_n(&self, n: usize) -> Vec<ObjectId> {
        self.cards.iter().rev().take(n).copied().collect()
    }

    pub fn add_to_bottom(&mut self, id: ObjectId) {
        self.cards.insert(0, id);
    }

    /// Shuffle with the game's seeded generator so replays match
    pub fn shuffle(&mut self, rng: &mut impl rand::Rng) {
        use rand::seq::SliceRandom;
        self.cards.shuffle(rng);
    }
}

/// One player's private and owned zones
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerZones {
    pub library: CardZone,
    pub hand: CardZone,
    pub graveyard: CardZone,
    pub exile: CardZone,
    pub command: CardZone,
}

impl PlayerZones {
    pub fn new(player: PlayerId) -> Self {
        PlayerZones {
            library: CardZone::new(Zone::Library, player),
            hand: CardZone::new(Zone::Hand, player),
            graveyard: CardZone::new(Zone::Graveyard, player),
            exile: CardZone::new(Zone::Exile, player),
            command: CardZone::new(Zone::Command, player),
        }
    }

    /// `None` for the shared zones
    pub fn get_zone(&self, zone: Zone) -> Option<&CardZone> {
        match zone {
            Zone::Library => Some(&self.library),
            Zone::Hand => Some(&self.hand),
            Zone::Graveyard => Some(&self.graveyard),
            Zone::Exile => Some(&self.exile),
            Zone::Command => Some(&self.command),
            Zone::Battlefield | Zone::Stack => None,
        }
    }

    pub fn get_zone_mut(&mut self, zone: Zone) -> Option<&mut CardZone> {
        match zone {
            Zone::Library => Some(&mut self.library),
            Zone::Hand => Some(&mut self.hand),
            Zone::Graveyard => Some(&mut self.graveyard),
            Zone::Exile => Some(&mut self.exile),
            Zone::Command => Some(&mut self.command),
            Zone::Battlefield | Zone::Stack => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_zone() {
        let mut zone = CardZone::new(Zone::Hand, PlayerId::new(1));
        assert!(zone.is_empty());

        let card1 = ObjectId::new(10);
        let card2 = ObjectId::new(11);
        zone.add(card1);
        zone.add(card2);

        assert_eq!(zone.len(), 2);
        assert!(zone.remove(card1));
        assert!(!zone.remove(card1));
        assert_eq!(zone.cards, vec![card2]);
    }

    #[test]
    fn test_library_operations() {
        let mut library = CardZone::new(Zone::Library, PlayerId::new(1));
        let ids: Vec<ObjectId> = (10..13).map(ObjectId::new).collect();
        for id in &ids {
            library.add(*id);
        }

        assert_eq!(library.top_n(2), vec![ids[2], ids[1]]);
        library.add_to_bottom(ObjectId::new(99));
        assert_eq!(library.cards[0], ObjectId::new(99));
        assert_eq!(library.peek_top(), Some(ids[2]));
        assert!(library.replace(ids[2], ObjectId::new(50)));
        assert_eq!(library.peek_top(), Some(ObjectId::new(50)));
        assert!(!library.replace(ids[2], ObjectId::new(51)));
    }

    #[test]
    fn test_shared_zones_are_not_player_zones() {
        let zones = PlayerZones::new(PlayerId::new(1));
        assert!(zones.get_zone(Zone::Battlefield).is_none());
        assert!(zones.get_zone(Zone::Stack).is_none());
        assert_eq!(zones.get_zone(Zone::Command).unwrap().zone_type, Zone::Command);
    }
}
