//! Core game types and entities

pub mod definition;
pub mod entity;
pub mod keywords;
pub mod mana;
pub mod object;
pub mod player;
pub mod types;

pub use definition::CardDefinition;
pub use entity::{EntityId, EntityStore, ObjectId, PlayerId};
pub use keywords::Keyword;
pub use mana::{Color, ColorSet, ManaCost, ManaPayment, ManaPool, ManaType, PhyrexianChoice, TwoBridChoice};
pub use object::{
    CardType, Characteristics, EffectStamp, Face, GameObject, ObjectStatus, Supertype, TemporaryEffect,
    TypeLine,
};
pub use player::PlayerState;
pub use types::{CardName, CounterType, PlayerName, Subtype};
