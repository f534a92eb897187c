//! Keyword abilities

use crate::core::mana::Color;
use crate::{Result, RulesError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Keyword abilities the rules engine gives meaning to. Anything else is
/// kept as `Other` so it still shows up on the object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Keyword {
    Flying,
    Reach,
    FirstStrike,
    DoubleStrike,
    Deathtouch,
    Lifelink,
    Trample,
    Vigilance,
    Haste,
    Defender,
    Menace,
    Hexproof,
    Shroud,
    Indestructible,
    Infect,
    Flash,
    Phasing,
    /// Ward with its cost text, e.g. `Ward {2}`
    Ward(String),
    ProtectionFrom(Color),
    Other(String),
}

impl Keyword {
    pub fn is_ward(&self) -> bool {
        matches!(self, Keyword::Ward(_))
    }
}

impl FromStr for Keyword {
    type Err = RulesError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        if text.is_empty() {
            return Err(RulesError::Parse("empty keyword".to_string()));
        }
        let lower = text.to_ascii_lowercase();

        if let Some(rest) = lower.strip_prefix("protection from ") {
            return Color::from_name(rest)
                .map(Keyword::ProtectionFrom)
                .ok_or_else(|| RulesError::Parse(format!("unknown protection '{text}'")));
        }
        if lower == "ward" || lower.starts_with("ward ") || lower.starts_with("ward:") {
            let cost = text[4..].trim_start_matches([':', ' ', '-']).trim();
            return Ok(Keyword::Ward(cost.to_string()));
        }

        let keyword = match lower.as_str() {
            "flying" => Keyword::Flying,
            "reach" => Keyword::Reach,
            "first strike" => Keyword::FirstStrike,
            "double strike" => Keyword::DoubleStrike,
            "deathtouch" => Keyword::Deathtouch,
            "lifelink" => Keyword::Lifelink,
            "trample" => Keyword::Trample,
            "vigilance" => Keyword::Vigilance,
            "haste" => Keyword::Haste,
            "defender" => Keyword::Defender,
            "menace" => Keyword::Menace,
            "hexproof" => Keyword::Hexproof,
            "shroud" => Keyword::Shroud,
            "indestructible" => Keyword::Indestructible,
            "infect" => Keyword::Infect,
            "flash" => Keyword::Flash,
            "phasing" => Keyword::Phasing,
            _ => Keyword::Other(text.to_string()),
        };
        Ok(keyword)
    }
}

impl TryFrom<String> for Keyword {
    type Error = RulesError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Keyword> for String {
    fn from(keyword: Keyword) -> String {
        keyword.to_string()
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Keyword::Flying => write!(f, "Flying"),
            Keyword::Reach => write!(f, "Reach"),
            Keyword::FirstStrike => write!(f, "First strike"),
            Keyword::DoubleStrike => write!(f, "Double strike"),
            Keyword::Deathtouch => write!(f, "Deathtouch"),
            Keyword::Lifelink => write!(f, "Lifelink"),
            Keyword::Trample => write!(f, "Trample"),
            Keyword::Vigilance => write!(f, "Vigilance"),
            Keyword::Haste => write!(f, "Haste"),
            Keyword::Defender => write!(f, "Defender"),
            Keyword::Menace => write!(f, "Menace"),
            Keyword::Hexproof => write!(f, "Hexproof"),
            Keyword::Shroud => write!(f, "Shroud"),
            Keyword::Indestructible => write!(f, "Indestructible"),
            Keyword::Infect => write!(f, "Infect"),
            Keyword::Flash => write!(f, "Flash"),
            Keyword::Phasing => write!(f, "Phasing"),
            Keyword::Ward(cost) if cost.is_empty() => write!(f, "Ward"),
            Keyword::Ward(cost) => write!(f, "Ward {cost}"),
            Keyword::ProtectionFrom(color) => {
                let name = match color {
                    Color::White => "white",
                    Color::Blue => "blue",
                    Color::Black => "black",
                    Color::Red => "red",
                    Color::Green => "green",
                };
                write!(f, "Protection from {name}")
            }
            Keyword::Other(text) => write!(f, "{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords() {
        assert_eq!("first strike".parse::<Keyword>().unwrap(), Keyword::FirstStrike);
        assert_eq!("Ward {2}".parse::<Keyword>().unwrap(), Keyword::Ward("{2}".to_string()));
        assert_eq!(
            "Protection from red".parse::<Keyword>().unwrap(),
            Keyword::ProtectionFrom(Color::Red)
        );
        assert_eq!(
            "Bushido 2".parse::<Keyword>().unwrap(),
            Keyword::Other("Bushido 2".to_string())
        );
    }

    #[test]
    fn test_keyword_serde_uses_display_text() {
        let json = serde_json::to_string(&Keyword::DoubleStrike).unwrap();
        assert_eq!(json, "\"Double strike\"");
        let back: Keyword = serde_json::from_str("\"deathtouch\"").unwrap();
        assert_eq!(back, Keyword::Deathtouch);
    }
}
