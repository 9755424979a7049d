//! Glyph Identities - Elements and Augments
//!
//! Every identity owns exactly one source image, `<key>.png`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Unknown element: {0}")]
    UnknownElement(String),

    #[error("Unknown augment: {0}")]
    UnknownAugment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Element {
    Air,
    Earth,
    Fire,
    Paper,
    Rock,
    Scissors,
    Water,
}

impl Element {
    /// Sorted by key so run logs are reproducible.
    pub const ALL: [Element; 7] = [
        Element::Air,
        Element::Earth,
        Element::Fire,
        Element::Paper,
        Element::Rock,
        Element::Scissors,
        Element::Water,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Element::Air => "air",
            Element::Earth => "earth",
            Element::Fire => "fire",
            Element::Paper => "paper",
            Element::Rock => "rock",
            Element::Scissors => "scissors",
            Element::Water => "water",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Element {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.key() == s)
            .ok_or_else(|| IdentityError::UnknownElement(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Augment {
    Armored,
    Combo,
    Parry,
}

impl Augment {
    pub const ALL: [Augment; 3] = [Augment::Armored, Augment::Combo, Augment::Parry];

    pub fn key(&self) -> &'static str {
        match self {
            Augment::Armored => "armored",
            Augment::Combo => "combo",
            Augment::Parry => "parry",
        }
    }
}

impl fmt::Display for Augment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Augment {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.key() == s)
            .ok_or_else(|| IdentityError::UnknownAugment(s.to_string()))
    }
}
