//! Players and roles.

use std::fmt;

use nightfall_protocol::PlayerId;
use serde::{Deserialize, Serialize};

/// Which side a role plays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Good,
    Evil,
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Good => f.write_str("good"),
            Self::Evil => f.write_str("evil"),
        }
    }
}

/// The night ability a role grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Power {
    Kill,
    Heal,
    Investigate,
    Citizen,
}

impl fmt::Display for Power {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kill => f.write_str("kill"),
            Self::Heal => f.write_str("heal"),
            Self::Investigate => f.write_str("investigate"),
            Self::Citizen => f.write_str("citizen"),
        }
    }
}

/// A dealt role. Names and colors come from the room's theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub alignment: Alignment,
    pub power: Power,
    pub description: String,
    pub color: String,
}

/// A seat at the table.
///
/// The current connection is not part of the seat; the room actor keeps
/// the seat → connection binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub connected: bool,
    pub ready: bool,
}
