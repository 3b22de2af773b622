use std::fmt;

use serde::{Deserialize, Serialize};

/// Which rule set the screen is currently laid out for.
///
/// Serialized as the bare display string. Values this build does not know
/// about are kept verbatim in [`GameSystem::Other`] so an older player never
/// rejects a newer host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GameSystem {
    #[default]
    DreadNights,
    Dnd5e,
    Placeholder,
    Other(String),
}

impl GameSystem {
    pub const DREAD_NIGHTS: &'static str = "Dread Nights";
    pub const DND_5E: &'static str = "D&D 5e";
    pub const PLACEHOLDER: &'static str = "Placeholder";

    pub fn as_str(&self) -> &str {
        match self {
            GameSystem::DreadNights => Self::DREAD_NIGHTS,
            GameSystem::Dnd5e => Self::DND_5E,
            GameSystem::Placeholder => Self::PLACEHOLDER,
            GameSystem::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, GameSystem::Other(_))
    }

    /// Only the D&D layout carries the initiative tracker.
    pub fn tracks_initiative(&self) -> bool {
        matches!(self, GameSystem::Dnd5e)
    }
}

impl From<&str> for GameSystem {
    fn from(value: &str) -> Self {
        match value {
            Self::DREAD_NIGHTS => GameSystem::DreadNights,
            Self::DND_5E => GameSystem::Dnd5e,
            Self::PLACEHOLDER => GameSystem::Placeholder,
            other => GameSystem::Other(other.to_string()),
        }
    }
}

impl From<String> for GameSystem {
    fn from(value: String) -> Self {
        match GameSystem::from(value.as_str()) {
            GameSystem::Other(_) => GameSystem::Other(value),
            known => known,
        }
    }
}

impl From<GameSystem> for String {
    fn from(value: GameSystem) -> Self {
        match value {
            GameSystem::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for GameSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
