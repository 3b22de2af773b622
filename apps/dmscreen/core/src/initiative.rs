use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Icon used when the host does not pick one.
pub const DEFAULT_ICON_CLASS: &str = "fas fa-user";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InitiativeError {
    #[error("initiative entry needs a name")]
    EmptyName,
    #[error("invalid initiative roll {0:?}")]
    InvalidRoll(String),
    #[error("expected NAME:ROLL[:ICON], got {0:?}")]
    Malformed(String),
}

/// One combatant on the tracker. Entries have no identity beyond their
/// position in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiativeEntry {
    pub name: String,
    pub roll: i64,
    pub icon_class: String,
}

impl InitiativeEntry {
    /// Builds a locally entered combatant. The name is trimmed and must not
    /// be empty afterwards.
    pub fn new(
        name: &str,
        roll: i64,
        icon_class: impl Into<String>,
    ) -> Result<Self, InitiativeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InitiativeError::EmptyName);
        }
        Ok(Self {
            name: name.to_string(),
            roll,
            icon_class: icon_class.into(),
        })
    }
}

impl FromStr for InitiativeEntry {
    type Err = InitiativeError;

    /// Parses the `NAME:ROLL[:ICON]` shorthand used on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (Some(name), Some(roll)) = (parts.next(), parts.next()) else {
            return Err(InitiativeError::Malformed(s.to_string()));
        };
        let roll = roll
            .trim()
            .parse::<i64>()
            .map_err(|_| InitiativeError::InvalidRoll(roll.to_string()))?;
        let icon = parts
            .next()
            .map(str::trim)
            .filter(|icon| !icon.is_empty())
            .unwrap_or(DEFAULT_ICON_CLASS);
        InitiativeEntry::new(name, roll, icon)
    }
}

/// Result of swapping in a remote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replaced {
    pub previous_len: usize,
    pub current_len: usize,
    /// Set only when the snapshot grew, in which case the last entry is
    /// treated as the newly arrived one.
    pub appended: bool,
}

/// Ordered initiative order. Every mutation yields a complete new snapshot;
/// there are no per-entry updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitiativeList {
    entries: Vec<InitiativeEntry>,
}

impl InitiativeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<InitiativeEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[InitiativeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&InitiativeEntry> {
        self.entries.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InitiativeEntry> {
        self.entries.iter()
    }

    pub fn push(&mut self, entry: InitiativeEntry) {
        self.entries.push(entry);
    }

    /// Highest roll first. Ties keep their insertion order.
    pub fn sort_by_roll(&mut self) {
        self.entries.sort_by(|a, b| b.roll.cmp(&a.roll));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replaces the whole list with a received snapshot.
    pub fn replace(&mut self, entries: Vec<InitiativeEntry>) -> Replaced {
        let previous_len = self.entries.len();
        self.entries = entries;
        let current_len = self.entries.len();
        Replaced {
            previous_len,
            current_len,
            appended: current_len > previous_len,
        }
    }

    pub fn to_vec(&self) -> Vec<InitiativeEntry> {
        self.entries.clone()
    }
}

impl<'a> IntoIterator for &'a InitiativeList {
    type Item = &'a InitiativeEntry;
    type IntoIter = std::slice::Iter<'a, InitiativeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
