use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::game::GameSystem;
use crate::initiative::{InitiativeEntry, InitiativeList};

pub const INITIATIVE_UPDATE: &str = "initiative-update";
pub const GAME_CHANGE: &str = "game-change";

/// The `{type, payload}` wrapper every frame on the channel uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode {kind} envelope: {source}")]
    Encode {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decoded form of an [`Envelope`].
///
/// Tags this build does not understand decode to [`SyncMessage::Unknown`]
/// rather than failing, so consumers can ignore them.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMessage {
    InitiativeUpdate(Vec<InitiativeEntry>),
    GameChange(GameSystem),
    Unknown { kind: String, payload: Value },
}

impl SyncMessage {
    /// Full snapshot of the list, the only way initiative state travels.
    pub fn initiative(list: &InitiativeList) -> Self {
        SyncMessage::InitiativeUpdate(list.to_vec())
    }

    pub fn game(game: GameSystem) -> Self {
        SyncMessage::GameChange(game)
    }

    pub fn tag(&self) -> &str {
        match self {
            SyncMessage::InitiativeUpdate(_) => INITIATIVE_UPDATE,
            SyncMessage::GameChange(_) => GAME_CHANGE,
            SyncMessage::Unknown { kind, .. } => kind,
        }
    }

    pub fn into_envelope(self) -> Result<Envelope, EnvelopeError> {
        let kind = self.tag().to_string();
        let payload = match self {
            SyncMessage::InitiativeUpdate(entries) => serde_json::to_value(entries),
            SyncMessage::GameChange(game) => serde_json::to_value(game),
            SyncMessage::Unknown { payload, .. } => Ok(payload),
        }
        .map_err(|source| EnvelopeError::Encode {
            kind: kind.clone(),
            source,
        })?;
        Ok(Envelope { kind, payload })
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, EnvelopeError> {
        let Envelope { kind, payload } = envelope;
        match kind.as_str() {
            INITIATIVE_UPDATE => serde_json::from_value(payload)
                .map(SyncMessage::InitiativeUpdate)
                .map_err(|source| EnvelopeError::InvalidPayload { kind, source }),
            GAME_CHANGE => serde_json::from_value(payload)
                .map(SyncMessage::GameChange)
                .map_err(|source| EnvelopeError::InvalidPayload { kind, source }),
            _ => Ok(SyncMessage::Unknown { kind, payload }),
        }
    }

    /// Serializes to the text frame sent over the channel.
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        let envelope = self.clone().into_envelope()?;
        serde_json::to_string(&envelope).map_err(|source| EnvelopeError::Encode {
            kind: envelope.kind,
            source,
        })
    }

    pub fn decode(raw: &str) -> Result<Self, EnvelopeError> {
        let envelope: Envelope = serde_json::from_str(raw).map_err(EnvelopeError::Malformed)?;
        Self::from_envelope(envelope)
    }

    pub fn decode_slice(raw: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: Envelope = serde_json::from_slice(raw).map_err(EnvelopeError::Malformed)?;
        Self::from_envelope(envelope)
    }
}
