//! Shared primitives for the DM screen live-sync channel. The relay never
//! looks inside a frame; these types exist so the host and player sides agree
//! on the `{type, payload}` envelope without copying message shapes around.

pub mod envelope;
pub mod game;
pub mod initiative;

pub use envelope::{Envelope, EnvelopeError, SyncMessage, GAME_CHANGE, INITIATIVE_UPDATE};
pub use game::GameSystem;
pub use initiative::{InitiativeEntry, InitiativeError, InitiativeList, Replaced};
