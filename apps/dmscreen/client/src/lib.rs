//! Client half of the DM screen live-sync channel: keeps one connection to
//! the relay alive, turns local state changes into full-snapshot envelopes,
//! and applies received snapshots to an owned [`ScreenState`].

pub mod client;
pub mod connection;
pub mod error;
pub mod state;

pub use client::{ClientConfig, SyncClient, SyncEvent};
pub use connection::{ConnectionState, LinkEvent, ReconnectPolicy, DEFAULT_RECONNECT_DELAY};
pub use error::SyncError;
pub use state::{Applied, ScreenState};

pub use dmscreen_core::{GameSystem, InitiativeEntry, InitiativeList, SyncMessage};
