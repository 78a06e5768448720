//! Bridge module for Signal-game message coordination.
//!
//! ## Module Structure
//!
//! - `sources`: Collaborator traits (`GameFeed`, `ChatPlatform`, `CommandHandler`, `ServerQueries`, `ServerAdmin`)
//! - `state`: Dedup and echo-suppression store (`BridgeState`)
//! - `presence`: Join/leave debounce state machine (`PresenceTracker`)
//! - `orchestrator`: Polling loops (`Bridge`)

pub mod orchestrator;
pub mod presence;
pub mod sources;
pub mod state;

// Re-export main types for convenience
pub use orchestrator::{Bridge, BridgeSettings};
