//! Signal integration.
//!
//! This module provides the signal-cli-rest-api client, the text
//! transcoding between Signal and game chat, and the chat commands.

pub mod client;
pub mod commands;
pub mod resolver;

// Re-export main types for external use
pub use client::SignalClient;
pub use commands::BridgeCommandHandler;
