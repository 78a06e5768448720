//! Collaborator interfaces used by the bridge.
//!
//! The orchestrator only talks to the game server, the Signal API and the
//! command handler through these traits, so it can run against in-memory
//! fakes in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::common::error::ApiResult;
use crate::common::messages::{InboundChatMessage, InboundGameMessage, PlayerStatus};
use crate::game::server_api::{AdvancedSettings, SaveEntry, ServerGameState, ServerOptions};
use crate::game::types::{
    Drone, FactoryStats, GeneratorGroup, PlayerInfo, PowerStats, ProductionRate, SessionInfo,
    SinkEntry, StoredItem, Switch, Train, Vehicle,
};

/// The game server's chat feed and roster.
#[async_trait]
pub trait GameFeed: Send + Sync {
    /// Current contents of the chat feed, oldest first.
    async fn poll_chat_messages(&self) -> ApiResult<Vec<InboundGameMessage>>;

    /// Players currently online.
    async fn poll_roster(&self) -> ApiResult<Vec<PlayerStatus>>;

    /// Post a line into game chat under `sender`.
    async fn send_chat_message(&self, text: &str, sender: &str) -> ApiResult<()>;

    /// Whether the last request reached the server.
    fn is_online(&self) -> bool;

    /// Human-readable reason for the last failure.
    fn last_error(&self) -> String;

    /// The sender name the game will report back for a message sent
    /// under `sender`.
    fn sender_label(&self, sender: &str) -> String {
        sender.to_string()
    }
}

/// The Signal side.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Wait up to `timeout` for new messages.
    async fn poll_messages(&self, timeout: Duration) -> ApiResult<Vec<InboundChatMessage>>;

    async fn send_group_message(&self, text: &str) -> ApiResult<()>;

    async fn send_direct_message(&self, text: &str, recipient: &str) -> ApiResult<()>;

    /// Whether an incoming group id is the bridged group.
    fn is_our_group(&self, group_id: Option<&str>) -> bool;

    /// Acknowledge a handled message. Best effort.
    async fn send_read_receipt(&self, _recipient: &str, _timestamp: i64) -> ApiResult<()> {
        Ok(())
    }
}

/// Turns command text into a reply.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, text: &str) -> String;
}

/// Read-only server queries behind the chat commands.
#[async_trait]
pub trait ServerQueries: Send + Sync {
    async fn players(&self) -> ApiResult<Vec<PlayerInfo>>;
    async fn power(&self) -> ApiResult<PowerStats>;
    async fn session(&self) -> ApiResult<SessionInfo>;
    async fn factory(&self) -> ApiResult<FactoryStats>;
    async fn trains(&self) -> ApiResult<Vec<Train>>;
    async fn drones(&self) -> ApiResult<Vec<Drone>>;
    async fn vehicles(&self) -> ApiResult<Vec<Vehicle>>;
    async fn generators(&self) -> ApiResult<Vec<GeneratorGroup>>;
    /// Stored items matching `search` (empty matches all).
    async fn storage(&self, search: &str) -> ApiResult<Vec<StoredItem>>;
    async fn production(&self) -> ApiResult<Vec<ProductionRate>>;
    async fn sink(&self) -> ApiResult<SinkEntry>;
    async fn switches(&self) -> ApiResult<Vec<Switch>>;

    fn is_online(&self) -> bool;
    fn last_error(&self) -> String;
}

/// The dedicated server's own API, behind the admin commands.
#[async_trait]
pub trait ServerAdmin: Send + Sync {
    async fn server_state(&self) -> ApiResult<ServerGameState>;
    async fn server_options(&self) -> ApiResult<ServerOptions>;
    async fn advanced_settings(&self) -> ApiResult<AdvancedSettings>;
    /// At most `limit` saves, current session marked.
    async fn recent_saves(&self, limit: usize) -> ApiResult<Vec<SaveEntry>>;
}
