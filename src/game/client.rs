//! HTTP client for the Ficsit Remote Monitoring (FRM) API.
//!
//! Every request updates a shared online/offline status so commands can
//! report why the server is unavailable. Transitions are logged once.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bridge::sources::{GameFeed, ServerQueries};
use crate::common::error::{ApiError, ApiResult};
use crate::common::messages::{InboundGameMessage, PlayerStatus};
use crate::common::types::GameMessageKind;
use crate::config::GameConfig;
use crate::game::types::{
    group_generators, production_rates, storage_totals, ChatEntry, Drone, FactoryBuilding,
    FactoryStats, Generator, GeneratorGroup, PlayerEntry, PlayerInfo, PowerCircuit, PowerStats,
    ProdStat, ProductionRate, SessionInfo, SinkEntry, StorageContainer, StoredItem, Switch, Train,
    Vehicle,
};

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The game truncates chat sender names to this many characters.
const MAX_SENDER_CHARS: usize = 32;

const AUTH_HEADER: &str = "X-FRM-Authorization";

/// Vehicle endpoints and the label each contributes.
const VEHICLE_ENDPOINTS: [(&str, &str); 3] = [
    ("getTruck", "Truck"),
    ("getTractor", "Tractor"),
    ("getExplorer", "Explorer"),
];

/// Reachability of the game server as of the last request.
#[derive(Debug, Clone)]
struct ServerStatus {
    online: bool,
    last_error: String,
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self {
            online: false,
            last_error: "Not connected yet".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ChatPost<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    sender: &'a str,
}

/// FRM client shared by the bridge loops and the command handler.
pub struct FrmClient {
    http: reqwest::Client,
    api_url: String,
    access_token: String,
    status: watch::Sender<ServerStatus>,
}

impl FrmClient {
    pub fn new(config: &GameConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|source| ApiError::Request {
                endpoint: "client".to_string(),
                source,
            })?;

        let (status, _) = watch::channel(ServerStatus::default());

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            status,
        })
    }

    /// Hit the chat endpoint once.
    pub async fn health_check(&self) -> bool {
        match self.get_json("getChatMessages").await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Game server health check failed");
                false
            }
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_url, endpoint)
    }

    fn record(&self, result: &ApiResult<Value>) {
        let (online, reason) = match result {
            Ok(_) => (true, String::new()),
            // The server answered, it just answered badly.
            Err(ApiError::Malformed { .. }) => (true, String::new()),
            Err(e) => (false, describe_error(e)),
        };

        self.status.send_modify(|status| {
            if online && !status.online {
                info!("Game server is now ONLINE");
            } else if !online && status.online {
                warn!("Game server is now OFFLINE: {}", reason);
            }
            status.online = online;
            if !online {
                status.last_error = reason;
            }
        });
    }

    async fn get_json(&self, endpoint: &str) -> ApiResult<Value> {
        let request = self.http.get(self.url(endpoint)).timeout(READ_TIMEOUT);
        let result = self.execute(endpoint, request).await;
        self.record(&result);
        result
    }

    async fn execute(&self, endpoint: &str, request: reqwest::RequestBuilder) -> ApiResult<Value> {
        let request = if self.access_token.is_empty() {
            request
        } else {
            request.header(AUTH_HEADER, &self.access_token)
        };

        let response = request.send().await.map_err(|source| ApiError::Request {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| ApiError::Malformed {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<Vec<T>> {
        let value = self.get_json(endpoint).await?;
        parse_items(endpoint, value)
    }
}

/// User-facing reason for a failed request.
fn describe_error(error: &ApiError) -> String {
    match error {
        ApiError::Request { source, .. } if source.is_connect() => {
            "Cannot connect to game server".to_string()
        }
        ApiError::Request { source, .. } if source.is_timeout() => {
            "Game server timeout".to_string()
        }
        other => format!("Server error: {}", other),
    }
}

/// Decode a list payload item by item, skipping entries that do not fit.
/// A bare object is treated as a one-element list.
fn parse_items<T: DeserializeOwned>(endpoint: &str, value: Value) -> ApiResult<Vec<T>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        other => {
            return Err(ApiError::Malformed {
                endpoint: endpoint.to_string(),
                message: format!("expected a list, got {}", other),
            })
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(endpoint, error = %e, "Skipping malformed entry");
                None
            }
        })
        .collect())
}

/// `sendChatMessage` answers with a list whose first entry carries `IsSent`.
fn was_sent(value: &Value) -> bool {
    let first = match value {
        Value::Array(items) => items.first(),
        other => Some(other),
    };
    first
        .and_then(|entry| entry.get("IsSent"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn to_game_message(entry: ChatEntry) -> InboundGameMessage {
    InboundGameMessage {
        local_timestamp: entry.time_stamp as i64,
        server_timestamp: entry.server_time_stamp,
        sender: entry.sender,
        kind: GameMessageKind::from_name(&entry.kind),
        text: entry.message,
    }
}

fn truncate_sender(sender: &str) -> String {
    sender.chars().take(MAX_SENDER_CHARS).collect()
}

#[async_trait]
impl GameFeed for FrmClient {
    async fn poll_chat_messages(&self) -> ApiResult<Vec<InboundGameMessage>> {
        let entries: Vec<ChatEntry> = self.fetch("getChatMessages").await?;
        Ok(entries.into_iter().map(to_game_message).collect())
    }

    async fn poll_roster(&self) -> ApiResult<Vec<PlayerStatus>> {
        Ok(self
            .players()
            .await?
            .into_iter()
            .map(|p| PlayerStatus {
                name: p.name,
                is_dead: p.dead,
            })
            .collect())
    }

    async fn send_chat_message(&self, text: &str, sender: &str) -> ApiResult<()> {
        const ENDPOINT: &str = "sendChatMessage";

        let label = truncate_sender(sender);
        let request = self
            .http
            .post(self.url(ENDPOINT))
            .timeout(SEND_TIMEOUT)
            .json(&ChatPost {
                message: text,
                sender: &label,
            });

        let result = self.execute(ENDPOINT, request).await;
        self.record(&result);

        if was_sent(&result?) {
            Ok(())
        } else {
            Err(ApiError::Rejected {
                endpoint: ENDPOINT.to_string(),
                reason: "IsSent was false".to_string(),
            })
        }
    }

    fn is_online(&self) -> bool {
        self.status.borrow().online
    }

    fn last_error(&self) -> String {
        self.status.borrow().last_error.clone()
    }

    fn sender_label(&self, sender: &str) -> String {
        truncate_sender(sender)
    }
}

#[async_trait]
impl ServerQueries for FrmClient {
    async fn players(&self) -> ApiResult<Vec<PlayerInfo>> {
        let entries: Vec<PlayerEntry> = self.fetch("getPlayer").await?;
        Ok(entries.into_iter().filter_map(PlayerInfo::from_entry).collect())
    }

    async fn power(&self) -> ApiResult<PowerStats> {
        let circuits: Vec<PowerCircuit> = self.fetch("getPower").await?;
        Ok(PowerStats::aggregate(&circuits))
    }

    async fn session(&self) -> ApiResult<SessionInfo> {
        let sessions: Vec<SessionInfo> = self.fetch("getSessionInfo").await?;
        sessions.into_iter().next().ok_or_else(|| ApiError::Malformed {
            endpoint: "getSessionInfo".to_string(),
            message: "empty session list".to_string(),
        })
    }

    async fn factory(&self) -> ApiResult<FactoryStats> {
        let buildings: Vec<FactoryBuilding> = self.fetch("getFactory").await?;
        Ok(FactoryStats::from_buildings(&buildings))
    }

    async fn trains(&self) -> ApiResult<Vec<Train>> {
        self.fetch("getTrains").await
    }

    async fn drones(&self) -> ApiResult<Vec<Drone>> {
        self.fetch("getDrone").await
    }

    async fn vehicles(&self) -> ApiResult<Vec<Vehicle>> {
        let mut vehicles = Vec::new();
        let mut last_error = None;

        for (endpoint, kind) in VEHICLE_ENDPOINTS {
            match self.fetch::<Vehicle>(endpoint).await {
                Ok(batch) => vehicles.extend(batch.into_iter().map(|mut v| {
                    v.kind = kind.to_string();
                    v
                })),
                Err(e) => {
                    debug!(endpoint, error = %e, "Vehicle query failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if vehicles.is_empty() && !GameFeed::is_online(self) => Err(e),
            _ => Ok(vehicles),
        }
    }

    async fn generators(&self) -> ApiResult<Vec<GeneratorGroup>> {
        let generators: Vec<Generator> = self.fetch("getGenerators").await?;
        Ok(group_generators(&generators))
    }

    async fn storage(&self, search: &str) -> ApiResult<Vec<StoredItem>> {
        let containers: Vec<StorageContainer> = self.fetch("getStorageInv").await?;
        Ok(storage_totals(&containers, search))
    }

    async fn production(&self) -> ApiResult<Vec<ProductionRate>> {
        let stats: Vec<ProdStat> = self.fetch("getProdStats").await?;
        Ok(production_rates(&stats))
    }

    async fn sink(&self) -> ApiResult<SinkEntry> {
        let entries: Vec<SinkEntry> = self.fetch("getResourceSink").await?;
        Ok(entries.into_iter().next().unwrap_or_default())
    }

    async fn switches(&self) -> ApiResult<Vec<Switch>> {
        self.fetch("getSwitches").await
    }

    fn is_online(&self) -> bool {
        GameFeed::is_online(self)
    }

    fn last_error(&self) -> String {
        GameFeed::last_error(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> FrmClient {
        FrmClient::new(&GameConfig {
            api_url: "http://localhost:8082/".to_string(),
            access_token: "token".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_parse_items_skips_bad_entries() {
        let value = json!([
            {"Name": "Switch A", "IsOn": true},
            {"Name": 5},
            {"Name": "Switch B"}
        ]);

        let switches: Vec<Switch> = parse_items("getSwitches", value).unwrap();
        assert_eq!(switches.len(), 2);
        assert!(switches[0].is_on);
        assert!(!switches[1].is_on);
    }

    #[test]
    fn test_parse_items_accepts_object() {
        let value = json!({"SessionName": "Base", "PassedDays": 12, "IsDay": false});

        let sessions: Vec<SessionInfo> = parse_items("getSessionInfo", value).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_name, "Base");
        assert_eq!(sessions[0].total_play_duration_text, "Unknown");
        assert!(!sessions[0].is_day);
    }

    #[test]
    fn test_parse_items_rejects_scalar() {
        let result: ApiResult<Vec<Switch>> = parse_items("getSwitches", json!("nope"));
        assert!(matches!(result, Err(ApiError::Malformed { .. })));
    }

    #[test]
    fn test_was_sent() {
        assert!(was_sent(&json!([{"IsSent": true}])));
        assert!(!was_sent(&json!([{"IsSent": false}])));
        assert!(!was_sent(&json!([])));
        assert!(was_sent(&json!({"IsSent": true})));
    }

    #[test]
    fn test_chat_entry_conversion() {
        let entry = ChatEntry {
            time_stamp: 1_700_000_000.0,
            server_time_stamp: 42.5,
            sender: "".to_string(),
            kind: "System".to_string(),
            message: "<PlayerName/> has joined the game!".to_string(),
        };

        let message = to_game_message(entry);
        assert_eq!(message.local_timestamp, 1_700_000_000);
        assert_eq!(message.server_timestamp, 42.5);
        assert_eq!(message.kind, GameMessageKind::System);
    }

    #[test]
    fn test_sender_label_truncates() {
        let client = client();
        let long = "x".repeat(40);
        assert_eq!(client.sender_label(&long).chars().count(), MAX_SENDER_CHARS);
        assert_eq!(client.sender_label("Alice"), "Alice");
        assert_eq!(client.url("getPlayer"), "http://localhost:8082/getPlayer");
    }

    #[test]
    fn test_initial_status_offline() {
        let client = client();
        assert!(!GameFeed::is_online(&client));
        assert_eq!(GameFeed::last_error(&client), "Not connected yet");
    }

    #[test]
    fn test_status_transitions() {
        let client = client();

        client.record(&Ok(json!([])));
        assert!(GameFeed::is_online(&client));

        client.record(&Err(ApiError::Status {
            endpoint: "getPlayer".to_string(),
            status: 503,
        }));
        assert!(!GameFeed::is_online(&client));
        assert_eq!(
            GameFeed::last_error(&client),
            "Server error: getPlayer returned HTTP 503"
        );
    }
}
