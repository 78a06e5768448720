//! Client for the Satisfactory dedicated server HTTPS API.
//!
//! Every call is a `POST {api-url}/api/v1` carrying `{function, data}` and a
//! bearer token. Replies wrap their payload in a `data` object.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::bridge::sources::ServerAdmin;
use crate::common::error::{ApiError, ApiResult};
use crate::config::ServerConfig;

const API_PATH: &str = "/api/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Advanced game settings reported as cheats, in display order.
const CHEAT_RULES: [(&str, &str); 10] = [
    ("FG.PlayerRules.GodMode", "God Mode"),
    ("FG.PlayerRules.FlightMode", "Flight Mode"),
    ("FG.PlayerRules.NoBuildCost", "No Build Cost"),
    ("FG.GameRules.NoFuelCost", "No Fuel Cost"),
    ("FG.GameRules.NoPower", "No Power Required"),
    ("FG.GameRules.NoUnlockCost", "No Unlock Cost"),
    ("FG.GameRules.GiveAllTiers", "All Tiers Unlocked"),
    ("FG.GameRules.UnlockAllResearchSchematics", "All Schematics Unlocked"),
    ("FG.GameRules.UnlockInstantAltRecipes", "All Alt Recipes"),
    ("FG.GameRules.DisableArachnidCreatures", "No Spiders"),
];

// ============================================================
// Payloads
// ============================================================

#[derive(Serialize)]
struct ApiCall<'a> {
    function: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HealthReply {
    health: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ServerStateReply {
    server_game_state: ServerGameState,
}

/// `QueryServerState` → `serverGameState`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerGameState {
    pub active_session_name: String,
    pub num_connected_players: u32,
    pub player_limit: u32,
    pub tech_tier: u32,
    pub game_phase: String,
    /// Seconds.
    pub total_game_duration: u64,
    pub average_tick_rate: f64,
    pub is_game_paused: bool,
    pub active_schematic: String,
}

impl Default for ServerGameState {
    fn default() -> Self {
        Self {
            active_session_name: "Unknown".to_string(),
            num_connected_players: 0,
            player_limit: 0,
            tech_tier: 0,
            game_phase: String::new(),
            total_game_duration: 0,
            average_tick_rate: 0.0,
            is_game_paused: false,
            active_schematic: String::new(),
        }
    }
}

impl ServerGameState {
    /// Readable project assembly phase. The raw value is an asset path such
    /// as `.../GP_Project_Assembly_Phase_2.GP_Project_Assembly_Phase_2'`.
    pub fn phase_label(&self) -> &'static str {
        let phase = self.game_phase.as_str();
        if phase.contains("Phase_1") {
            "Phase 1 (0/1 deliveries)"
        } else if phase.contains("Phase_2") {
            "Phase 2 (1/2 deliveries)"
        } else if phase.contains("Phase_3") {
            "Phase 3 (2/3 deliveries)"
        } else if phase.contains("Phase_4") {
            "Phase 4 (3/4 deliveries)"
        } else if phase.contains("Phase_5") {
            "Phase 5 (4/5 deliveries)"
        } else if phase.contains("Victory") || phase.contains("Phase_6") {
            "Complete!"
        } else {
            "Unknown"
        }
    }

    /// The milestone being researched, if any.
    pub fn researching(&self) -> Option<&str> {
        Some(self.active_schematic.as_str()).filter(|s| !s.is_empty() && *s != "None")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ServerOptionsReply {
    server_options: HashMap<String, Value>,
}

/// `GetServerOptions`, decoded from its `FG.*` string map.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerOptions {
    pub auto_pause: bool,
    pub autosave_on_disconnect: bool,
    pub autosave_interval_secs: u64,
    pub seasonal_events: bool,
    pub network_quality: u8,
}

impl ServerOptions {
    fn from_map(options: &HashMap<String, Value>) -> Self {
        let text = |key: &str, default: &'static str| -> String {
            options
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };

        Self {
            auto_pause: text("FG.DSAutoPause", "False") == "True",
            autosave_on_disconnect: text("FG.DSAutoSaveOnDisconnect", "False") == "True",
            autosave_interval_secs: text("FG.AutosaveInterval", "300")
                .parse::<f64>()
                .map(|secs| secs.max(0.0) as u64)
                .unwrap_or(300),
            seasonal_events: text("FG.DisableSeasonalEvents", "True") != "True",
            network_quality: text("FG.NetworkQuality", "3").parse().unwrap_or(3),
        }
    }

    pub fn network_quality_label(&self) -> &'static str {
        match self.network_quality {
            0 => "Low",
            1 => "Medium",
            2 => "High",
            3 => "Ultra",
            _ => "Unknown",
        }
    }
}

/// `GetAdvancedGameSettings`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AdvancedSettings {
    pub creative_mode_enabled: bool,
    pub advanced_game_settings: HashMap<String, Value>,
}

impl AdvancedSettings {
    /// Labels of the enabled cheats, creative mode first.
    pub fn enabled_cheats(&self) -> Vec<&'static str> {
        let creative = self.creative_mode_enabled.then_some("Creative Mode");
        let rules = CHEAT_RULES.iter().filter_map(|(key, label)| {
            let on = self.advanced_game_settings.get(*key).and_then(Value::as_str) == Some("True");
            on.then_some(*label)
        });
        creative.into_iter().chain(rules).collect()
    }
}

/// `EnumerateSessions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionList {
    pub sessions: Vec<SessionSaves>,
    pub current_session_index: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSaves {
    pub save_headers: Vec<SaveHeader>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaveHeader {
    pub save_name: String,
    pub play_duration_seconds: u64,
    /// `2026.02.03-05.55.38`.
    pub save_date_time: String,
    pub is_modded_save: bool,
}

/// A save as listed by the `saves` command.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveEntry {
    pub name: String,
    pub is_current_session: bool,
    pub playtime_seconds: u64,
    pub save_time: String,
    pub is_modded: bool,
}

impl SessionList {
    /// Up to `limit` saves, taking each session's newest headers in order.
    pub fn recent_saves(&self, limit: usize) -> Vec<SaveEntry> {
        let mut saves = Vec::new();
        for (index, session) in self.sessions.iter().enumerate() {
            let is_current = index == self.current_session_index;
            saves.extend(session.save_headers.iter().take(limit).map(|header| SaveEntry {
                name: header.save_name.clone(),
                is_current_session: is_current,
                playtime_seconds: header.play_duration_seconds,
                save_time: header.save_date_time.clone(),
                is_modded: header.is_modded_save,
            }));
            if saves.len() >= limit {
                break;
            }
        }
        saves.truncate(limit);
        saves
    }
}

// ============================================================
// Client
// ============================================================

/// Dedicated server API client used by the admin commands.
pub struct ServerApiClient {
    http: reqwest::Client,
    endpoint: String,
    api_token: String,
}

impl ServerApiClient {
    pub fn new(config: &ServerConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            // Dedicated servers ship a self-signed certificate.
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|source| ApiError::Request {
                endpoint: "client".to_string(),
                source,
            })?;

        Ok(Self {
            http,
            endpoint: format!("{}{}", config.api_url.trim_end_matches('/'), API_PATH),
            api_token: config.api_token.clone(),
        })
    }

    /// Ask the server whether it considers itself healthy.
    pub async fn health_check(&self) -> bool {
        let data = json!({ "ClientCustomData": "" });
        match self.call::<HealthReply>("HealthCheck", Some(data)).await {
            Ok(reply) => reply.health == "healthy",
            Err(e) => {
                warn!(error = %e, "Dedicated server API health check failed");
                false
            }
        }
    }

    async fn call<T: DeserializeOwned>(&self, function: &str, data: Option<Value>) -> ApiResult<T> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&ApiCall { function, data })
            .send()
            .await
            .map_err(|source| ApiError::Request {
                endpoint: function.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: function.to_string(),
                status: status.as_u16(),
            });
        }

        let reply = response.json::<Value>().await.map_err(|e| ApiError::Malformed {
            endpoint: function.to_string(),
            message: e.to_string(),
        })?;
        parse_reply(function, reply)
    }
}

/// Decode the `data` object of a reply.
fn parse_reply<T: DeserializeOwned>(function: &str, mut reply: Value) -> ApiResult<T> {
    let data = reply
        .get_mut("data")
        .map(Value::take)
        .filter(|data| !data.is_null())
        .ok_or_else(|| ApiError::Malformed {
            endpoint: function.to_string(),
            message: "reply has no data".to_string(),
        })?;

    serde_json::from_value(data).map_err(|e| ApiError::Malformed {
        endpoint: function.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl ServerAdmin for ServerApiClient {
    async fn server_state(&self) -> ApiResult<ServerGameState> {
        let reply: ServerStateReply = self.call("QueryServerState", None).await?;
        Ok(reply.server_game_state)
    }

    async fn server_options(&self) -> ApiResult<ServerOptions> {
        let reply: ServerOptionsReply = self.call("GetServerOptions", None).await?;
        Ok(ServerOptions::from_map(&reply.server_options))
    }

    async fn advanced_settings(&self) -> ApiResult<AdvancedSettings> {
        self.call("GetAdvancedGameSettings", None).await
    }

    async fn recent_saves(&self, limit: usize) -> ApiResult<Vec<SaveEntry>> {
        let sessions: SessionList = self.call("EnumerateSessions", None).await?;
        debug!(sessions = sessions.sessions.len(), "Enumerated sessions");
        Ok(sessions.recent_saves(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str) -> SaveHeader {
        SaveHeader {
            save_name: name.to_string(),
            play_duration_seconds: 3_660,
            save_date_time: "2026.02.03-05.55.38".to_string(),
            is_modded_save: false,
        }
    }

    #[test]
    fn test_endpoint_and_call_body() {
        let client = ServerApiClient::new(&ServerConfig {
            api_url: "https://factory.example:7777/".to_string(),
            api_token: "secret".to_string(),
            ..ServerConfig::default()
        })
        .unwrap();
        assert_eq!(client.endpoint, "https://factory.example:7777/api/v1");

        let body = serde_json::to_value(ApiCall {
            function: "QueryServerState",
            data: None,
        })
        .unwrap();
        assert_eq!(body, json!({ "function": "QueryServerState" }));
    }

    #[test]
    fn test_parse_server_state() {
        let reply = json!({
            "data": {
                "serverGameState": {
                    "activeSessionName": "Northern Forest",
                    "numConnectedPlayers": 3,
                    "playerLimit": 4,
                    "techTier": 6,
                    "gamePhase": "/Script/FactoryGame.FGGamePhase'/Game/FactoryGame/GamePhases/GP_Project_Assembly_Phase_2.GP_Project_Assembly_Phase_2'",
                    "totalGameDuration": 7_380,
                    "averageTickRate": 29.5,
                    "isGamePaused": false,
                    "activeSchematic": "None"
                }
            }
        });

        let state = parse_reply::<ServerStateReply>("QueryServerState", reply)
            .unwrap()
            .server_game_state;
        assert_eq!(state.active_session_name, "Northern Forest");
        assert_eq!(state.num_connected_players, 3);
        assert_eq!(state.phase_label(), "Phase 2 (1/2 deliveries)");
        assert_eq!(state.researching(), None);
    }

    #[test]
    fn test_parse_reply_without_data() {
        let reply = json!({ "errorCode": "insufficient_scope", "errorMessage": "nope" });
        let result = parse_reply::<ServerStateReply>("QueryServerState", reply);
        assert!(matches!(result, Err(ApiError::Malformed { .. })));

        let result = parse_reply::<ServerStateReply>("QueryServerState", json!({ "data": null }));
        assert!(matches!(result, Err(ApiError::Malformed { .. })));
    }

    #[test]
    fn test_phase_labels() {
        let state = |phase: &str| ServerGameState {
            game_phase: phase.to_string(),
            ..ServerGameState::default()
        };
        assert_eq!(state("GP_Project_Assembly_Phase_5").phase_label(), "Phase 5 (4/5 deliveries)");
        assert_eq!(state("GP_Victory").phase_label(), "Complete!");
        assert_eq!(state("").phase_label(), "Unknown");
        assert_eq!(ServerGameState::default().active_session_name, "Unknown");
    }

    #[test]
    fn test_server_options_from_map() {
        let reply = json!({
            "data": {
                "serverOptions": {
                    "FG.DSAutoPause": "True",
                    "FG.DSAutoSaveOnDisconnect": "False",
                    "FG.AutosaveInterval": "600.000000",
                    "FG.DisableSeasonalEvents": "False",
                    "FG.NetworkQuality": "2"
                }
            }
        });

        let raw = parse_reply::<ServerOptionsReply>("GetServerOptions", reply).unwrap();
        let options = ServerOptions::from_map(&raw.server_options);
        assert!(options.auto_pause);
        assert!(!options.autosave_on_disconnect);
        assert_eq!(options.autosave_interval_secs, 600);
        assert!(options.seasonal_events);
        assert_eq!(options.network_quality_label(), "High");

        let defaults = ServerOptions::from_map(&HashMap::new());
        assert_eq!(defaults.autosave_interval_secs, 300);
        assert!(!defaults.seasonal_events);
        assert_eq!(defaults.network_quality_label(), "Ultra");
    }

    #[test]
    fn test_enabled_cheats() {
        let reply = json!({
            "data": {
                "creativeModeEnabled": true,
                "advancedGameSettings": {
                    "FG.GameRules.NoPower": "True",
                    "FG.PlayerRules.GodMode": "True",
                    "FG.PlayerRules.FlightMode": "False"
                }
            }
        });

        let settings = parse_reply::<AdvancedSettings>("GetAdvancedGameSettings", reply).unwrap();
        assert_eq!(
            settings.enabled_cheats(),
            vec!["Creative Mode", "God Mode", "No Power Required"]
        );
        assert!(AdvancedSettings::default().enabled_cheats().is_empty());
    }

    #[test]
    fn test_recent_saves_marks_current_session() {
        let sessions = SessionList {
            sessions: vec![
                SessionSaves {
                    save_headers: vec![header("old_1"), header("old_2")],
                },
                SessionSaves {
                    save_headers: vec![header("main_1"), header("main_2"), header("main_3")],
                },
            ],
            current_session_index: 1,
        };

        let saves = sessions.recent_saves(4);
        let names: Vec<&str> = saves.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["old_1", "old_2", "main_1", "main_2"]);
        assert!(!saves[0].is_current_session);
        assert!(saves[2].is_current_session);

        assert_eq!(sessions.recent_saves(1).len(), 1);
        assert!(SessionList::default().recent_saves(5).is_empty());
    }
}
