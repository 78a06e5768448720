//! Chat commands (help, list, power, etc).
//!
//! Handles command parsing and rendering of server status replies.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::bridge::sources::{CommandHandler, ServerAdmin, ServerQueries};
use crate::common::error::ApiResult;
use crate::config::ServerConfig;

/// Storage replies list at most this many items.
const STORAGE_LIMIT: usize = 15;
/// Production replies list at most this many items.
const PROD_LIMIT: usize = 10;
/// Save listings show at most this many saves.
const SAVES_LIMIT: usize = 5;
/// Ticks per second below which the server is reported as slow.
const HEALTHY_TICK_RATE: f64 = 25.0;

const HELP_TEXT: &str = concat!(
    "Commands:\n",
    "  list - Online players\n",
    "  status - Server info\n",
    "  session - Session details\n",
    "  settings - Server settings\n",
    "  cheats - Cheat settings\n",
    "  saves - Recent saves\n",
    "  power - Power grid\n",
    "  generators - Power breakdown\n",
    "  factory - Building stats\n",
    "  prod - Production rates\n",
    "  storage [item] - Search storage\n",
    "  sink - AWESOME Sink\n",
    "  trains - Train status\n",
    "  drones - Drone status\n",
    "  vehicles - Vehicle status\n",
    "  switches - Power switches\n",
    "  connect - Server connection info",
);

const UNKNOWN_TEXT: &str = "Unknown command. Type 'help' for available commands.";
const NO_ADMIN_TEXT: &str = "Server API not configured";

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    List,
    Status,
    Session,
    Settings,
    Cheats,
    Saves,
    Power,
    Generators,
    Factory,
    Prod,
    /// Optional case-insensitive item filter.
    Storage(String),
    Sink,
    Trains,
    Drones,
    Vehicles,
    Switches,
    Connect,
    Unknown(String),
}

impl Command {
    /// Parse command text. A leading `/` is optional and empty input means help.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let text = text.strip_prefix('/').unwrap_or(text);

        let (name, args) = match text.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (text, ""),
        };

        match name.to_lowercase().as_str() {
            "" | "help" => Self::Help,
            "list" | "players" => Self::List,
            "status" => Self::Status,
            "session" => Self::Session,
            "settings" => Self::Settings,
            "cheats" => Self::Cheats,
            "saves" => Self::Saves,
            "power" => Self::Power,
            "generators" => Self::Generators,
            "factory" => Self::Factory,
            "prod" => Self::Prod,
            "storage" => Self::Storage(args.to_string()),
            "sink" => Self::Sink,
            "trains" => Self::Trains,
            "drones" => Self::Drones,
            "vehicles" => Self::Vehicles,
            "switches" => Self::Switches,
            "connect" => Self::Connect,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Answers commands from the game server's status endpoints and, when
/// configured, the dedicated server API.
pub struct BridgeCommandHandler {
    queries: Arc<dyn ServerQueries>,
    admin: Option<Arc<dyn ServerAdmin>>,
    server: ServerConfig,
}

impl BridgeCommandHandler {
    pub fn new(queries: Arc<dyn ServerQueries>, server: ServerConfig) -> Self {
        Self {
            queries,
            admin: None,
            server,
        }
    }

    /// Enable `session`, `settings`, `cheats` and `saves`.
    pub fn with_admin(mut self, admin: Arc<dyn ServerAdmin>) -> Self {
        self.admin = Some(admin);
        self
    }

    async fn execute(&self, command: &Command) -> String {
        match command {
            Command::Help => HELP_TEXT.to_string(),
            Command::List => self.list().await,
            Command::Status => self.status().await,
            Command::Session => self.session().await,
            Command::Settings => self.settings().await,
            Command::Cheats => self.cheats().await,
            Command::Saves => self.saves().await,
            Command::Power => self.power().await,
            Command::Generators => self.generators().await,
            Command::Factory => self.factory().await,
            Command::Prod => self.prod().await,
            Command::Storage(search) => self.storage(search).await,
            Command::Sink => self.sink().await,
            Command::Trains => self.trains().await,
            Command::Drones => self.drones().await,
            Command::Vehicles => self.vehicles().await,
            Command::Switches => self.switches().await,
            Command::Connect => self.connect(),
            Command::Unknown(_) => UNKNOWN_TEXT.to_string(),
        }
    }

    async fn list(&self) -> String {
        let players = ok_or_empty("players", self.queries.players().await);
        if players.is_empty() {
            return "No players online (or FRM unavailable)".to_string();
        }

        let mut lines = vec![format!("Online players ({}):", players.len())];
        for player in &players {
            if player.ping_ms > 0 {
                lines.push(format!("  - {} ({}ms)", player.name, player.ping_ms));
            } else {
                lines.push(format!("  - {}", player.name));
            }
        }
        lines.join("\n")
    }

    async fn status(&self) -> String {
        let session = match self.queries.session().await {
            Ok(session) => session,
            Err(e) => {
                debug!(error = %e, "Session query failed");
                if !self.queries.is_online() {
                    return "Server: OFFLINE".to_string();
                }
                return "Session info unavailable".to_string();
            }
        };

        let player_count = ok_or_empty("players", self.queries.players().await).len();
        let time_of_day = if session.is_day { "Day" } else { "Night" };

        format!(
            "Server: {} (ONLINE)\nPlayers online: {}\nDay {:.0} ({})\nPlaytime: {}",
            session.session_name,
            player_count,
            session.passed_days,
            time_of_day,
            session.total_play_duration_text
        )
    }

    async fn session(&self) -> String {
        let Some(admin) = &self.admin else {
            return NO_ADMIN_TEXT.to_string();
        };
        let state = match admin.server_state().await {
            Ok(state) => state,
            Err(e) => {
                debug!(error = %e, "Server state query failed");
                return "Session info unavailable".to_string();
            }
        };

        let tick_status = if state.average_tick_rate >= HEALTHY_TICK_RATE {
            "OK"
        } else {
            "SLOW"
        };
        let mut lines = vec![
            format!("Session: {}", state.active_session_name),
            format!("Players: {}/{}", state.num_connected_players, state.player_limit),
            format!("Tech Tier: {}", state.tech_tier),
            format!("Phase: {}", state.phase_label()),
            format!("Playtime: {}", hours_minutes(state.total_game_duration, " ")),
            format!("Tick Rate: {:.1}/30 ({})", state.average_tick_rate, tick_status),
        ];
        if state.is_game_paused {
            lines.push("Status: PAUSED".to_string());
        }
        if let Some(schematic) = state.researching() {
            lines.push(format!("Researching: {}", schematic));
        }
        lines.join("\n")
    }

    async fn settings(&self) -> String {
        let Some(admin) = &self.admin else {
            return NO_ADMIN_TEXT.to_string();
        };
        let options = match admin.server_options().await {
            Ok(options) => options,
            Err(e) => {
                debug!(error = %e, "Server options query failed");
                return "Settings unavailable".to_string();
            }
        };

        [
            "Server Settings:".to_string(),
            format!("  Auto-Pause: {}", yes_no(options.auto_pause)),
            format!("  Autosave Interval: {} min", options.autosave_interval_secs / 60),
            format!(
                "  Autosave on Disconnect: {}",
                yes_no(options.autosave_on_disconnect)
            ),
            format!("  Network Quality: {}", options.network_quality_label()),
            format!("  Seasonal Events: {}", yes_no(options.seasonal_events)),
        ]
        .join("\n")
    }

    async fn cheats(&self) -> String {
        let Some(admin) = &self.admin else {
            return NO_ADMIN_TEXT.to_string();
        };
        let enabled = match admin.advanced_settings().await {
            Ok(settings) => settings.enabled_cheats(),
            Err(e) => {
                debug!(error = %e, "Advanced settings query failed");
                return "Cheat settings unavailable".to_string();
            }
        };

        if enabled.is_empty() {
            return "Cheats: None enabled".to_string();
        }
        let mut lines = vec!["Cheats Enabled:".to_string()];
        lines.extend(enabled.iter().map(|label| format!("  - {}", label)));
        lines.join("\n")
    }

    async fn saves(&self) -> String {
        let Some(admin) = &self.admin else {
            return NO_ADMIN_TEXT.to_string();
        };
        let saves = ok_or_empty("saves", admin.recent_saves(SAVES_LIMIT).await);
        if saves.is_empty() {
            return "No saves found".to_string();
        }

        let mut lines = vec!["Recent Saves:".to_string()];
        for save in &saves {
            let marker = if save.is_current_session { "*" } else { " " };
            let modded = if save.is_modded { " [modded]" } else { "" };
            lines.push(format!(
                " {}{}: {} - {}{}",
                marker,
                save.name,
                hours_minutes(save.playtime_seconds, ""),
                format_save_time(&save.save_time),
                modded
            ));
        }
        lines.push("(* = current session)".to_string());
        lines.join("\n")
    }

    async fn power(&self) -> String {
        let power = match self.queries.power().await {
            Ok(power) => power,
            Err(e) => {
                debug!(error = %e, "Power query failed");
                return "Power data unavailable".to_string();
            }
        };

        let state = if power.fuse_triggered { "TRIPPED" } else { "OK" };
        let mut lines = vec![
            format!("Power Grid Status: {}", state),
            format!("  Production: {:.1} MW", power.total_production),
            format!("  Consumption: {:.1} MW", power.total_consumption),
            format!("  Headroom: {:+.1} MW", power.headroom()),
            format!("  Max Consumption: {:.1} MW", power.max_consumption),
        ];

        if power.battery_capacity > 0.0 {
            lines.push(format!(
                "  Battery: {:.0}% ({:.1} MWh)",
                power.battery_percent, power.battery_capacity
            ));
        }

        lines.join("\n")
    }

    async fn generators(&self) -> String {
        let groups = ok_or_empty("generators", self.queries.generators().await);
        if groups.is_empty() {
            return "No generators found".to_string();
        }

        let mut lines = vec!["Power Generation:".to_string()];
        for group in &groups {
            lines.push(format!(
                "  {}: {}x ({:.0}/{:.0} MW)",
                group.name, group.count, group.producing, group.capacity
            ));
        }

        let producing: f64 = groups.iter().map(|g| g.producing).sum();
        let capacity: f64 = groups.iter().map(|g| g.capacity).sum();
        lines.push(format!("Total: {:.0}/{:.0} MW", producing, capacity));
        lines.join("\n")
    }

    async fn factory(&self) -> String {
        match self.queries.factory().await {
            Ok(stats) => format!(
                "Factory Status:\n  Buildings: {}\n  Running: {}\n  Idle: {}\n  Avg Efficiency: {:.1}%",
                stats.total_buildings, stats.running, stats.idle, stats.avg_efficiency
            ),
            Err(e) => {
                debug!(error = %e, "Factory query failed");
                "Factory data unavailable".to_string()
            }
        }
    }

    async fn prod(&self) -> String {
        let rates = ok_or_empty("production", self.queries.production().await);
        if rates.is_empty() {
            return "No production data".to_string();
        }

        let mut lines = vec!["Production (items/min):".to_string()];
        for rate in rates.iter().take(PROD_LIMIT) {
            lines.push(format!("  {}: {:+.1}", rate.name, rate.net()));
        }
        lines.join("\n")
    }

    async fn storage(&self, search: &str) -> String {
        let items = ok_or_empty("storage", self.queries.storage(search).await);
        if items.is_empty() {
            if search.is_empty() {
                return "No items in storage".to_string();
            }
            return format!("No items matching '{}' found in storage", search);
        }

        let mut lines = vec![if search.is_empty() {
            "Storage:".to_string()
        } else {
            format!("Storage (matching: {}):", search)
        }];
        for item in items.iter().take(STORAGE_LIMIT) {
            lines.push(format!("  {}: {}", item.name, group_thousands(item.amount)));
        }
        if items.len() >= STORAGE_LIMIT {
            lines.push("  ...".to_string());
        }
        lines.join("\n")
    }

    async fn sink(&self) -> String {
        match self.queries.sink().await {
            Ok(sink) => format!(
                "AWESOME Sink:\n  Coupons: {}\n  Total Points: {}\n  Next Coupon: {:.1}% ({} points)",
                sink.num_coupon.max(0.0) as u64,
                group_thousands(sink.total_points.max(0.0) as u64),
                sink.percent * 100.0,
                group_thousands(sink.points_to_coupon.max(0.0) as u64)
            ),
            Err(e) => {
                debug!(error = %e, "Sink query failed");
                "Sink data unavailable".to_string()
            }
        }
    }

    async fn trains(&self) -> String {
        let trains = ok_or_empty("trains", self.queries.trains().await);
        if trains.is_empty() {
            return "No trains found".to_string();
        }

        let mut lines = vec![format!("Trains ({}):", trains.len())];
        for train in &trains {
            let speed = if train.forward_speed > 0.0 {
                format!("{:.0} km/h", train.forward_speed)
            } else {
                "stopped".to_string()
            };
            lines.push(format!("  - {}: {} ({})", train.name, train.status, speed));
        }
        lines.join("\n")
    }

    async fn drones(&self) -> String {
        let drones = ok_or_empty("drones", self.queries.drones().await);
        if drones.is_empty() {
            return "No drones found".to_string();
        }

        let mut lines = vec![format!("Drones ({}):", drones.len())];
        for drone in &drones {
            lines.push(format!(
                "  - {} -> {}: {}",
                drone.home_station, drone.paired_station, drone.current_flying_mode
            ));
        }
        lines.join("\n")
    }

    async fn vehicles(&self) -> String {
        let vehicles = ok_or_empty("vehicles", self.queries.vehicles().await);
        if vehicles.is_empty() {
            return "No vehicles found".to_string();
        }

        let mut lines = vec![format!("Vehicles ({}):", vehicles.len())];
        for vehicle in &vehicles {
            let mode = if vehicle.auto_pilot { "autopilot" } else { "manual" };
            let speed = if vehicle.forward_speed > 0.0 {
                format!("{:.0} km/h", vehicle.forward_speed)
            } else {
                "parked".to_string()
            };
            lines.push(format!("  - {}: {} ({})", vehicle.kind, speed, mode));
        }
        lines.join("\n")
    }

    async fn switches(&self) -> String {
        let switches = ok_or_empty("switches", self.queries.switches().await);
        if switches.is_empty() {
            return "No power switches found".to_string();
        }

        let mut lines = vec![format!("Power Switches ({}):", switches.len())];
        for switch in &switches {
            let state = if switch.is_on { "ON" } else { "OFF" };
            lines.push(format!("  - {}: {}", switch.name, state));
        }
        lines.join("\n")
    }

    fn connect(&self) -> String {
        if self.server.host.is_empty() {
            return "Server connection info not configured".to_string();
        }

        let mut lines = vec![
            "Server Connection Info:".to_string(),
            format!("  Host: {}", self.server.host),
            format!("  Port: {}", self.server.port),
        ];
        if !self.server.password.is_empty() {
            lines.push(format!("  Password: {}", self.server.password));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl CommandHandler for BridgeCommandHandler {
    async fn handle(&self, text: &str) -> String {
        let command = Command::parse(text);
        info!(?command, "Handling command");

        // Help never needs the server.
        if command == Command::Help {
            return HELP_TEXT.to_string();
        }

        let reply = self.execute(&command).await;

        if !self.queries.is_online() {
            return format!("[Server Offline] {}", self.queries.last_error());
        }

        reply
    }
}

/// A failed list query reads as an empty one.
fn ok_or_empty<T>(what: &str, result: ApiResult<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        debug!(query = what, error = %e, "Query failed");
        Vec::new()
    })
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// `7380` → `2h 3m`, with `separator` between the parts.
fn hours_minutes(seconds: u64, separator: &str) -> String {
    format!("{}h{}{}m", seconds / 3600, separator, (seconds % 3600) / 60)
}

/// `2026.02.03-05.55.38` → `2026/02/03 05:55`. Other shapes pass through.
fn format_save_time(raw: &str) -> String {
    match raw.split_once('-') {
        Some((date, time)) => {
            let time: String = time.replace('.', ":").chars().take(5).collect();
            format!("{} {}", date.replace('.', "/"), time)
        }
        None => raw.to_string(),
    }
}

/// Format with comma thousands separators.
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
