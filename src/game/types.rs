//! Ficsit Remote Monitoring payloads and the summaries built from them.
//!
//! FRM reports most numbers as floats, so numeric fields are read as `f64`
//! and narrowed only for display.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// One entry of `getChatMessages`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ChatEntry {
    pub time_stamp: f64,
    pub server_time_stamp: f64,
    pub sender: String,
    #[serde(rename = "Type")]
    pub kind: String,
    pub message: String,
}

/// One entry of `getPlayer`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PlayerEntry {
    pub name: String,
    pub id: String,
    pub ping_ms: f64,
    pub online: bool,
    pub dead: bool,
    #[serde(rename = "PlayerHP")]
    pub player_hp: f64,
}

impl Default for PlayerEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            id: String::new(),
            ping_ms: 0.0,
            online: false,
            dead: false,
            player_hp: 100.0,
        }
    }
}

/// An online player as shown by the `list` command.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfo {
    pub name: String,
    pub id: String,
    pub ping_ms: u32,
    pub dead: bool,
    pub health: f64,
}

impl PlayerInfo {
    /// Online players with a non-blank name.
    pub fn from_entry(entry: PlayerEntry) -> Option<Self> {
        let name = entry.name.trim();
        if !entry.online || name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            id: entry.id,
            ping_ms: entry.ping_ms.max(0.0) as u32,
            dead: entry.dead,
            health: entry.player_hp,
        })
    }
}

/// One power circuit from `getPower`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PowerCircuit {
    pub power_production: f64,
    pub power_consumed: f64,
    pub power_max_consumed: f64,
    pub battery_percent: f64,
    pub battery_capacity: f64,
    pub fuse_triggered: bool,
}

/// Power figures summed over all circuits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PowerStats {
    pub total_production: f64,
    pub total_consumption: f64,
    pub max_consumption: f64,
    /// Highest charge of any circuit's batteries.
    pub battery_percent: f64,
    pub battery_capacity: f64,
    pub fuse_triggered: bool,
}

impl PowerStats {
    pub fn aggregate(circuits: &[PowerCircuit]) -> Self {
        circuits.iter().fold(Self::default(), |mut stats, circuit| {
            stats.total_production += circuit.power_production;
            stats.total_consumption += circuit.power_consumed;
            stats.max_consumption += circuit.power_max_consumed;
            stats.battery_percent = stats.battery_percent.max(circuit.battery_percent);
            stats.battery_capacity += circuit.battery_capacity;
            stats.fuse_triggered |= circuit.fuse_triggered;
            stats
        })
    }

    pub fn headroom(&self) -> f64 {
        self.total_production - self.total_consumption
    }
}

/// `getSessionInfo`; the endpoint returns either an object or a one-element list.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SessionInfo {
    pub session_name: String,
    pub total_play_duration_text: String,
    pub passed_days: f64,
    pub is_day: bool,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            session_name: "Unknown".to_string(),
            total_play_duration_text: "Unknown".to_string(),
            passed_days: 0.0,
            is_day: true,
        }
    }
}

/// One building from `getFactory`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct FactoryBuilding {
    pub is_producing: bool,
    /// Already a percentage (0-100+).
    pub productivity: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactoryStats {
    pub total_buildings: usize,
    pub running: usize,
    pub idle: usize,
    pub avg_efficiency: f64,
}

impl FactoryStats {
    pub fn from_buildings(buildings: &[FactoryBuilding]) -> Self {
        let total_buildings = buildings.len();
        let running = buildings.iter().filter(|b| b.is_producing).count();
        let avg_efficiency = if total_buildings == 0 {
            0.0
        } else {
            buildings.iter().map(|b| b.productivity).sum::<f64>() / total_buildings as f64
        };

        Self {
            total_buildings,
            running,
            idle: total_buildings - running,
            avg_efficiency,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Train {
    pub name: String,
    pub forward_speed: f64,
    pub status: String,
    pub power_consumed: f64,
}

impl Default for Train {
    fn default() -> Self {
        Self {
            name: "Train".to_string(),
            forward_speed: 0.0,
            status: "Unknown".to_string(),
            power_consumed: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Drone {
    #[serde(deserialize_with = "label")]
    pub home_station: String,
    #[serde(deserialize_with = "label")]
    pub paired_station: String,
    pub current_flying_mode: String,
    pub flying_speed: f64,
}

impl Default for Drone {
    fn default() -> Self {
        Self {
            home_station: "Unknown".to_string(),
            paired_station: "Unknown".to_string(),
            current_flying_mode: "Unknown".to_string(),
            flying_speed: 0.0,
        }
    }
}

/// Accept either a plain string or an object carrying a `Name`.
fn label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Object(map) => map
            .get("Name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
        _ => "Unknown".to_string(),
    })
}

/// A truck, tractor or explorer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Vehicle {
    #[serde(skip)]
    pub kind: String,
    pub name: String,
    pub forward_speed: f64,
    pub auto_pilot: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Generator {
    pub name: String,
    pub production_capacity: f64,
    pub is_full_speed: bool,
    pub fuel_amount: f64,
}

/// Generators of one type, summed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorGroup {
    pub name: String,
    pub count: usize,
    pub capacity: f64,
    pub producing: f64,
}

/// Group generators by name, sorted by name.
pub fn group_generators(generators: &[Generator]) -> Vec<GeneratorGroup> {
    let mut groups: BTreeMap<String, GeneratorGroup> = BTreeMap::new();
    for generator in generators {
        let name = if generator.name.is_empty() {
            "Unknown"
        } else {
            generator.name.as_str()
        };
        let group = groups.entry(name.to_string()).or_insert_with(|| GeneratorGroup {
            name: name.to_string(),
            ..Default::default()
        });
        group.count += 1;
        group.capacity += generator.production_capacity;
        if generator.is_full_speed || generator.fuel_amount > 0.0 {
            group.producing += generator.production_capacity;
        }
    }
    groups.into_values().collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ItemStack {
    pub name: String,
    pub amount: f64,
}

/// One container from `getStorageInv`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct StorageContainer {
    pub inventory: Vec<ItemStack>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub name: String,
    pub amount: u64,
}

/// Sum items across containers, optionally filtered by a case-insensitive
/// substring, largest amounts first.
pub fn storage_totals(containers: &[StorageContainer], search: &str) -> Vec<StoredItem> {
    let search = search.to_lowercase();
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();

    for stack in containers.iter().flat_map(|c| c.inventory.iter()) {
        if !search.is_empty() && !stack.name.to_lowercase().contains(&search) {
            continue;
        }
        *totals.entry(stack.name.clone()).or_default() += stack.amount.max(0.0) as u64;
    }

    let mut items: Vec<StoredItem> = totals
        .into_iter()
        .map(|(name, amount)| StoredItem { name, amount })
        .collect();
    items.sort_by(|a, b| b.amount.cmp(&a.amount));
    items
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProdStat {
    pub name: String,
    pub current_prod: f64,
    pub current_consumed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductionRate {
    pub name: String,
    pub produced: f64,
    pub consumed: f64,
}

impl ProductionRate {
    pub fn net(&self) -> f64 {
        self.produced - self.consumed
    }
}

/// Items that are actually moving, highest net production first.
pub fn production_rates(stats: &[ProdStat]) -> Vec<ProductionRate> {
    let mut rates: Vec<ProductionRate> = stats
        .iter()
        .filter(|s| s.current_prod > 0.0 || s.current_consumed > 0.0)
        .map(|s| ProductionRate {
            name: s.name.clone(),
            produced: s.current_prod,
            consumed: s.current_consumed,
        })
        .collect();
    rates.sort_by(|a, b| b.net().total_cmp(&a.net()));
    rates
}

/// `getResourceSink`; usually a single entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SinkEntry {
    pub num_coupon: f64,
    pub total_points: f64,
    pub points_to_coupon: f64,
    /// Progress to the next coupon, 0.0-1.0.
    pub percent: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Switch {
    pub name: String,
    pub is_on: bool,
}

impl Default for Switch {
    fn default() -> Self {
        Self {
            name: "Switch".to_string(),
            is_on: false,
        }
    }
}
