use serde::{Deserialize, Serialize};
use std::fmt;

pub mod rich_text;

/// Number of buffered chat lines that forces an immediate flush
pub const CHAT_BATCH_SIZE: usize = 50;
/// Seconds between periodic chat flushes
pub const CHAT_FLUSH_INTERVAL_SECS: u64 = 10;
/// The only account allowed to run raw server commands
pub const OPERATOR_STEAM_ID: SteamId = SteamId(76561197997290818);
/// Expiry stored for punishments issued with a non-positive duration
pub const PERMANENT_EXPIRY: i64 = i64::MAX;

/// Platform account id of a player
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SteamId(pub u64);

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Team {
    TeamA,
    TeamB,
    #[default]
    None,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameRole {
    #[default]
    Assault,
    Medic,
    Support,
    Engineer,
    Recon,
    Leader,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Snapshot of a connected player as reported by the game server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerInfo {
    pub steam_id: SteamId,
    pub name: String,
    pub team: Team,
    pub role: GameRole,
    pub is_alive: bool,
    pub position: Position,
}

impl PlayerInfo {
    pub fn new(steam_id: u64, name: &str) -> Self {
        Self {
            steam_id: SteamId(steam_id),
            name: name.to_string(),
            team: Team::None,
            role: GameRole::Assault,
            is_alive: true,
            position: Position::default(),
        }
    }

    pub fn with_team(mut self, team: Team) -> Self {
        self.team = team;
        self
    }

    pub fn with_role(mut self, role: GameRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_alive(mut self, is_alive: bool) -> Self {
        self.is_alive = is_alive;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

const WEAPON_CATALOG: &[&str] = &[
    "ACR",
    "AK-15",
    "AK-74",
    "AK5C",
    "AS Val",
    "AUG A3",
    "Desert Eagle",
    "FAL",
    "FAMAS",
    "G36C",
    "Glock 18",
    "Groza",
    "HK419",
    "Honey Badger",
    "Kriss Vector",
    "L86A1",
    "L96",
    "M110",
    "M200",
    "M249",
    "M4A1",
    "M9",
    "MG36",
    "MK14 EBR",
    "MK20",
    "MP443",
    "MP5",
    "MP7",
    "PP2000",
    "Rem700",
    "Rsh12",
    "SCAR-H",
    "Scorpion EVO",
    "SG550",
    "SSG 69",
    "SV-98",
    "UMP-45",
    "Ultimax 100",
    "Unica",
    "USP",
];

/// A weapon definition from the game's catalog
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct Weapon {
    pub name: String,
}

impl Weapon {
    /// Looks up a catalog weapon by name, ignoring case
    pub fn find(name: &str) -> Option<Weapon> {
        WEAPON_CATALOG
            .iter()
            .find(|candidate| candidate.eq_ignore_ascii_case(name.trim()))
            .map(|candidate| Weapon {
                name: candidate.to_string(),
            })
    }
}

impl fmt::Display for Weapon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Weapons a player asked to spawn with
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Loadout {
    pub primary: Option<Weapon>,
    pub secondary: Option<Weapon>,
}

impl Loadout {
    pub fn new(primary: &str, secondary: &str) -> Self {
        Self {
            primary: Weapon::find(primary),
            secondary: Weapon::find(secondary),
        }
    }
}

/// Account data the game server hands over when a player joins
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct PlayerStats {
    pub is_banned: bool,
    pub roles: u64,
    pub achievements: Vec<u8>,
    pub selections: Vec<u8>,
    pub tool_progress: Vec<u8>,
}

impl PlayerStats {
    /// Compact binary form stored next to the player row
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PunishmentKind {
    Ban,
    Gag,
    Mute,
}

impl PunishmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PunishmentKind::Ban => "ban",
            PunishmentKind::Gag => "gag",
            PunishmentKind::Mute => "mute",
        }
    }
}

impl fmt::Display for PunishmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
