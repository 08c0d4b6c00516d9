//! Capabilities the game server exposes to the admin module

use shared::{PlayerInfo, Position};
use std::sync::Mutex;

/// Side effects and roster queries provided by the running game server
///
/// All calls are fire-and-forget from the module's point of view; the host
/// is expected to queue them onto its own connection.
pub trait GameServer: Send + Sync {
    /// Players currently on the server
    fn all_players(&self) -> Vec<PlayerInfo>;
    fn message_to_player(&self, player: &PlayerInfo, message: &str);
    /// Warning popup shown to a single player
    fn warn_player(&self, player: &PlayerInfo, message: &str);
    fn say_to_all_chat(&self, message: &str);
    /// Line in the server's on-screen log, shown for `seconds`
    fn ui_log_on_server(&self, message: &str, seconds: f32);
    fn kick(&self, player: &PlayerInfo, reason: &str);
    fn kill(&self, player: &PlayerInfo);
    fn teleport(&self, player: &PlayerInfo, to: Position);
    /// Runs a raw console command on the game server
    fn execute_command(&self, command: &str);
}

/// One side effect requested by the module
#[derive(Debug, Clone, PartialEq)]
pub enum HostAction {
    Message { to: String, message: String },
    Warn { to: String, message: String },
    SayToAll { message: String },
    UiLog { message: String, seconds: f32 },
    Kick { name: String, reason: String },
    Kill { name: String },
    Teleport { name: String, to: Position },
    Execute { command: String },
}

/// Host that keeps a fixed roster and records every action it is asked for
#[derive(Debug, Default)]
pub struct RecordingServer {
    players: Mutex<Vec<PlayerInfo>>,
    actions: Mutex<Vec<HostAction>>,
}

impl RecordingServer {
    pub fn new(players: Vec<PlayerInfo>) -> Self {
        Self {
            players: Mutex::new(players),
            actions: Mutex::new(Vec::new()),
        }
    }

    pub fn set_players(&self, players: Vec<PlayerInfo>) {
        if let Ok(mut guard) = self.players.lock() {
            *guard = players;
        }
    }

    pub fn actions(&self) -> Vec<HostAction> {
        self.actions
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Returns and forgets everything recorded so far
    pub fn take_actions(&self) -> Vec<HostAction> {
        self.actions
            .lock()
            .map(|mut guard| std::mem::take(&mut *guard))
            .unwrap_or_default()
    }

    fn record(&self, action: HostAction) {
        if let Ok(mut guard) = self.actions.lock() {
            guard.push(action);
        }
    }
}

impl GameServer for RecordingServer {
    fn all_players(&self) -> Vec<PlayerInfo> {
        self.players
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn message_to_player(&self, player: &PlayerInfo, message: &str) {
        self.record(HostAction::Message {
            to: player.name.clone(),
            message: message.to_string(),
        });
    }

    fn warn_player(&self, player: &PlayerInfo, message: &str) {
        self.record(HostAction::Warn {
            to: player.name.clone(),
            message: message.to_string(),
        });
    }

    fn say_to_all_chat(&self, message: &str) {
        self.record(HostAction::SayToAll {
            message: message.to_string(),
        });
    }

    fn ui_log_on_server(&self, message: &str, seconds: f32) {
        self.record(HostAction::UiLog {
            message: message.to_string(),
            seconds,
        });
    }

    fn kick(&self, player: &PlayerInfo, reason: &str) {
        self.record(HostAction::Kick {
            name: player.name.clone(),
            reason: reason.to_string(),
        });
    }

    fn kill(&self, player: &PlayerInfo) {
        self.record(HostAction::Kill {
            name: player.name.clone(),
        });
    }

    fn teleport(&self, player: &PlayerInfo, to: Position) {
        self.record(HostAction::Teleport {
            name: player.name.clone(),
            to,
        });
    }

    fn execute_command(&self, command: &str) {
        self.record(HostAction::Execute {
            command: command.to_string(),
        });
    }
}
