use clap::Parser;
use log::{error, info, warn};
use server::config::{ModuleConfig, PipelineConfig};
use server::hooks::AdminModule;
use server::host::GameServer;
use server::storage::SqliteStore;
use shared::{Loadout, PlayerInfo, PlayerStats, Position, SteamId, Team, OPERATOR_STEAM_ID};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Game server stand-in that prints every requested side effect
struct ConsoleServer {
    players: Mutex<Vec<PlayerInfo>>,
}

impl ConsoleServer {
    fn new(players: Vec<PlayerInfo>) -> Self {
        Self {
            players: Mutex::new(players),
        }
    }

    fn find(&self, name: &str) -> Option<PlayerInfo> {
        self.all_players()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    fn remove(&self, player: &PlayerInfo) {
        if let Ok(mut players) = self.players.lock() {
            players.retain(|p| p.steam_id != player.steam_id);
        }
    }

    fn update_position(&self, player: &PlayerInfo, to: Position) {
        if let Ok(mut players) = self.players.lock() {
            if let Some(p) = players.iter_mut().find(|p| p.steam_id == player.steam_id) {
                p.position = to;
            }
        }
    }
}

impl GameServer for ConsoleServer {
    fn all_players(&self) -> Vec<PlayerInfo> {
        self.players
            .lock()
            .map(|players| players.clone())
            .unwrap_or_default()
    }

    fn message_to_player(&self, player: &PlayerInfo, message: &str) {
        println!("[to {}] {}", player.name, message);
    }

    fn warn_player(&self, player: &PlayerInfo, message: &str) {
        println!("[warning to {}] {}", player.name, message);
    }

    fn say_to_all_chat(&self, message: &str) {
        println!("[all] {}", message);
    }

    fn ui_log_on_server(&self, message: &str, seconds: f32) {
        println!("[ui {:.0}s] {}", seconds, message);
    }

    fn kick(&self, player: &PlayerInfo, reason: &str) {
        println!("[kick] {}: {}", player.name, reason);
        self.remove(player);
    }

    fn kill(&self, player: &PlayerInfo) {
        println!("[kill] {}", player.name);
    }

    fn teleport(&self, player: &PlayerInfo, to: Position) {
        println!("[teleport] {} -> ({}, {}, {})", player.name, to.x, to.y, to.z);
        self.update_position(player, to);
    }

    fn execute_command(&self, command: &str) {
        println!("[console] {}", command);
    }
}

fn default_roster(operator: SteamId) -> Vec<PlayerInfo> {
    vec![
        PlayerInfo::new(operator.0, "Admin")
            .with_team(Team::TeamA)
            .with_position(Position::new(10.0, 0.0, 5.0)),
        PlayerInfo::new(76561198000000001, "Fox").with_team(Team::TeamB),
        PlayerInfo::new(76561198000000002, "Foxtrot").with_team(Team::TeamB),
        PlayerInfo::new(76561198000000003, "Wolf").with_team(Team::TeamA),
    ]
}

/// Handles one console line
///
/// `<name>: <chat>` sends chat as that player, `/spawn <name> <primary> <secondary>`
/// asks for a spawn, `/connect <name>` replays the connect check.
async fn handle_line(module: &AdminModule, host: &ConsoleServer, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    if let Some(rest) = line.strip_prefix("/spawn ") {
        let mut parts = rest.splitn(3, ' ');
        let name = parts.next().unwrap_or_default();
        let primary = parts.next().unwrap_or("none");
        let secondary = parts.next().unwrap_or("none");
        match host.find(name) {
            Some(player) => {
                let allowed = module
                    .on_spawn_request(&player, &Loadout::new(primary, secondary))
                    .await;
                println!("spawn {}: {}", player.name, if allowed { "allowed" } else { "denied" });
            }
            None => warn!("No player named {}", name),
        }
        return;
    }

    if let Some(name) = line.strip_prefix("/connect ") {
        match host.find(name.trim()) {
            Some(player) => {
                let allowed = module.on_player_connected(&player).await;
                println!("connect {}: {}", player.name, if allowed { "allowed" } else { "refused" });
            }
            None => warn!("No player named {}", name),
        }
        return;
    }

    match line.split_once(": ") {
        Some((name, text)) => match host.find(name) {
            Some(player) => {
                if module.on_chat_message(&player, text).await {
                    println!("{}: {}", player.name, text);
                }
            }
            None => warn!("No player named {}", name),
        },
        None => warn!("Expected '<name>: <message>', got '{}'", line),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Connection string of the chat store
        #[clap(short, long, default_value = server::config::DEFAULT_DATABASE_URL)]
        database_url: String,
        /// Seconds between periodic chat flushes
        #[clap(short, long, default_value_t = shared::CHAT_FLUSH_INTERVAL_SECS)]
        flush_interval_secs: u64,
        /// Buffered chat lines that trigger an immediate flush
        #[clap(short, long, default_value_t = shared::CHAT_BATCH_SIZE)]
        batch_size: usize,
        /// Steam id allowed to run rcon
        #[clap(short, long, default_value_t = OPERATOR_STEAM_ID.0)]
        operator: u64,
    }

    let args = Args::parse();

    let config = ModuleConfig {
        database_url: args.database_url,
        operator: SteamId(args.operator),
        pipeline: PipelineConfig {
            batch_size: args.batch_size.max(1),
            flush_interval: Duration::from_secs(args.flush_interval_secs.max(1)),
            ..PipelineConfig::default()
        },
    };

    let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
    let host = Arc::new(ConsoleServer::new(default_roster(config.operator)));
    let module = AdminModule::new(host.clone(), store, config);

    for player in host.all_players() {
        if module.on_player_connected(&player).await {
            module
                .on_player_join(player.steam_id, &PlayerStats::default())
                .await;
        }
    }
    info!("Console host ready with {} players", host.all_players().len());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => handle_line(&module, &host, &line).await,
                    Ok(None) => break,
                    Err(e) => {
                        error!("Failed to read console input: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down gracefully...");
                break;
            }
        }
    }

    module.shutdown().await;
    Ok(())
}
