//! Entry points the game server calls on its event stream
//!
//! None of these wait on storage except `on_player_join`, which the host
//! runs off its event stream anyway. Chat logging goes through the
//! pipeline's buffer, and everything else is in-memory state.

use crate::commands::CommandDispatcher;
use crate::config::ModuleConfig;
use crate::host::GameServer;
use crate::moderation::{Clock, ModerationState, SystemClock};
use crate::pipeline::ChatPipeline;
use crate::storage::ChatStore;
use log::{debug, error, info, warn};
use shared::{Loadout, PlayerInfo, PlayerStats, PunishmentKind, SteamId};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::timeout;

pub struct AdminModule {
    server: Arc<dyn GameServer>,
    state: Arc<RwLock<ModerationState>>,
    dispatcher: CommandDispatcher,
    pipeline: Arc<ChatPipeline>,
    config: ModuleConfig,
}

impl AdminModule {
    /// Builds the module and starts the chat flush timer
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(server: Arc<dyn GameServer>, store: Arc<dyn ChatStore>, config: ModuleConfig) -> Self {
        Self::with_clock(server, store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        server: Arc<dyn GameServer>,
        store: Arc<dyn ChatStore>,
        config: ModuleConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pipeline = ChatPipeline::new(store, config.pipeline.clone());
        pipeline.spawn_flush_timer();

        info!("Admin module ready, operator is {}", config.operator);

        Self {
            server,
            state: Arc::new(RwLock::new(ModerationState::new(clock))),
            dispatcher: CommandDispatcher::new(config.operator),
            pipeline,
            config,
        }
    }

    pub fn state(&self) -> &Arc<RwLock<ModerationState>> {
        &self.state
    }

    pub fn pipeline(&self) -> &Arc<ChatPipeline> {
        &self.pipeline
    }

    /// Returns whether the chat line should be delivered
    pub async fn on_chat_message(&self, player: &PlayerInfo, text: &str) -> bool {
        self.pipeline.record_chat(player.steam_id, text);

        let mut state = self.state.write().await;
        if !self
            .dispatcher
            .dispatch(text, player, self.server.as_ref(), &mut state)
        {
            return false;
        }

        if let Some(reason) = state.is_blocked(player.steam_id, PunishmentKind::Gag) {
            debug!("Suppressed chat from gagged player {}", player.name);
            self.server
                .warn_player(player, &format!("You are currently gagged: {}", reason));
            return false;
        }

        true
    }

    /// Returns whether the player may spawn with `loadout`
    pub async fn on_spawn_request(&self, player: &PlayerInfo, loadout: &Loadout) -> bool {
        let mut state = self.state.write().await;

        if state.is_blocked(player.steam_id, PunishmentKind::Ban).is_some() {
            debug!("Refused spawn for banned player {}", player.name);
            return false;
        }

        let slots = [loadout.primary.as_ref(), loadout.secondary.as_ref()];
        for weapon in slots.into_iter().flatten() {
            if state.is_weapon_restricted(weapon) {
                self.server
                    .warn_player(player, &format!("You are not allowed to use {}!", weapon));
                return false;
            }
        }

        true
    }

    /// Kicks a banned player; returns whether the connection may proceed
    pub async fn on_player_connected(&self, player: &PlayerInfo) -> bool {
        let reason = self
            .state
            .write()
            .await
            .is_blocked(player.steam_id, PunishmentKind::Ban);

        match reason {
            Some(reason) => {
                info!("Kicking banned player {} ({})", player.name, player.steam_id);
                self.server.kick(player, &reason);
                false
            }
            None => true,
        }
    }

    /// Stores the joining player's row; failures never hold up the join
    pub async fn on_player_join(&self, steam_id: SteamId, stats: &PlayerStats) {
        let store = self.pipeline.store();
        let stored = timeout(
            self.config.pipeline.store_timeout,
            store.store_player(steam_id, stats),
        )
        .await;

        match stored {
            Ok(Ok(player_id)) => {
                self.pipeline.remember_player(steam_id, player_id);
                debug!("Player {} joined as row {}", steam_id, player_id);
            }
            Ok(Err(e)) => error!("Failed to store joining player {}: {}", steam_id, e),
            Err(_) => warn!(
                "Storing joining player {} timed out after {:?}",
                steam_id, self.config.pipeline.store_timeout
            ),
        }
    }

    pub async fn shutdown(&self) {
        info!("Shutting down admin module");
        self.pipeline.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::host::{HostAction, RecordingServer};
    use crate::moderation::ManualClock;
    use crate::storage::SqliteStore;
    use shared::{Team, Weapon, OPERATOR_STEAM_ID};
    use std::time::Duration;

    struct Harness {
        module: AdminModule,
        server: Arc<RecordingServer>,
        store: Arc<SqliteStore>,
        clock: Arc<ManualClock>,
        admin: PlayerInfo,
        fox: PlayerInfo,
    }

    async fn harness() -> Harness {
        let admin = PlayerInfo::new(OPERATOR_STEAM_ID.0, "Admin").with_team(Team::TeamA);
        let fox = PlayerInfo::new(76561198000000001, "Fox").with_team(Team::TeamB);
        let server = Arc::new(RecordingServer::new(vec![admin.clone(), fox.clone()]));
        let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let clock = Arc::new(ManualClock::new(1_700_000_000));

        let config = ModuleConfig {
            pipeline: PipelineConfig {
                flush_interval: Duration::from_secs(3600),
                ..PipelineConfig::default()
            },
            ..ModuleConfig::default()
        };
        let module = AdminModule::with_clock(server.clone(), store.clone(), config, clock.clone());

        Harness {
            module,
            server,
            store,
            clock,
            admin,
            fox,
        }
    }

    #[tokio::test]
    async fn test_plain_chat_is_delivered() {
        let h = harness().await;
        assert!(h.module.on_chat_message(&h.fox, "gg").await);
        assert!(h.server.actions().is_empty());
    }

    #[tokio::test]
    async fn test_gagged_player_is_warned() {
        let h = harness().await;
        assert!(!h.module.on_chat_message(&h.admin, "!gag Fox 10 spam").await);

        assert!(!h.module.on_chat_message(&h.fox, "hello").await);
        let actions = h.server.take_actions();
        assert!(actions.contains(&HostAction::Warn {
            to: "Fox".to_string(),
            message: "You are currently gagged: spam (length: 10.0 minutes)".to_string(),
        }));

        h.clock.advance(Duration::from_secs(11 * 60));
        assert!(h.module.on_chat_message(&h.fox, "hello again").await);
    }

    #[tokio::test]
    async fn test_gag_does_not_block_commands_that_deny() {
        let h = harness().await;
        h.module.on_chat_message(&h.admin, "!gag Fox 10").await;
        h.server.take_actions();

        // A denied command never reaches the gag check
        assert!(!h.module.on_chat_message(&h.fox, "!kick").await);
        let actions = h.server.take_actions();
        assert!(!actions
            .iter()
            .any(|a| matches!(a, HostAction::Warn { .. })));
    }

    #[tokio::test]
    async fn test_banned_player_is_kicked_on_connect() {
        let h = harness().await;
        assert!(h.module.on_player_connected(&h.fox).await);

        h.module.on_chat_message(&h.admin, "!ban Fox 0 cheating").await;
        h.server.take_actions();

        assert!(!h.module.on_player_connected(&h.fox).await);
        assert_eq!(
            h.server.take_actions(),
            vec![HostAction::Kick {
                name: "Fox".to_string(),
                reason: "cheating (length: permanently)".to_string(),
            }]
        );
        assert!(!h.module.on_spawn_request(&h.fox, &Loadout::default()).await);
    }

    #[tokio::test]
    async fn test_spawn_with_restricted_weapon() {
        let h = harness().await;
        let loadout = Loadout::new("M4A1", "Glock 18");
        assert!(h.module.on_spawn_request(&h.fox, &loadout).await);

        h.module.on_chat_message(&h.admin, "!restrict glock 18 true").await;
        h.module.on_chat_message(&h.admin, "!restrict \"Glock 18\" true").await;
        h.server.take_actions();

        assert!(!h.module.on_spawn_request(&h.fox, &loadout).await);
        assert_eq!(
            h.server.take_actions(),
            vec![HostAction::Warn {
                to: "Fox".to_string(),
                message: "You are not allowed to use Glock 18!".to_string(),
            }]
        );

        h.module.on_chat_message(&h.admin, "!restrict m4a1 true").await;
        assert!(!h.module.on_spawn_request(&h.fox, &loadout).await);
        let warned: Vec<_> = h
            .server
            .take_actions()
            .into_iter()
            .filter(|a| matches!(a, HostAction::Warn { .. }))
            .collect();
        assert_eq!(
            warned,
            vec![HostAction::Warn {
                to: "Fox".to_string(),
                message: "You are not allowed to use M4A1!".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_restriction_state_is_visible() {
        let h = harness().await;
        h.module.on_chat_message(&h.admin, "!restrict m4a1 true").await;
        let state = h.module.state().read().await;
        assert!(state.is_weapon_restricted(&Weapon::find("M4A1").unwrap()));
    }

    #[tokio::test]
    async fn test_join_enables_chat_logging() {
        let h = harness().await;

        h.module.on_chat_message(&h.fox, "before join").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.module.pipeline().pending_len(), 0);

        h.module
            .on_player_join(h.fox.steam_id, &PlayerStats::default())
            .await;
        h.module.on_chat_message(&h.fox, "after join").await;
        h.module.on_chat_message(&h.fox, "!unknowncommand").await;
        assert_eq!(h.module.pipeline().pending_len(), 2);

        h.module.pipeline().flush().await.unwrap();
        assert_eq!(h.store.chat_log_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_join_survives_storage_failure() {
        let h = harness().await;
        h.store.close().await;

        h.module
            .on_player_join(h.fox.steam_id, &PlayerStats::default())
            .await;
        assert!(h.module.on_chat_message(&h.fox, "still here").await);
    }

    #[tokio::test]
    async fn test_shutdown_flushes() {
        let h = harness().await;
        h.module
            .on_player_join(h.fox.steam_id, &PlayerStats::default())
            .await;
        h.module.on_chat_message(&h.fox, "bye").await;

        h.module.shutdown().await;
        assert_eq!(h.module.pipeline().pending_len(), 0);
    }
}
