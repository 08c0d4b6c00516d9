//! # Admin Tools Server Library
//!
//! This library is the moderation and chat-logging layer that runs inside a
//! live game server. It interprets admin commands typed into chat, keeps
//! time-bounded punishments, arbitrates spawn requests and persists every chat
//! line to a relational store without stalling the game's event stream.
//!
//! ## Core Responsibilities
//!
//! ### Chat Commands
//! A chat line starting with `!` names a command (`!ban Fox 30 cheating`), a
//! line starting with `@` is an admin broadcast. Each command decides whether
//! the original chat line is still delivered to other players. Lines that are
//! not commands pass through untouched.
//!
//! ### Moderation State
//! Bans, gags and mutes are kept per player with an expiry time. Expired
//! records are evicted the first time they are looked at. Weapon restrictions
//! and saved teleport locations live next to them. None of this survives a
//! restart.
//!
//! ### Chat Persistence
//! Chat lines are buffered and written in batches, every flush interval or as
//! soon as a full batch is waiting. Each batch is written in one transaction
//! and a failed batch is retried on the next flush.
//!
//! ## Module Organization
//!
//! ### Arguments Module (`args`)
//! Quote-aware tokenizer and the cursor the command parsers read from.
//!
//! ### Target Module (`target`)
//! Turns `@all`, `@usa`, `#7656`, `fox` and friends into concrete players.
//!
//! ### Moderation Module (`moderation`)
//! Punishment records, expiry, weapon restrictions and saved locations.
//!
//! ### Commands Module (`commands`)
//! Typed commands, their parsing and execution, and the dispatcher that maps
//! a chat line to an allow/deny verdict.
//!
//! ### Host Module (`host`)
//! The capability trait the game server implements (messages, kicks,
//! teleports, raw console commands) and a recording implementation.
//!
//! ### Storage and Pipeline Modules (`storage`, `pipeline`)
//! SQLite persistence for players and chat lines, and the batching buffer in
//! front of it.
//!
//! ### Hooks Module (`hooks`)
//! `AdminModule`, the entry points the game server calls for chat, spawn,
//! connect and join events.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ModuleConfig;
//! use server::hooks::AdminModule;
//! use server::host::RecordingServer;
//! use server::storage::SqliteStore;
//! use shared::PlayerInfo;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ModuleConfig::default();
//!     let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
//!     let host = Arc::new(RecordingServer::new(vec![PlayerInfo::new(1, "Fox")]));
//!
//!     let module = AdminModule::new(host, store, config);
//!
//!     let fox = PlayerInfo::new(1, "Fox");
//!     let delivered = module.on_chat_message(&fox, "hello").await;
//!     assert!(delivered);
//!
//!     module.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod commands;
pub mod config;
pub mod error;
pub mod hooks;
pub mod host;
pub mod moderation;
pub mod pipeline;
pub mod storage;
pub mod target;

pub use error::{CommandError, StorageError};
pub use hooks::AdminModule;
