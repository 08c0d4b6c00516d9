//! Chat command parsing and dispatch
//!
//! A chat line starting with `@` is an admin broadcast. A line starting with
//! `!` names a command followed by its raw argument text. Each command is
//! parsed once into a typed [`Command`] before anything is executed, so a
//! malformed invocation never has partial side effects.
//!
//! Every command reports whether the original chat line may still be
//! delivered. Only a successful `rcon` lets it through.

use crate::args::CommandArguments;
use crate::error::CommandError;
use crate::host::GameServer;
use crate::moderation::{length_from_seconds, ModerationState};
use crate::target::resolve_targets;
use log::{debug, info, warn};
use shared::rich_text::{self, MAGENTA, RED};
use shared::{PlayerInfo, PunishmentKind, SteamId};
use std::fmt;

const DEFAULT_KICK_REASON: &str = "Kicked by admin";
const DEFAULT_BAN_REASON: &str = "Banned by admin";
const DEFAULT_GAG_REASON: &str = "Gagged by admin";
const CLEAR_LINES: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Say,
    Clear,
    Kick,
    Slay,
    Ban,
    Gag,
    SaveLoc,
    Teleport,
    Restrict,
    Rcon,
}

impl CommandKind {
    /// Command names are matched exactly, including case
    pub fn from_name(name: &str) -> Option<CommandKind> {
        let kind = match name {
            "say" => CommandKind::Say,
            "clear" => CommandKind::Clear,
            "kick" => CommandKind::Kick,
            "slay" => CommandKind::Slay,
            "ban" => CommandKind::Ban,
            "gag" => CommandKind::Gag,
            "saveloc" => CommandKind::SaveLoc,
            "tele" => CommandKind::Teleport,
            "restrict" => CommandKind::Restrict,
            "rcon" => CommandKind::Rcon,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Say => "say",
            CommandKind::Clear => "clear",
            CommandKind::Kick => "kick",
            CommandKind::Slay => "slay",
            CommandKind::Ban => "ban",
            CommandKind::Gag => "gag",
            CommandKind::SaveLoc => "saveloc",
            CommandKind::Teleport => "tele",
            CommandKind::Restrict => "restrict",
            CommandKind::Rcon => "rcon",
        }
    }

    fn usage(self) -> &'static str {
        match self {
            CommandKind::Say => "<message>",
            CommandKind::Clear | CommandKind::SaveLoc => "",
            CommandKind::Kick => "<target> <reason>",
            CommandKind::Slay | CommandKind::Teleport => "<target>",
            CommandKind::Ban | CommandKind::Gag => "<target> <length> <reason>",
            CommandKind::Restrict => "<weapon> <true/false>",
            CommandKind::Rcon => "<command>",
        }
    }

    /// Only the operator account may run these
    pub fn requires_operator(self) -> bool {
        self == CommandKind::Rcon
    }

    fn arity_error(self) -> CommandError {
        CommandError::usage(format!(
            "Invalid number of arguments for {} command ({})",
            self.name(),
            self.usage()
        ))
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully validated command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say { message: String },
    Clear,
    Kick { target: String, reason: String },
    Slay { target: String },
    Ban { target: String, minutes: i32, reason: String },
    Gag { target: String, minutes: i32, reason: String },
    SaveLoc,
    Teleport { target: String },
    Restrict { weapon: String, restricted: bool },
    Rcon { command: String },
}

impl Command {
    pub fn parse(kind: CommandKind, mut args: CommandArguments) -> Result<Command, CommandError> {
        let command = match kind {
            CommandKind::Say => {
                let message = args.remaining_joined().ok_or_else(|| kind.arity_error())?;
                Command::Say { message }
            }
            CommandKind::Clear => Command::Clear,
            CommandKind::Kick => {
                let target = args.next_string().ok_or_else(|| kind.arity_error())?;
                let reason = args
                    .remaining_joined()
                    .unwrap_or_else(|| DEFAULT_KICK_REASON.to_string());
                Command::Kick { target, reason }
            }
            CommandKind::Slay => Command::Slay {
                target: args.next_string().ok_or_else(|| kind.arity_error())?,
            },
            CommandKind::Ban | CommandKind::Gag => {
                if args.count() < 2 {
                    return Err(kind.arity_error());
                }
                let target = args.next_string().ok_or_else(|| kind.arity_error())?;
                let minutes = args.next_int().ok_or_else(|| {
                    CommandError::usage(format!(
                        "Invalid {} length (pass a number of minutes)",
                        kind.name()
                    ))
                })?;
                let default_reason = if kind == CommandKind::Ban {
                    DEFAULT_BAN_REASON
                } else {
                    DEFAULT_GAG_REASON
                };
                let reason = args
                    .remaining_joined()
                    .unwrap_or_else(|| default_reason.to_string());

                if kind == CommandKind::Ban {
                    Command::Ban {
                        target,
                        minutes,
                        reason,
                    }
                } else {
                    Command::Gag {
                        target,
                        minutes,
                        reason,
                    }
                }
            }
            CommandKind::SaveLoc => Command::SaveLoc,
            CommandKind::Teleport => Command::Teleport {
                target: args.next_string().ok_or_else(|| kind.arity_error())?,
            },
            CommandKind::Restrict => {
                if args.count() != 2 {
                    return Err(kind.arity_error());
                }
                let invalid = || {
                    CommandError::usage(format!(
                        "Invalid arguments for restrict command ({})",
                        kind.usage()
                    ))
                };
                let weapon = args.next_string().ok_or_else(invalid)?;
                let restricted = args.next_bool().ok_or_else(invalid)?;
                Command::Restrict { weapon, restricted }
            }
            CommandKind::Rcon => Command::Rcon {
                command: args.remaining_joined().ok_or_else(|| kind.arity_error())?,
            },
        };

        Ok(command)
    }

    /// Runs the command; `Ok(true)` lets the original chat line through
    ///
    /// Targets that resolve to nobody are not an error: the action is simply
    /// applied to an empty set.
    pub fn execute(self, ctx: &mut CommandContext<'_>) -> Result<bool, CommandError> {
        match self {
            Command::Say { message } => {
                ctx.server.say_to_all_chat(&format!(
                    "{}[{}]: {}{}",
                    RED,
                    rich_text::bold("ADMIN"),
                    MAGENTA,
                    rich_text::italic(&message)
                ));
            }
            Command::Clear => {
                let blank = "\n".repeat(CLEAR_LINES);
                ctx.server
                    .say_to_all_chat(&format!("{}{}", blank, rich_text::size(".", 0)));
            }
            Command::Kick { target, reason } => {
                for player in ctx.targets(&target)? {
                    ctx.server.kick(&player, &reason);
                    ctx.server.ui_log_on_server(
                        &format!("{} was kicked from the server: {}", player.name, reason),
                        3.0,
                    );
                }
            }
            Command::Slay { target } => {
                for player in ctx.targets(&target)? {
                    ctx.server
                        .ui_log_on_server(&format!("{} was slayed", player.name), 3.0);
                    ctx.server.kill(&player);
                }
            }
            Command::Ban {
                target,
                minutes,
                reason,
            } => {
                let length = length_from_seconds(i64::from(minutes) * 60);
                for player in ctx.targets(&target)? {
                    ctx.state
                        .set_block(player.steam_id, PunishmentKind::Ban, minutes, &reason);
                    ctx.server.kick(&player, &format!("{} {}", reason, length));
                    ctx.server.ui_log_on_server(
                        &format!(
                            "{} was banned from the server: {} ({})",
                            player.name, reason, length
                        ),
                        4.0,
                    );
                    info!("{} banned {} ({}): {}", ctx.invoker.name, player.steam_id, length, reason);
                }
            }
            Command::Gag {
                target,
                minutes,
                reason,
            } => {
                let length = length_from_seconds(i64::from(minutes) * 60);
                for player in ctx.targets(&target)? {
                    ctx.state
                        .set_block(player.steam_id, PunishmentKind::Gag, minutes, &reason);
                    ctx.server.ui_log_on_server(
                        &format!("{} was gagged: {} ({})", player.name, reason, length),
                        4.0,
                    );
                    info!("{} gagged {} ({}): {}", ctx.invoker.name, player.steam_id, length, reason);
                }
            }
            Command::SaveLoc => {
                ctx.state
                    .save_location(ctx.invoker.steam_id, ctx.invoker.position);
            }
            Command::Teleport { target } => {
                let destination = ctx
                    .state
                    .saved_location(ctx.invoker.steam_id)
                    .unwrap_or_default();
                for player in ctx.targets(&target)? {
                    ctx.server
                        .ui_log_on_server(&format!("{} was teleported", player.name), 3.0);
                    ctx.server.teleport(&player, destination);
                }
            }
            Command::Restrict { weapon, restricted } => {
                ctx.state.restrict_weapon(&weapon, restricted)?;
            }
            Command::Rcon { command } => {
                info!("{} ran rcon: {}", ctx.invoker.name, command);
                ctx.server.execute_command(&command);
                return Ok(true);
            }
        }

        Ok(false)
    }
}

/// Everything a command may read or act on
pub struct CommandContext<'a> {
    pub invoker: &'a PlayerInfo,
    pub server: &'a dyn GameServer,
    pub state: &'a mut ModerationState,
}

impl CommandContext<'_> {
    fn targets(&self, specifier: &str) -> Result<Vec<PlayerInfo>, CommandError> {
        resolve_targets(specifier, self.invoker, &self.server.all_players())
    }
}

/// Routes chat lines to commands and turns their outcome into a delivery verdict
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    operator: SteamId,
}

impl CommandDispatcher {
    pub fn new(operator: SteamId) -> Self {
        Self { operator }
    }

    /// Returns whether the chat line should be delivered as normal chat
    ///
    /// Lines that are not commands, and unknown command names, are allowed.
    /// Failed commands are denied: usage problems are reported to the
    /// invoker, anything else is only logged. An unknown weapon is the one
    /// failure that lets the line through.
    pub fn dispatch(
        &self,
        line: &str,
        invoker: &PlayerInfo,
        server: &dyn GameServer,
        state: &mut ModerationState,
    ) -> bool {
        let (kind, raw_args) = if let Some(rest) = line.strip_prefix('@') {
            (CommandKind::Say, rest.trim_start_matches('@'))
        } else if let Some(rest) = line.strip_prefix('!') {
            let rest = rest.trim_start_matches('!');
            let (name, raw_args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            match CommandKind::from_name(name) {
                Some(kind) => (kind, raw_args),
                None => return true,
            }
        } else {
            return true;
        };

        if kind.requires_operator() && invoker.steam_id != self.operator {
            warn!(
                "Player {} ({}) tried to run {} without permission",
                invoker.name, invoker.steam_id, kind
            );
            return false;
        }

        let mut ctx = CommandContext {
            invoker,
            server,
            state,
        };

        let result = Command::parse(kind, CommandArguments::new(raw_args))
            .and_then(|command| command.execute(&mut ctx));

        match result {
            Ok(allow) => allow,
            Err(CommandError::Usage(message)) => {
                debug!("Rejected {} from {}: {}", kind, invoker.name, message);
                server.message_to_player(invoker, &message);
                false
            }
            Err(err @ CommandError::UnknownWeapon(_)) => {
                debug!("Ignoring {} from {}: {}", kind, invoker.name, err);
                true
            }
            Err(err) => {
                warn!("Command {} from {} failed: {}", kind, invoker.name, err);
                false
            }
        }
    }
}
