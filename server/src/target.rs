//! Resolution of admin-typed target specifiers to players
//!
//! Selectors such as `@all`, `@usa` or `@medic` may pick any number of
//! players. Free-text fragments (`#<partial steam id>` or part of a name) must
//! pick at most one player; anything broader is reported as ambiguous instead
//! of being guessed.

use crate::error::{CommandError, TargetKind};
use shared::{GameRole, PlayerInfo, Team};

/// Broad filters over the player list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    All,
    AllButMe,
    Me,
    Team(Team),
    Dead,
    Alive,
    Role(GameRole),
}

impl Selector {
    /// Matches the selector keywords, ignoring case
    pub fn parse(specifier: &str) -> Option<Selector> {
        let selector = match specifier.to_lowercase().as_str() {
            "@all" => Selector::All,
            "@!me" => Selector::AllButMe,
            "@me" => Selector::Me,
            "@usa" => Selector::Team(Team::TeamA),
            "@rus" => Selector::Team(Team::TeamB),
            "@dead" => Selector::Dead,
            "@alive" => Selector::Alive,
            "@assault" => Selector::Role(GameRole::Assault),
            "@medic" => Selector::Role(GameRole::Medic),
            "@support" => Selector::Role(GameRole::Support),
            "@engineer" => Selector::Role(GameRole::Engineer),
            "@recon" => Selector::Role(GameRole::Recon),
            "@leader" => Selector::Role(GameRole::Leader),
            _ => return None,
        };
        Some(selector)
    }

    pub fn select(&self, invoker: &PlayerInfo, players: &[PlayerInfo]) -> Vec<PlayerInfo> {
        if *self == Selector::Me {
            return vec![invoker.clone()];
        }

        players
            .iter()
            .filter(|p| match self {
                Selector::All => true,
                Selector::AllButMe => p.steam_id != invoker.steam_id,
                Selector::Me => p.steam_id == invoker.steam_id,
                Selector::Team(team) => p.team == *team,
                Selector::Dead => !p.is_alive,
                Selector::Alive => p.is_alive,
                Selector::Role(role) => p.role == *role,
            })
            .cloned()
            .collect()
    }
}

/// Resolves a target specifier against the current roster
///
/// Selectors win outright. A `#` prefix matches the rest of the specifier as a
/// substring of each steam id; a single hit is returned, several hits are
/// ambiguous and no hit falls through to name matching. Name matching is a
/// case-insensitive substring test of the whole specifier and may return an
/// empty list.
pub fn resolve_targets(
    specifier: &str,
    invoker: &PlayerInfo,
    players: &[PlayerInfo],
) -> Result<Vec<PlayerInfo>, CommandError> {
    if let Some(selector) = Selector::parse(specifier) {
        return Ok(selector.select(invoker, players));
    }

    if specifier.starts_with('#') {
        let fragment = specifier.trim_start_matches('#');
        let matches: Vec<PlayerInfo> = players
            .iter()
            .filter(|p| p.steam_id.to_string().contains(fragment))
            .cloned()
            .collect();

        if matches.len() > 1 {
            return Err(CommandError::AmbiguousTarget {
                fragment: fragment.to_string(),
                kind: TargetKind::SteamId,
            });
        }
        if matches.len() == 1 {
            return Ok(matches);
        }
    }

    let needle = specifier.to_lowercase();
    let matches: Vec<PlayerInfo> = players
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .cloned()
        .collect();

    if matches.len() > 1 {
        return Err(CommandError::AmbiguousTarget {
            fragment: specifier.to_string(),
            kind: TargetKind::Name,
        });
    }

    Ok(matches)
}
