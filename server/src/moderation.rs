//! In-memory moderation state: punishments, weapon restrictions and saved
//! teleport locations
//!
//! Nothing here is persisted. A restart clears every active ban, gag,
//! restriction and saved location.
//!
//! Punishment expiry is evaluated lazily: a record stays in its map until the
//! first lookup that finds it expired, and that lookup removes it. Presence of
//! a record therefore never means the punishment is active on its own; only a
//! comparison against the clock at read time does.

use crate::error::CommandError;
use log::{debug, info};
use shared::{Position, PunishmentKind, SteamId, Weapon, PERMANENT_EXPIRY};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the current unix time in seconds
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_secs() as i64
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_secs() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunishmentRecord {
    pub kind: PunishmentKind,
    /// Unix seconds; `PERMANENT_EXPIRY` for punishments that never lapse
    pub expires_at: i64,
    pub reason: String,
}

impl PunishmentRecord {
    pub fn is_permanent(&self) -> bool {
        self.expires_at == PERMANENT_EXPIRY
    }
}

/// Renders a duration the way admins and punished players see it
pub fn length_from_seconds(seconds: i64) -> String {
    let minutes = seconds as f64 / 60.0;
    if minutes <= 0.0 {
        "permanently".to_string()
    } else if minutes < 1.0 {
        format!("{} seconds", seconds)
    } else if minutes < 60.0 {
        format!("{:.1} minutes", minutes)
    } else if minutes < 1440.0 {
        format!("{:.1} hours", minutes / 60.0)
    } else {
        format!("{:.1} days", minutes / 1440.0)
    }
}

pub struct ModerationState {
    clock: Arc<dyn Clock>,
    punishments: HashMap<PunishmentKind, HashMap<SteamId, PunishmentRecord>>,
    restricted_weapons: HashSet<Weapon>,
    saved_locations: HashMap<SteamId, Position>,
}

impl Default for ModerationState {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl ModerationState {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            punishments: HashMap::new(),
            restricted_weapons: HashSet::new(),
            saved_locations: HashMap::new(),
        }
    }

    pub fn now_unix(&self) -> i64 {
        self.clock.now_unix()
    }

    /// Returns the reason text if the player is currently under `kind`
    ///
    /// The reason carries the remaining duration, e.g. `spam (length: 9.5
    /// minutes)`. An expired record is removed and reported as not blocked.
    pub fn is_blocked(&mut self, steam_id: SteamId, kind: PunishmentKind) -> Option<String> {
        let now = self.clock.now_unix();
        let records = self.punishments.get_mut(&kind)?;
        let record = records.get(&steam_id)?;

        if now <= record.expires_at {
            let length = if record.is_permanent() {
                length_from_seconds(0)
            } else {
                length_from_seconds(record.expires_at - now)
            };
            return Some(format!("{} (length: {})", record.reason, length));
        }

        records.remove(&steam_id);
        debug!("Expired {} for {} evicted", kind, steam_id);
        None
    }

    /// Whether a record is stored, active or not
    pub fn has_record(&self, steam_id: SteamId, kind: PunishmentKind) -> bool {
        self.punishments
            .get(&kind)
            .map_or(false, |records| records.contains_key(&steam_id))
    }

    /// Stores a punishment, replacing any existing one of the same kind
    ///
    /// A non-positive duration makes the punishment permanent.
    pub fn set_block(
        &mut self,
        steam_id: SteamId,
        kind: PunishmentKind,
        duration_minutes: i32,
        reason: &str,
    ) -> PunishmentRecord {
        let expires_at = if duration_minutes <= 0 {
            PERMANENT_EXPIRY
        } else {
            self.clock.now_unix() + i64::from(duration_minutes) * 60
        };

        let record = PunishmentRecord {
            kind,
            expires_at,
            reason: reason.to_string(),
        };

        let previous = self
            .punishments
            .entry(kind)
            .or_default()
            .insert(steam_id, record.clone());
        if previous.is_some() {
            info!("Replaced existing {} for {}", kind, steam_id);
        }

        record
    }

    /// Adds or removes a catalog weapon from the restricted set
    pub fn restrict_weapon(&mut self, name: &str, restricted: bool) -> Result<Weapon, CommandError> {
        let weapon = Weapon::find(name).ok_or_else(|| CommandError::UnknownWeapon(name.to_string()))?;

        if restricted {
            self.restricted_weapons.insert(weapon.clone());
        } else {
            self.restricted_weapons.remove(&weapon);
        }
        info!(
            "Weapon {} is now {}",
            weapon,
            if restricted { "restricted" } else { "allowed" }
        );

        Ok(weapon)
    }

    pub fn is_weapon_restricted(&self, weapon: &Weapon) -> bool {
        self.restricted_weapons.contains(weapon)
    }

    pub fn save_location(&mut self, steam_id: SteamId, position: Position) {
        self.saved_locations.insert(steam_id, position);
    }

    pub fn saved_location(&self, steam_id: SteamId) -> Option<Position> {
        self.saved_locations.get(&steam_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const START: i64 = 1_700_000_000;

    fn state_with_clock() -> (ModerationState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(START));
        (ModerationState::new(clock.clone()), clock)
    }

    #[test]
    fn test_length_formatting() {
        assert_eq!(length_from_seconds(0), "permanently");
        assert_eq!(length_from_seconds(-30), "permanently");
        assert_eq!(length_from_seconds(45), "45 seconds");
        assert_eq!(length_from_seconds(150), "2.5 minutes");
        assert_eq!(length_from_seconds(600), "10.0 minutes");
        assert_eq!(length_from_seconds(5400), "1.5 hours");
        assert_eq!(length_from_seconds(90000), "1.0 days");
    }

    #[test]
    fn test_permanent_ban() {
        let (mut state, clock) = state_with_clock();
        let player = SteamId(1);

        let record = state.set_block(player, PunishmentKind::Ban, 0, "cheating");
        assert!(record.is_permanent());

        let reason = state.is_blocked(player, PunishmentKind::Ban).unwrap();
        assert_eq!(reason, "cheating (length: permanently)");

        clock.advance(Duration::from_secs(60 * 60 * 24 * 365 * 10));
        let reason = state.is_blocked(player, PunishmentKind::Ban).unwrap();
        assert!(reason.contains("permanently"));
    }

    #[test]
    fn test_negative_duration_is_permanent() {
        let (mut state, _) = state_with_clock();
        let record = state.set_block(SteamId(1), PunishmentKind::Gag, -5, "x");
        assert_eq!(record.expires_at, PERMANENT_EXPIRY);
    }

    #[test]
    fn test_gag_expires_and_is_evicted() {
        let (mut state, clock) = state_with_clock();
        let player = SteamId(7);

        state.set_block(player, PunishmentKind::Gag, 10, "spam");
        let reason = state.is_blocked(player, PunishmentKind::Gag).unwrap();
        assert!(reason.contains("10.0 minutes"));
        assert!(reason.starts_with("spam"));

        clock.advance(Duration::from_secs(5 * 60));
        let reason = state.is_blocked(player, PunishmentKind::Gag).unwrap();
        assert!(reason.contains("5.0 minutes"));

        clock.advance(Duration::from_secs(5 * 60 + 1));
        assert!(state.has_record(player, PunishmentKind::Gag));
        assert_eq!(state.is_blocked(player, PunishmentKind::Gag), None);
        assert!(!state.has_record(player, PunishmentKind::Gag));
        assert_eq!(state.is_blocked(player, PunishmentKind::Gag), None);
    }

    #[test]
    fn test_still_blocked_at_exact_expiry() {
        let (mut state, clock) = state_with_clock();
        let player = SteamId(7);

        state.set_block(player, PunishmentKind::Gag, 1, "spam");
        clock.advance(Duration::from_secs(60));
        assert!(state.is_blocked(player, PunishmentKind::Gag).is_some());
        clock.advance(Duration::from_secs(1));
        assert!(state.is_blocked(player, PunishmentKind::Gag).is_none());
    }

    #[test]
    fn test_categories_are_independent() {
        let (mut state, _) = state_with_clock();
        let player = SteamId(3);

        state.set_block(player, PunishmentKind::Gag, 10, "spam");
        assert!(state.is_blocked(player, PunishmentKind::Ban).is_none());
        assert!(state.is_blocked(player, PunishmentKind::Mute).is_none());
        assert!(state.is_blocked(SteamId(4), PunishmentKind::Gag).is_none());
    }

    #[test]
    fn test_reissue_replaces_record() {
        let (mut state, _) = state_with_clock();
        let player = SteamId(9);

        state.set_block(player, PunishmentKind::Ban, 60, "first");
        state.set_block(player, PunishmentKind::Ban, 5, "second");

        let reason = state.is_blocked(player, PunishmentKind::Ban).unwrap();
        assert_eq!(reason, "second (length: 5.0 minutes)");
    }

    #[test]
    fn test_weapon_restriction_toggle() {
        let (mut state, _) = state_with_clock();

        let weapon = state.restrict_weapon("AK-15", true).unwrap();
        assert!(state.is_weapon_restricted(&weapon));
        assert!(!state.is_weapon_restricted(&Weapon::find("M4A1").unwrap()));

        state.restrict_weapon("ak-15", false).unwrap();
        assert!(!state.is_weapon_restricted(&weapon));
    }

    #[test]
    fn test_unknown_weapon() {
        let (mut state, _) = state_with_clock();
        let err = state.restrict_weapon("Railgun", true).unwrap_err();
        assert_eq!(err, CommandError::UnknownWeapon("Railgun".to_string()));
    }

    #[test]
    fn test_saved_location_overwrites() {
        let (mut state, _) = state_with_clock();
        let player = SteamId(5);

        assert!(state.saved_location(player).is_none());
        state.save_location(player, Position::new(1.0, 2.0, 3.0));
        state.save_location(player, Position::new(4.0, 5.0, 6.0));

        let saved = state.saved_location(player).unwrap();
        assert_approx_eq!(saved.x, 4.0);
        assert_approx_eq!(saved.y, 5.0);
        assert_approx_eq!(saved.z, 6.0);
    }
}
