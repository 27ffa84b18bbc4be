//! Proximity trigger evaluation.

use std::collections::HashSet;

use geoduel_protocol::PlayerId;

use crate::Player;
use crate::geo::haversine_m;

/// Default trigger radius in meters.
pub const DEFAULT_TRIGGER_RADIUS_M: f64 = 2.0;

/// Two opposing players close enough to duel.
#[derive(Debug, Clone, PartialEq)]
pub struct DuelPair {
    pub reporter: Player,
    pub opponent: Player,
    pub distance_m: f64,
}

/// Decides which opposing pairs a location report triggers.
///
/// The scanner is stateless. Engagement (being in an active or pending
/// session) is supplied per scan by the caller, which keeps this type
/// free of any session bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct ProximityScanner {
    trigger_radius_m: f64,
}

impl ProximityScanner {
    pub fn new(trigger_radius_m: f64) -> Self {
        Self { trigger_radius_m }
    }

    pub fn trigger_radius_m(&self) -> f64 {
        self.trigger_radius_m
    }

    /// Evaluates `reporter` against a snapshot of the opposing team.
    ///
    /// Opponents are visited in snapshot order. A pair qualifies when the
    /// distance is at most the trigger radius and neither side is engaged
    /// or already claimed by an earlier pair of this scan. Opponents
    /// without a reported location never qualify.
    ///
    /// Because the reporter is part of every candidate pair, the first
    /// qualifying pair claims it and a scan yields at most one pair.
    pub fn scan<F>(&self, reporter: &Player, opponents: &[Player], is_engaged: F) -> Vec<DuelPair>
    where
        F: Fn(&PlayerId) -> bool,
    {
        let Some(origin) = reporter.location else {
            return Vec::new();
        };
        if is_engaged(&reporter.player_id) {
            return Vec::new();
        }

        let mut claimed: HashSet<&PlayerId> = HashSet::new();
        let mut pairs = Vec::new();

        for opponent in opponents {
            if opponent.team == reporter.team || opponent.player_id == reporter.player_id {
                continue;
            }
            let Some(there) = opponent.location else {
                continue;
            };
            let distance = haversine_m(&origin, &there);
            if distance > self.trigger_radius_m {
                continue;
            }
            if claimed.contains(&reporter.player_id)
                || claimed.contains(&opponent.player_id)
                || is_engaged(&opponent.player_id)
            {
                continue;
            }

            tracing::debug!(
                reporter = %reporter.player_id,
                opponent = %opponent.player_id,
                distance_m = distance,
                "proximity trigger"
            );
            claimed.insert(&reporter.player_id);
            claimed.insert(&opponent.player_id);
            pairs.push(DuelPair {
                reporter: reporter.clone(),
                opponent: opponent.clone(),
                distance_m: distance,
            });
        }

        pairs
    }
}

impl Default for ProximityScanner {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_RADIUS_M)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoduel_protocol::{Location, Team};
    use geoduel_transport::ConnectionId;

    fn at(id: &str, team: Team, conn: u64, lat: f64, lon: f64) -> Player {
        Player {
            player_id: PlayerId::new(id),
            display_name: id.to_string(),
            team,
            location: Some(Location::new(lat, lon)),
            connection: ConnectionId::new(conn),
        }
    }

    fn nobody_engaged(_: &PlayerId) -> bool {
        false
    }

    #[test]
    fn test_scan_pair_about_one_meter_apart_triggers_single_duel() {
        let scanner = ProximityScanner::default();
        let p1 = at("p1", Team::A, 1, 0.0, 0.0);
        let p2 = at("p2", Team::B, 2, 0.0, 0.00001);

        let pairs = scanner.scan(&p1, &[p2.clone()], nobody_engaged);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].opponent.player_id, p2.player_id);
        assert!((pairs[0].distance_m - 1.11).abs() < 0.05);
    }

    #[test]
    fn test_scan_opponent_out_of_range_triggers_nothing() {
        let scanner = ProximityScanner::default();
        let p1 = at("p1", Team::A, 1, 0.0, 0.0);
        // ~11 m east.
        let p2 = at("p2", Team::B, 2, 0.0, 0.0001);

        assert!(scanner.scan(&p1, &[p2], nobody_engaged).is_empty());
    }

    #[test]
    fn test_scan_exactly_at_radius_triggers() {
        let p1 = at("p1", Team::A, 1, 0.0, 0.0);
        let p2 = at("p2", Team::B, 2, 0.0, 0.00001);
        let exact = haversine_m(&p1.location.unwrap(), &p2.location.unwrap());
        let scanner = ProximityScanner::new(exact);

        assert_eq!(scanner.scan(&p1, &[p2], nobody_engaged).len(), 1);
    }

    #[test]
    fn test_scan_multiple_qualifying_opponents_first_in_snapshot_order_wins() {
        let scanner = ProximityScanner::default();
        let p1 = at("p1", Team::A, 1, 0.0, 0.0);
        let near_a = at("b-first", Team::B, 2, 0.0, 0.00001);
        let near_b = at("b-second", Team::B, 3, 0.00001, 0.0);

        let pairs = scanner.scan(&p1, &[near_a, near_b], nobody_engaged);

        assert_eq!(pairs.len(), 1, "reporter may only be placed once per scan");
        assert_eq!(pairs[0].opponent.player_id, PlayerId::new("b-first"));
    }

    #[test]
    fn test_scan_engaged_opponent_is_skipped_for_next_candidate() {
        let scanner = ProximityScanner::default();
        let p1 = at("p1", Team::A, 1, 0.0, 0.0);
        let busy = at("busy", Team::B, 2, 0.0, 0.0);
        let free = at("free", Team::B, 3, 0.0, 0.00001);

        let pairs = scanner.scan(&p1, &[busy, free], |id| id.as_str() == "busy");

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].opponent.player_id, PlayerId::new("free"));
    }

    #[test]
    fn test_scan_engaged_reporter_triggers_nothing() {
        let scanner = ProximityScanner::default();
        let p1 = at("p1", Team::A, 1, 0.0, 0.0);
        let p2 = at("p2", Team::B, 2, 0.0, 0.0);

        assert!(scanner.scan(&p1, &[p2], |id| id.as_str() == "p1").is_empty());
    }

    #[test]
    fn test_scan_ignores_same_team_and_unlocated_players() {
        let scanner = ProximityScanner::default();
        let p1 = at("p1", Team::A, 1, 0.0, 0.0);
        let teammate = at("mate", Team::A, 2, 0.0, 0.0);
        let mut ghost = at("ghost", Team::B, 3, 0.0, 0.0);
        ghost.location = None;

        assert!(scanner.scan(&p1, &[teammate, ghost], nobody_engaged).is_empty());
    }

    #[test]
    fn test_scan_reporter_without_location_triggers_nothing() {
        let scanner = ProximityScanner::default();
        let mut p1 = at("p1", Team::A, 1, 0.0, 0.0);
        p1.location = None;
        let p2 = at("p2", Team::B, 2, 0.0, 0.0);

        assert!(scanner.scan(&p1, &[p2], nobody_engaged).is_empty());
    }
}
