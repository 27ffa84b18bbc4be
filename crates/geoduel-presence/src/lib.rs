//! Presence and proximity for Geoduel.
//!
//! This crate knows who is connected and where they are:
//!
//! 1. **Distance** — great-circle distance between two reports ([`distance_m`])
//! 2. **Presence** — players, the lobby view, and spectators ([`PresenceRegistry`])
//! 3. **Proximity** — which opposing pairs are close enough to duel ([`ProximityScanner`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)  ← serializes registry access, turns scan results into duels
//!     ↕
//! Presence (this crate)  ← pure bookkeeping, no I/O, no locking
//!     ↕
//! Protocol (below)  ← PlayerId, Team, Location
//! ```

mod error;
mod geo;
mod proximity;
mod registry;

pub use error::PresenceError;
pub use geo::{EARTH_RADIUS_M, distance_m, haversine_m};
pub use proximity::{DEFAULT_TRIGGER_RADIUS_M, DuelPair, ProximityScanner};
pub use registry::{Departed, JoinOutcome, LobbyEntry, Player, PresenceRegistry, Spectator};
