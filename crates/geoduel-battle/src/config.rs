//! Battle configuration and state machine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BattleConfig
// ---------------------------------------------------------------------------

/// Time budgets and expiry tolerance for battle sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleConfig {
    /// How long a duel waits for its first answer.
    pub duel_budget: Duration,

    /// How long a broadcast collects answers.
    pub broadcast_budget: Duration,

    /// A session is overdue for the janitor once its age exceeds
    /// `budget × grace_multiplier`. Never below 1.
    pub grace_multiplier: f64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            duel_budget: Duration::from_secs(30),
            broadcast_budget: Duration::from_secs(30),
            grace_multiplier: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The lifecycle state of a battle session.
///
/// ```text
///          ┌──→ Resolved
/// Active ──┼──→ Expired
///          └──→ Cancelled
/// ```
///
/// - **Active**: the question is out; answers are admitted.
/// - **Resolved**: a duel's first answer decided it, or a game master
///   ended a broadcast.
/// - **Expired**: the time budget ran out.
/// - **Cancelled**: a duellist left, or the session was cancelled
///   explicitly.
///
/// The three terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Active,
    Resolved,
    Expired,
    Cancelled,
}

impl SessionState {
    /// Returns `true` if the session still admits answers.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns `true` for `Resolved`, `Expired`, and `Cancelled`.
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.is_active() && target.is_terminal()
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Resolved => write!(f, "Resolved"),
            Self::Expired => write!(f, "Expired"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}
