//! Engine and server configuration.
//!
//! Every option has a default; `from_env` overrides them from `GEODUEL_*`
//! variables:
//!
//! | Variable | Field | Unit |
//! |---|---|---|
//! | `GEODUEL_BIND` | `ServerConfig::bind_addr` | `host:port` |
//! | `GEODUEL_TRIGGER_RADIUS_M` | `trigger_radius_m` | meters |
//! | `GEODUEL_DUEL_BUDGET_SECS` | `duel_budget` | seconds |
//! | `GEODUEL_BROADCAST_BUDGET_SECS` | `broadcast_budget` | seconds |
//! | `GEODUEL_JANITOR_INTERVAL_SECS` | `janitor_interval` | seconds, 0 disables |
//! | `GEODUEL_GRACE_MULTIPLIER` | `grace_multiplier` | factor |
//! | `GEODUEL_QUESTION_TIMEOUT_MS` | `question_fetch_timeout` | milliseconds |
//! | `GEODUEL_GM_TOKEN` | `game_master_token` | string |
//! | `GEODUEL_QUESTIONS_FILE` | `ServerConfig::questions_file` | path to a JSON array |
//! | `GEODUEL_QUESTION_FALLBACK` | `ServerConfig::question_fallback` | `1`/`true` |
//!
//! Unparseable values are logged and ignored.

use std::str::FromStr;
use std::time::Duration;

use geoduel_battle::BattleConfig;
use geoduel_janitor::SweepConfig;
use geoduel_presence::DEFAULT_TRIGGER_RADIUS_M;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Behavior of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum distance at which opposing players start a duel.
    pub trigger_radius_m: f64,
    pub duel_budget: Duration,
    pub broadcast_budget: Duration,
    /// Time between janitor sweeps. Zero disables the janitor.
    pub janitor_interval: Duration,
    /// The janitor expires sessions older than `budget × grace_multiplier`.
    pub grace_multiplier: f64,
    /// Upper bound on one question fetch.
    pub question_fetch_timeout: Duration,
    /// When set, game-master events must carry this token.
    pub game_master_token: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_radius_m: DEFAULT_TRIGGER_RADIUS_M,
            duel_budget: Duration::from_secs(30),
            broadcast_budget: Duration::from_secs(30),
            janitor_interval: Duration::from_secs(60),
            grace_multiplier: 2.0,
            question_fetch_timeout: Duration::from_secs(5),
            game_master_token: None,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup` (the environment, in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(radius) = parse_var::<f64>(&lookup, "GEODUEL_TRIGGER_RADIUS_M") {
            config.trigger_radius_m = radius;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "GEODUEL_DUEL_BUDGET_SECS") {
            config.duel_budget = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "GEODUEL_BROADCAST_BUDGET_SECS") {
            config.broadcast_budget = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "GEODUEL_JANITOR_INTERVAL_SECS") {
            config.janitor_interval = Duration::from_secs(secs);
        }
        if let Some(grace) = parse_var::<f64>(&lookup, "GEODUEL_GRACE_MULTIPLIER") {
            config.grace_multiplier = grace;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "GEODUEL_QUESTION_TIMEOUT_MS") {
            config.question_fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(token) = lookup("GEODUEL_GM_TOKEN").filter(|t| !t.is_empty()) {
            config.game_master_token = Some(token);
        }

        config
    }

    /// Longest accepted budget, janitor interval, or fetch timeout.
    pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

    /// Largest accepted grace multiplier.
    pub const MAX_GRACE_MULTIPLIER: f64 = 100.0;

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically when an engine is built. Rules:
    /// - a negative, NaN, or infinite radius becomes the default
    /// - a NaN or infinite grace multiplier becomes the default
    /// - a grace multiplier is clamped to `1..=MAX_GRACE_MULTIPLIER`
    /// - zero budgets and a zero fetch timeout become their defaults
    /// - durations above [`Self::MAX_DURATION`] are capped to it
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();

        if !self.trigger_radius_m.is_finite() || self.trigger_radius_m < 0.0 {
            warn!(
                radius = self.trigger_radius_m,
                "invalid trigger radius, using default"
            );
            self.trigger_radius_m = defaults.trigger_radius_m;
        }
        if !self.grace_multiplier.is_finite() {
            warn!(
                grace = self.grace_multiplier,
                "grace multiplier is not finite, using default"
            );
            self.grace_multiplier = defaults.grace_multiplier;
        } else if self.grace_multiplier < 1.0 {
            warn!(
                grace = self.grace_multiplier,
                "grace multiplier below 1, clamping"
            );
            self.grace_multiplier = 1.0;
        } else if self.grace_multiplier > Self::MAX_GRACE_MULTIPLIER {
            warn!(
                grace = self.grace_multiplier,
                max = Self::MAX_GRACE_MULTIPLIER,
                "grace multiplier too large, clamping"
            );
            self.grace_multiplier = Self::MAX_GRACE_MULTIPLIER;
        }
        if self.duel_budget.is_zero() {
            warn!("duel budget is zero, using default");
            self.duel_budget = defaults.duel_budget;
        }
        if self.broadcast_budget.is_zero() {
            warn!("broadcast budget is zero, using default");
            self.broadcast_budget = defaults.broadcast_budget;
        }
        if self.question_fetch_timeout.is_zero() {
            warn!("question fetch timeout is zero, using default");
            self.question_fetch_timeout = defaults.question_fetch_timeout;
        }
        for (name, value) in [
            ("duel_budget", &mut self.duel_budget),
            ("broadcast_budget", &mut self.broadcast_budget),
            ("janitor_interval", &mut self.janitor_interval),
            ("question_fetch_timeout", &mut self.question_fetch_timeout),
        ] {
            if *value > Self::MAX_DURATION {
                warn!(
                    setting = name,
                    secs = value.as_secs(),
                    "duration too large, capping"
                );
                *value = Self::MAX_DURATION;
            }
        }
        self
    }

    /// The part of the config the battle manager needs.
    pub fn battle_config(&self) -> BattleConfig {
        BattleConfig {
            duel_budget: self.duel_budget,
            broadcast_budget: self.broadcast_budget,
            grace_multiplier: self.grace_multiplier,
        }
    }

    /// The janitor's sweep schedule.
    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig::with_interval(self.janitor_interval)
    }
}

/// Where the server listens, where its questions come from, plus the
/// engine it runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// JSON array of questions. The built-in sample when `None`.
    pub questions_file: Option<String>,
    /// Serve the sample question when a fetch fails or hangs.
    pub question_fallback: bool,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            questions_file: None,
            question_fallback: false,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let bind_addr = lookup("GEODUEL_BIND")
            .filter(|addr| !addr.is_empty())
            .unwrap_or_else(|| Self::default().bind_addr);
        let questions_file = lookup("GEODUEL_QUESTIONS_FILE").filter(|path| !path.is_empty());
        let question_fallback = lookup("GEODUEL_QUESTION_FALLBACK")
            .is_some_and(|v| v.trim() == "1" || v.trim().eq_ignore_ascii_case("true"));
        Self {
            bind_addr,
            questions_file,
            question_fallback,
            engine: EngineConfig::from_lookup(lookup),
        }
    }

    /// Bound for a [`WithFallback`](geoduel_battle::WithFallback) wrapper:
    /// three quarters of the engine's fetch timeout.
    pub fn fallback_timeout(&self) -> Duration {
        self.engine.question_fetch_timeout.mul_f64(0.75)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "invalid value, using default");
            None
        }
    }
}
