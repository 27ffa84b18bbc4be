//! # Geoduel
//!
//! Location-triggered multiplayer trivia battles.
//!
//! Players on two teams report their positions over WebSocket. When two
//! opposing players stand within the trigger radius, the engine opens a
//! duel: one question, first answer decides. A game master can also put
//! a question to everyone at once. Spectators watch every duel live.
//!
//! ```text
//! WebSocket ─→ handler ─→ Engine ─┬─→ PresenceRegistry + ProximityScanner
//!                ↑                ├─→ BattleManager (sessions, answer locks)
//!                │                └─→ Dispatcher ──→ per-connection outboxes
//!                └────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use geoduel::prelude::*;
//!
//! # async fn run() -> Result<(), GeoduelError> {
//! let server = GeoduelServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(StaticQuestionSource::sample())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod dispatcher;
mod engine;
mod error;
mod handler;
mod server;

pub use config::{EngineConfig, ServerConfig};
pub use dispatcher::{Dispatcher, Outbox, Role};
pub use engine::Engine;
pub use error::GeoduelError;
pub use server::{GeoduelServer, GeoduelServerBuilder};

/// Convenient imports for embedding or running a Geoduel server.
///
/// ```rust
/// use geoduel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Engine, EngineConfig, GeoduelError, GeoduelServer, GeoduelServerBuilder, Outbox,
        ServerConfig,
    };

    pub use geoduel_battle::{
        AnswerVerdict, BattleError, QuestionSource, StaticQuestionSource, WithFallback,
    };
    pub use geoduel_presence::PresenceError;
    pub use geoduel_protocol::{
        AnswerRecord, BattleMode, BattleOutcome, ClientEvent, Envelope, Location, PlayerId,
        Question, RejectReason, RosterEntry, ServerEvent, SessionId, SpectatorId, Team,
    };
    pub use geoduel_transport::ConnectionId;
}
