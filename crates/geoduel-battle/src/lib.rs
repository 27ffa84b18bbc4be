//! Battle session lifecycle for Geoduel.
//!
//! A battle is one trivia question put to either two duellists (triggered
//! by proximity) or every connected player (triggered by a game master).
//!
//! # Key types
//!
//! - [`BattleManager`] — creates, arbitrates, expires, and cancels sessions
//! - [`BattleSession`] — one question, its participants, and its answers
//! - [`SessionState`] — lifecycle state machine
//! - [`AnswerLocks`] — the per-(session, participant) admission guard
//! - [`QuestionSource`] — where questions come from
//! - [`BattleConfig`] — time budgets and the expiry grace multiplier

mod arbitration;
mod config;
mod error;
mod manager;
mod question;
mod session;

pub use arbitration::{AnswerLock, AnswerLocks, AnswerVerdict};
pub use config::{BattleConfig, SessionState};
pub use error::BattleError;
pub use manager::{BattleManager, PairReservation};
pub use question::{QuestionSource, StaticQuestionSource, WithFallback};
pub use session::{BattleSession, ClosedSession, Ending, Participant, Participants};
