//! Wire protocol for Geoduel.
//!
//! This crate defines the "language" clients and the engine speak:
//!
//! - **Types** ([`PlayerId`], [`Team`], [`Location`], [`Question`], ...) —
//!   value objects shared by every layer above.
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`Envelope`]) — what
//!   travels on the wire, and [`Audience`] — who an outbound event is for.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how envelopes become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<ClientEvent>) → Engine
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{
    AnswerRecord, Audience, BattleMode, BattleOutcome, BroadcastSummary, ClientEvent, Envelope,
    RejectReason, RosterEntry, ServerEvent, TeamTally,
};
pub use types::{
    Choice, Difficulty, Location, PlayerId, PublicQuestion, Question, SessionId, SpectatorId,
    Team, unix_millis,
};
