//! # antiping-moderation - Offence Scoring and Moderation Actions
//!
//! Decides when a chat participant is spamming and what to do about it.
//!
//! ## Decision path
//!
//! An inbound event is parsed into a [`RoomMessage`], scoped by the
//! [`EventFilter`], and mapped to an offence by the [`OffenceClassifier`].
//! The offence lands in the sender's [`OffenceLedger`], a bounded min-heap
//! keyed on expiration. Expired offences are swept, the remaining weight is
//! compared against the spam and ban limits, and the sender's
//! [`ModerationState`] is raised to match. Only the periodic sweep ever
//! lowers it again.
//!
//! ## Action path
//!
//! Escalations become [`ModerationAction`]s that the [`ActionDispatcher`]
//! performs on a background task through an [`ActionSink`]. Ban commands
//! are single-flight per identity via the [`ActionDeduplicator`].
//!
//! [`ModerationEngine`] wires both paths together.

#![forbid(unsafe_code)]

/// Outbound action model
pub mod action;

/// Message to offence mapping
pub mod classifier;

/// TOML configuration
pub mod config;

/// In-flight action deduplication
pub mod dedup;

/// Background action worker
pub mod dispatcher;

/// Event scoring and escalation
pub mod engine;

/// Error types
pub mod error;

/// Inbound event parsing
pub mod event;

/// Room and member filters
pub mod filter;

/// Mention counting in HTML bodies
pub mod mentions;

/// Offences, limits and the per-identity ledger
pub mod offence;

/// Per-identity state
pub mod offender;

/// Identity to offender map with garbage collection
pub mod registry;

/// Background task registry
pub mod tasks;

pub use action::{ActionKind, ModerationAction, OutboundMessage};
pub use classifier::{OffenceCategory, OffenceClassifier, OffenceSpec};
pub use config::Config;
pub use dedup::{ActionDeduplicator, InFlightToken};
pub use dispatcher::{
    ActionDispatcher, ActionHandle, ActionId, ActionResult, ActionSink, DispatchError,
    DispatcherConfig, SinkError,
};
pub use engine::{ModerationEngine, Verdict};
pub use error::{ModerationError, Result};
pub use event::{EventError, MessageKind, RoomMessage};
pub use filter::{EventFilter, PatternSet, Skip};
pub use offence::{Classification, Limits, Offence, OffenceLedger};
pub use offender::{ModerationState, Offender};
pub use registry::{OffenderRegistry, RecordOutcome, SweepReport};
pub use tasks::BackgroundTasks;
