//! # gauntlet core
//!
//! Domain types, traits, and error definitions for the gauntlet challenge
//! runner. This crate has no browser or HTTP dependencies; it defines the
//! model that every other crate implements against.
//!
//! ## Layout
//!
//! - [`environment`] — the page the agent drives, as a trait
//! - [`provider`] — the reasoning oracle, as a trait
//! - [`observation`] — per-cycle snapshots (`ObservedState`, `InteractiveElement`)
//! - [`action`] — the single decision produced per cycle
//! - [`session`] — run bookkeeping (`ChallengeRecord`, `RunSession`, `StallCounters`)

pub mod action;
pub mod environment;
pub mod error;
pub mod message;
pub mod observation;
pub mod provider;
pub mod session;
pub mod text;

// Re-export key types at crate root for ergonomics
pub use action::{Action, ActionKind};
pub use environment::{ElementQuery, Environment, TextMatch};
pub use error::{EnvironmentError, Error, ProviderError, Result};
pub use message::{ImageAttachment, Message, Role};
pub use observation::{InteractiveElement, ObservedState};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use session::{ChallengeOutcome, ChallengeRecord, RunSession, StallCounters};
