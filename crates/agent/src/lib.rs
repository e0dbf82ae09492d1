//! The gauntlet control core.
//!
//! One run follows a **sweep → observe → decide → act** cycle per
//! iteration:
//!
//! 1. **Sweep** overlays that would block interaction ([`ObstructionSweeper`])
//! 2. **Observe** the page and infer the challenge ordinal ([`StateObserver`])
//! 3. **Decide** on one action through the reasoning oracle, by text or by
//!    snapshot ([`DecisionEngine`])
//! 4. **Act** through per-kind fallback ladders ([`ActionExecutor`])
//! 5. **Escalate** when a challenge stalls, forcing the ordinal forward
//!
//! [`ProgressionController`] owns the loop, the deadline and the
//! [`RunSession`](gauntlet_core::RunSession); [`RunReport`] turns the
//! finished session into JSON and a terminal summary.

pub mod controller;
pub mod decision;
pub mod executor;
pub mod observer;
pub mod report;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use controller::{Pacing, Phase, ProgressionController};
pub use decision::{DecisionEngine, FailureContext, ParseError, degraded_action, parse_action};
pub use executor::ActionExecutor;
pub use observer::{Observation, StateObserver};
pub use report::{ChallengeSummary, ReportError, RunReport};
pub use sweeper::ObstructionSweeper;
