//! Usage and cost accounting for gauntlet oracle calls.
//!
//! Every decision request goes through a [`MeteredProvider`], which prices
//! the call from the built-in [`PricingTable`] and appends it to the run's
//! [`UsageLedger`]. The ledger's [`LlmStats`] summary lands in the run report.

pub mod ledger;
pub mod metered;
pub mod pricing;

pub use ledger::{CallRecord, LlmStats, Modality, ModelUsage, UsageLedger};
pub use metered::MeteredProvider;
pub use pricing::{ModelPricing, PricingTable};
