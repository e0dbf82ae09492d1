//! Chromium-backed [`Environment`](gauntlet_core::Environment) for gauntlet.
//!
//! Launches a Chromium instance over the DevTools protocol and answers the
//! agent's introspection and interaction calls with in-page scripts.
//! Selectors accept plain CSS plus the `tag:has-text("…")` and `text=…`
//! forms the agent's selector hints use.

pub mod chromium;
pub mod error;
pub mod keys;
pub mod scripts;

pub use chromium::ChromiumEnvironment;
pub use error::BrowserError;
