//! Logging setup and diagnostics.

mod diagnostics;
mod logging;

pub use diagnostics::{batch_summary, ledger_summary};
pub use logging::setup_logging;
