//! Execution of governed trade decisions.
//!
//! - [`ExecutionSequencer`]: sells, cooldown, buys, persistence
//! - [`BatchPipeline`]: per-account serialization of the whole flow from
//!   broker truth to the journal

mod pipeline;
mod sequencer;
mod services;
mod settings;

pub use pipeline::{BatchPipeline, BatchReport, PipelineError, PipelineSettings};
pub use sequencer::{BatchPhase, ExecutionReport, ExecutionSequencer};
pub use services::Services;
pub use settings::{AccountPolicy, ExecutionSettings};
