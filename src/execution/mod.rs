// Order execution and the per-cycle pipeline
pub mod executor;
pub mod pipeline;

pub use executor::OrderExecutor;
pub use pipeline::{CycleOutcome, Evaluation, Pipeline};
