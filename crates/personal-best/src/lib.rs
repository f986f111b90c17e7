//! Personal-best decisions for completed laps and the per-listener pipeline
//! that feeds them.

mod evaluator;
mod pipeline;

pub use evaluator::{BestTimeEvaluator, Decision, EvaluatorConfig, StoreFailure};
pub use pipeline::{LapPipeline, PipelineConfig, PipelineStats};
