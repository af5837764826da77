//! Orchestrator Module
//!
//! Sensor state ingestion and the per-tick rule processing pipeline.

mod pipeline;
mod state;

pub use pipeline::{
    PipelineResult, PipelineSettings, PipelineStats, RuleEvaluation, RuleProcessingPipeline, UNAVAILABLE_REASON,
};
pub use state::{SensorReading, SensorStateCache};
