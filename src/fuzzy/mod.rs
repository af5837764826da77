//! Fuzzy Module
//!
//! Membership functions, the per-sensor-type fuzzy engine with its result
//! cache, and the linguistic descriptor.

mod cache;
mod descriptor;
mod engine;
pub mod membership;

pub use cache::{CacheKey, CacheStats, FuzzyCache};
pub use descriptor::{
    join_descriptions, LinguisticDescription, LinguisticDescriptor, RenderStyle, AMBIGUITY_THRESHOLD,
};
pub use engine::{
    FuzzificationResult, FuzzyEngine, FuzzyEngineConfig, LinguisticVariable, SensorTypeConfig,
    TermMembership,
};
pub use membership::{MembershipFunction, MembershipSpec};
