//! Element resolution & disambiguation
//!
//! This crate turns loose element descriptions into concrete page elements:
//! - selector models compiled to XPath (`builder`)
//! - batch distillation of every candidate (`distiller`)
//! - rule-based scoring with a semantic-action guard (`scorer`)
//! - a tiered resolver with an optional external arbiter (`resolver`, `arbiter`)

pub mod arbiter;
pub mod builder;
pub mod distiller;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod resolver;
pub mod scorer;

pub use arbiter::{Arbiter, NoopArbiter};
pub use builder::compile;
pub use distiller::{distill, CandidateSummary};
pub use errors::LocatorError;
pub use model::{
    AttributeSet, AttributeValue, Position, Selector, SelectorContext, SelectorInput,
    SelectorModel, SelectorOptions,
};
pub use resolver::{
    planned_attempts, DefaultElementResolver, ElementResolver, ResolutionResult, ResolverConfig,
};
pub use scorer::{score, ScoreBreakdown, ScoreOutcome};
