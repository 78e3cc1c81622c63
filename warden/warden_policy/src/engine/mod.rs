//! Policy evaluation engine.
//!
//! This module provides service lookup and service access evaluation.

pub mod evaluator;
pub mod lookup;

pub use evaluator::{AccessRequest, DenyReason, Evaluation, EvaluationResult, ServiceEvaluator};
pub use lookup::ServiceLookup;
