//! String-distance evaluators and the evaluator registry.
//!
//! Evaluators compare a produced output against a target to produce a judgment,
//! either boolean (pass/fail) or numeric (a distance or score). The registry binds
//! each evaluator to a stable key plus an explicit calling convention so evaluation
//! runs can reference them by name.

pub mod exact_match;
pub mod levenshtein;
pub mod registry;

pub use exact_match::{exact_match, extract_answer};
pub use levenshtein::levenshtein_distance;
pub use registry::{
    ArgsType, EvaluatorDescriptor, EvaluatorFn, EvaluatorRegistry, Judgment, ReturnKind,
};
