//! Registry of evaluator functions.
//!
//! Evaluators are registered once, at process-wide initialization, under a stable
//! string key with an explicit descriptor of their calling convention. The registry is
//! append-only: duplicate registration is an error and nothing is removed at runtime.

use crate::error::{FlowtraceError, Result};
use crate::evaluators::exact_match::{exact_match, extract_answer};
use crate::evaluators::levenshtein::levenshtein_distance;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Whether an evaluator needs a reference target to judge against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgsType {
    TargetRequired,
    TargetFree,
}

/// The shape of judgment an evaluator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    Boolean,
    Number,
}

/// A single evaluator verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Judgment {
    Boolean(bool),
    Number(f64),
}

impl Judgment {
    /// Numeric view used for aggregation: booleans count as 0.0 / 1.0.
    pub fn as_f64(&self) -> f64 {
        match self {
            Judgment::Boolean(true) => 1.0,
            Judgment::Boolean(false) => 0.0,
            Judgment::Number(n) => *n,
        }
    }
}

impl fmt::Display for Judgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Judgment::Boolean(b) => write!(f, "{}", b),
            Judgment::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Evaluator callable: judges a generated output, optionally against a target.
pub type EvaluatorFn = Arc<dyn Fn(&str, Option<&str>) -> Result<Judgment> + Send + Sync>;

/// Descriptor binding a stable key to an evaluator callable and its calling convention.
#[derive(Clone)]
pub struct EvaluatorDescriptor {
    pub name: String,
    pub args_type: ArgsType,
    pub return_kind: ReturnKind,
    pub callable: EvaluatorFn,
}

impl fmt::Debug for EvaluatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluatorDescriptor")
            .field("name", &self.name)
            .field("args_type", &self.args_type)
            .field("return_kind", &self.return_kind)
            .finish()
    }
}

/// Append-only registry of evaluators keyed by name.
#[derive(Default)]
pub struct EvaluatorRegistry {
    entries: Vec<EvaluatorDescriptor>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in string comparators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry
            .register(EvaluatorDescriptor {
                name: "exact_match".to_string(),
                args_type: ArgsType::TargetRequired,
                return_kind: ReturnKind::Boolean,
                callable: Arc::new(|output, target| {
                    let target = target.ok_or_else(|| {
                        FlowtraceError::Config("exact_match requires a target".to_string())
                    })?;
                    Ok(Judgment::Boolean(exact_match(output, target)))
                }),
            })
            .expect("fresh registry accepts exact_match");

        registry
            .register(EvaluatorDescriptor {
                name: "levenshtein".to_string(),
                args_type: ArgsType::TargetRequired,
                return_kind: ReturnKind::Number,
                callable: Arc::new(|output, target| {
                    let target = target.ok_or_else(|| {
                        FlowtraceError::Config("levenshtein requires a target".to_string())
                    })?;
                    let distance = levenshtein_distance(&extract_answer(output), target.trim());
                    Ok(Judgment::Number(distance as f64))
                }),
            })
            .expect("fresh registry accepts levenshtein");

        registry
    }

    /// Register one evaluator. Fails if the name is already taken.
    pub fn register(&mut self, descriptor: EvaluatorDescriptor) -> Result<()> {
        if self.get(&descriptor.name).is_some() {
            return Err(FlowtraceError::Config(format!(
                "evaluator '{}' is already registered",
                descriptor.name
            )));
        }
        self.entries.push(descriptor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&EvaluatorDescriptor> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
