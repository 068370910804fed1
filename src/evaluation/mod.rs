//! Offline evaluation runs.
//!
//! An evaluation maps a fallible application callable over a dataset of datapoints,
//! applies named evaluators to each produced output, and aggregates the judgments:
//! numeric evaluators report their mean, boolean evaluators their pass fraction.
//! A datapoint whose application call fails is recorded with its error and excluded
//! from the aggregates.

use crate::error::Result;
use crate::evaluators::{ArgsType, EvaluatorDescriptor, Judgment};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use tracing::{info, warn};

/// One evaluation case: named inputs plus an optional reference target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datapoint {
    pub inputs: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Datapoint {
    pub fn new(inputs: HashMap<String, String>) -> Self {
        Self {
            inputs,
            target: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// A named collection of datapoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub datapoints: Vec<Datapoint>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, datapoints: Vec<Datapoint>) -> Self {
        Self {
            name: name.into(),
            datapoints,
        }
    }

    /// Parse a dataset from JSON-lines text, one datapoint object per line.
    /// Blank lines are skipped.
    pub fn from_jsonl(name: impl Into<String>, jsonl: &str) -> Result<Self> {
        let datapoints = jsonl
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<std::result::Result<Vec<Datapoint>, _>>()?;

        Ok(Self {
            name: name.into(),
            datapoints,
        })
    }

    pub fn len(&self) -> usize {
        self.datapoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }
}

/// Outcome of one datapoint: the produced output (or the application error) plus the
/// judgments keyed by evaluator name.
#[derive(Debug, Clone, Serialize)]
pub struct DatapointResult {
    pub inputs: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub judgments: HashMap<String, Judgment>,
}

/// Results of one evaluation run.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub name: String,
    pub results: Vec<DatapointResult>,
    /// Mean judgment per evaluator, over the datapoints it judged. Boolean
    /// judgments count as 0/1, so the aggregate is the pass fraction.
    pub aggregates: HashMap<String, f64>,
}

impl EvaluationReport {
    pub fn aggregate(&self, evaluator_name: &str) -> Option<f64> {
        self.aggregates.get(evaluator_name).copied()
    }

    /// Datapoints whose application call failed.
    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }
}

/// Run `app` over every datapoint and judge the outputs with `evaluators`.
///
/// Evaluator and application failures are contained per datapoint: the run always
/// covers the whole dataset and returns a report.
pub async fn run_evaluation<F, Fut>(
    name: impl Into<String>,
    dataset: &Dataset,
    evaluators: &[&EvaluatorDescriptor],
    app: F,
) -> EvaluationReport
where
    F: Fn(Datapoint) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let name = name.into();
    let mut results = Vec::with_capacity(dataset.len());

    for datapoint in &dataset.datapoints {
        let outcome = app(datapoint.clone()).await;

        let mut result = DatapointResult {
            inputs: datapoint.inputs.clone(),
            target: datapoint.target.clone(),
            output: None,
            error: None,
            judgments: HashMap::new(),
        };

        match outcome {
            Ok(output) => {
                for evaluator in evaluators {
                    if evaluator.args_type == ArgsType::TargetRequired
                        && datapoint.target.is_none()
                    {
                        warn!(
                            evaluator = %evaluator.name,
                            "Skipping target-required evaluator: datapoint has no target"
                        );
                        continue;
                    }

                    match (evaluator.callable)(&output, datapoint.target.as_deref()) {
                        Ok(judgment) => {
                            result.judgments.insert(evaluator.name.clone(), judgment);
                        }
                        Err(err) => {
                            warn!(evaluator = %evaluator.name, error = %err, "Evaluator failed");
                        }
                    }
                }
                result.output = Some(output);
            }
            Err(err) => {
                warn!(error = %err, "Application call failed for datapoint");
                result.error = Some(err.to_string());
            }
        }

        results.push(result);
    }

    let mut aggregates = HashMap::new();
    for evaluator in evaluators {
        let judged: Vec<f64> = results
            .iter()
            .filter_map(|r| r.judgments.get(&evaluator.name))
            .map(Judgment::as_f64)
            .collect();
        if !judged.is_empty() {
            aggregates.insert(
                evaluator.name.clone(),
                judged.iter().sum::<f64>() / judged.len() as f64,
            );
        }
    }

    info!(
        name = %name,
        datapoints = results.len(),
        "Evaluation run finished"
    );

    EvaluationReport {
        name,
        results,
        aggregates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowtraceError;
    use crate::evaluators::EvaluatorRegistry;

    fn qa_dataset() -> Dataset {
        Dataset::new(
            "qa-test",
            vec![
                Datapoint::new(HashMap::from([(
                    "question".to_string(),
                    "What is 2 + 2?".to_string(),
                )]))
                .with_target("4"),
                Datapoint::new(HashMap::from([(
                    "question".to_string(),
                    "What is 3 + 3?".to_string(),
                )]))
                .with_target("6"),
            ],
        )
    }

    #[tokio::test]
    async fn test_run_evaluation_aggregates() {
        let registry = EvaluatorRegistry::with_builtins();
        let evaluators = [
            registry.get("exact_match").unwrap(),
            registry.get("levenshtein").unwrap(),
        ];
        let dataset = qa_dataset();

        // Answers the first question correctly and the second one wrong.
        let report = run_evaluation("initial experiment", &dataset, &evaluators, |dp| async move {
            let question = dp.inputs["question"].clone();
            if question.contains("2 + 2") {
                Ok("4\n---\nbecause".to_string())
            } else {
                Ok("7".to_string())
            }
        })
        .await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.aggregate("exact_match"), Some(0.5));
        // Distances: 0 for the correct answer, 1 for "7" vs "6".
        assert_eq!(report.aggregate("levenshtein"), Some(0.5));
        assert_eq!(report.error_count(), 0);
    }

    #[tokio::test]
    async fn test_application_errors_are_contained() {
        let registry = EvaluatorRegistry::with_builtins();
        let evaluators = [registry.get("exact_match").unwrap()];
        let dataset = qa_dataset();

        let report = run_evaluation("flaky app", &dataset, &evaluators, |dp| async move {
            if dp.inputs["question"].contains("2 + 2") {
                Ok("4".to_string())
            } else {
                Err(FlowtraceError::Gateway("rate limit exceeded".to_string()))
            }
        })
        .await;

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.error_count(), 1);
        assert!(report.results[1].error.as_deref().unwrap().contains("rate limit"));
        // Only the successful datapoint is aggregated.
        assert_eq!(report.aggregate("exact_match"), Some(1.0));
    }

    #[tokio::test]
    async fn test_target_required_evaluator_skipped_without_target() {
        let registry = EvaluatorRegistry::with_builtins();
        let evaluators = [registry.get("exact_match").unwrap()];
        let dataset = Dataset::new(
            "no-targets",
            vec![Datapoint::new(HashMap::from([(
                "question".to_string(),
                "anything".to_string(),
            )]))],
        );

        let report = run_evaluation("no targets", &dataset, &evaluators, |_| async {
            Ok("output".to_string())
        })
        .await;

        assert!(report.results[0].judgments.is_empty());
        assert_eq!(report.aggregate("exact_match"), None);
    }

    #[test]
    fn test_dataset_from_jsonl() {
        let jsonl = r#"{"inputs": {"question": "What is 2 + 2?"}, "target": "4"}

{"inputs": {"question": "Name a color."}}
"#;
        let dataset = Dataset::from_jsonl("parsed", jsonl).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.datapoints[0].target.as_deref(), Some("4"));
        assert!(dataset.datapoints[1].target.is_none());
    }

    #[test]
    fn test_dataset_from_invalid_jsonl_fails() {
        let err = Dataset::from_jsonl("bad", "not json").unwrap_err();
        assert!(matches!(err, FlowtraceError::Serialization(_)));
    }
}
