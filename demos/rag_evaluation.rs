//! RAG pipeline with an offline evaluation run
//!
//! Populates a small in-memory knowledge base, answers a toy medical-exam dataset
//! through the retrieve-then-complete pipeline, and scores the answers with the
//! built-in exact-match and Levenshtein evaluators. Each question produces one trace
//! with a retrieval-call span and a model-call span.
//!
//! # Running the example
//!
//! ```bash
//! OPENAI_API_KEY=... cargo run --example rag_evaluation
//! ```

use anyhow::Result;
use flowtrace::prelude::*;
use flowtrace::trace::count_trace_children;
use std::sync::Arc;

const DATASET_JSONL: &str = r#"
{"inputs": {"question": "Which clotting factor is deficient in hemophilia A?"}, "target": "Factor VIII"}
{"inputs": {"question": "Which organelle produces most of the cell's ATP?"}, "target": "The mitochondria"}
{"inputs": {"question": "Which vitamin deficiency causes scurvy?"}, "target": "Vitamin C"}
"#;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let gateway = Arc::new(OpenAiGateway::new(OpenAiConfig::from_env()?)?);
    let sink = Arc::new(MemorySink::default());

    let store = Arc::new(InMemoryKnowledgeStore::with_documents(vec![
        Document::new(
            "hematology",
            "Hemophilia A is caused by a deficiency of clotting factor VIII, while \
             hemophilia B involves factor IX.",
        ),
        Document::new(
            "cell-biology",
            "The mitochondria carries out oxidative phosphorylation and produces most \
             of the cell's ATP.",
        ),
        Document::new(
            "nutrition",
            "Scurvy results from a prolonged deficiency of vitamin C, impairing \
             collagen synthesis.",
        ),
    ]));

    let pipeline = Arc::new(
        RagPipeline::new(
            std::env::var("MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            gateway,
            store,
            Arc::new(Correlator::default()),
            sink.clone(),
        )
        .with_n_results(1),
    );

    let dataset = Dataset::from_jsonl("MedQA test", DATASET_JSONL)?;
    let registry = EvaluatorRegistry::with_builtins();
    let evaluators = [
        registry.get("exact_match").expect("builtin"),
        registry.get("levenshtein").expect("builtin"),
    ];

    let report = {
        let pipeline = Arc::clone(&pipeline);
        run_evaluation("Initial experiments", &dataset, &evaluators, move |dp| {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.ask_question(&dp.inputs).await }
        })
        .await
    };

    println!("Evaluation: {}", report.name);
    for result in &report.results {
        let question = result
            .inputs
            .get("question")
            .cloned()
            .unwrap_or_default();
        match (&result.output, &result.error) {
            (Some(output), _) => {
                println!("  Q: {}", question);
                println!("     A: {}", output.lines().next().unwrap_or_default());
                for (name, judgment) in &result.judgments {
                    println!("     {}: {}", name, judgment);
                }
            }
            (None, Some(error)) => println!("  Q: {} failed: {}", question, error),
            (None, None) => {}
        }
    }

    println!("Aggregates:");
    let mut names: Vec<&String> = report.aggregates.keys().collect();
    names.sort();
    for name in names {
        println!("  {}: {:.3}", name, report.aggregates[name]);
    }

    let traced: usize = sink
        .records()
        .iter()
        .filter_map(|r| match r {
            SinkRecord::Trace(t) => Some(count_trace_children(t)),
            SinkRecord::Span(_) => None,
        })
        .sum();
    println!("Delivered {} traces holding {} spans.", sink.trace_count(), traced);

    Ok(())
}
