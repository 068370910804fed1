//! Retrieval-augmented question answering pipeline.
//!
//! One [`RagPipeline::ask_question`] call produces one trace: a `retrieval-call` span
//! for the knowledge-store lookup followed by a `model-call` span for the completion,
//! with the populated prompt template in between. The finished trace is handed to the
//! sink on both the success and the failure path.

use crate::error::{FlowtraceError, Result};
use crate::llm::gateway::{CompletionConfig, LlmGateway};
use crate::llm::models::ModelResult;
use crate::retrieval::KnowledgeStore;
use crate::sink::{deliver_logged, DeliveryPolicy, Sink, SinkRecord};
use crate::template::{populate_messages, MessageTemplate};
use crate::trace::{Correlator, ObservationStatus, SpanKind, TraceHandle};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Default question-answering template. Expects `question` and `retrieved_data`
/// inputs, and instructs the model to lead with the bare answer so the `---`
/// separator convention of the exact-match evaluator applies.
pub fn qa_template() -> Vec<MessageTemplate> {
    vec![MessageTemplate::system(
        "Answer the question provided by the user factually.\n\
         \n\
         Question: {{question}}\n\
         ---\n\
         Here is some retrieved information that might be helpful.\n\
         Retrieved data:\n\
         {{retrieved_data}}\n\
         ---\n\
         Give your answer in 2 sections using the following format. Do not include the \
         brackets. Do include the \"---\" separator.\n\
         <answer>\n\
         ---\n\
         <clear explanation of why the answer is correct>",
    )]
}

/// Simple RAG pipeline: retrieve context, populate the prompt, call the model.
pub struct RagPipeline {
    model: String,
    gateway: Arc<dyn LlmGateway>,
    store: Arc<dyn KnowledgeStore>,
    correlator: Arc<Correlator>,
    sink: Arc<dyn Sink>,
    template: Vec<MessageTemplate>,
    completion: CompletionConfig,
    delivery: DeliveryPolicy,
    n_results: usize,
}

impl RagPipeline {
    pub fn new(
        model: impl Into<String>,
        gateway: Arc<dyn LlmGateway>,
        store: Arc<dyn KnowledgeStore>,
        correlator: Arc<Correlator>,
        sink: Arc<dyn Sink>,
    ) -> Self {
        Self {
            model: model.into(),
            gateway,
            store,
            correlator,
            sink,
            template: qa_template(),
            completion: CompletionConfig::default(),
            delivery: DeliveryPolicy::default(),
            n_results: 1,
        }
    }

    pub fn with_template(mut self, template: Vec<MessageTemplate>) -> Self {
        self.template = template;
        self
    }

    pub fn with_completion(mut self, completion: CompletionConfig) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryPolicy) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_n_results(mut self, n_results: usize) -> Self {
        self.n_results = n_results;
        self
    }

    /// Ask a question and get an answer using the retrieve-then-complete pipeline.
    ///
    /// `inputs` must cover every placeholder of the template except
    /// `retrieved_data`, which this method fills in; `question` doubles as the
    /// retrieval query.
    pub async fn ask_question(&self, inputs: &HashMap<String, String>) -> Result<String> {
        let trace = self.correlator.open_trace()?;

        match self.run(&trace, inputs).await {
            Ok(answer) => {
                let assembled = self.correlator.close_trace(
                    &trace,
                    json!(answer),
                    ObservationStatus::Complete,
                )?;
                deliver_logged(
                    self.sink.as_ref(),
                    &SinkRecord::from(assembled),
                    &self.delivery,
                )
                .await;
                Ok(answer)
            }
            Err(err) => {
                let closed = self.correlator.close_trace(
                    &trace,
                    json!({ "error": err.to_string() }),
                    ObservationStatus::Errored,
                );
                let assembled = match closed {
                    Ok(assembled) => Ok(assembled),
                    // A span was left open by the failure; force-close the tree.
                    Err(_) => self.correlator.cancel_trace(&trace),
                };
                if let Ok(assembled) = assembled {
                    deliver_logged(
                        self.sink.as_ref(),
                        &SinkRecord::from(assembled),
                        &self.delivery,
                    )
                    .await;
                }
                Err(err)
            }
        }
    }

    async fn run(&self, trace: &TraceHandle, inputs: &HashMap<String, String>) -> Result<String> {
        let question = inputs
            .get("question")
            .ok_or_else(|| FlowtraceError::MissingVariable("question".to_string()))?;

        let retrieved_data = self.retrieve(trace, question).await?;

        let mut full_inputs = inputs.clone();
        full_inputs.insert("retrieved_data".to_string(), retrieved_data);
        let messages = populate_messages(&self.template, &full_inputs)?;

        let span = self.correlator.open_span(
            trace,
            SpanKind::ModelCall,
            json!({
                "model": self.model,
                "messages": serde_json::to_value(&messages)?,
            }),
        )?;

        let outcome = self
            .gateway
            .chat(&self.model, &messages, &[], &self.completion)
            .await;

        match outcome {
            Ok(ModelResult::TextReply { content }) => {
                self.correlator.close_span(
                    &span,
                    json!(content),
                    ObservationStatus::Complete,
                )?;
                Ok(content)
            }
            Ok(ModelResult::ToolInvocation { call }) => {
                let err = FlowtraceError::Gateway(format!(
                    "model requested tool '{}' in a plain completion",
                    call.name
                ));
                self.correlator.close_span(
                    &span,
                    json!({ "error": err.to_string() }),
                    ObservationStatus::Errored,
                )?;
                Err(err)
            }
            Err(err) => {
                self.correlator.close_span(
                    &span,
                    json!({ "error": err.to_string() }),
                    ObservationStatus::Errored,
                )?;
                Err(err)
            }
        }
    }

    async fn retrieve(&self, trace: &TraceHandle, question: &str) -> Result<String> {
        let span = self.correlator.open_span(
            trace,
            SpanKind::RetrievalCall,
            json!({ "query": question, "n_results": self.n_results }),
        )?;

        match self.store.retrieve(question, self.n_results).await {
            Ok(documents) => {
                info!(count = documents.len(), "Retrieved documents");
                self.correlator.close_span(
                    &span,
                    serde_json::to_value(&documents)?,
                    ObservationStatus::Complete,
                )?;
                Ok(documents
                    .iter()
                    .map(|d| d.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n"))
            }
            Err(err) => {
                self.correlator.close_span(
                    &span,
                    json!({ "error": err.to_string() }),
                    ObservationStatus::Errored,
                )?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::models::LlmMessage;
    use crate::llm::tools::ToolDescriptor;
    use crate::retrieval::{Document, InMemoryKnowledgeStore};
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingGateway {
        reply: String,
        seen_messages: Mutex<Vec<LlmMessage>>,
    }

    impl RecordingGateway {
        fn new(reply: impl Into<String>) -> Self {
            Self {
                reply: reply.into(),
                seen_messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmGateway for RecordingGateway {
        async fn chat(
            &self,
            _model: &str,
            messages: &[LlmMessage],
            _tools: &[ToolDescriptor],
            _config: &CompletionConfig,
        ) -> Result<ModelResult> {
            *self.seen_messages.lock().unwrap() = messages.to_vec();
            Ok(ModelResult::text(&self.reply))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl KnowledgeStore for FailingStore {
        async fn retrieve(&self, _query: &str, _n_results: usize) -> Result<Vec<Document>> {
            Err(FlowtraceError::Gateway("vector store offline".to_string()))
        }
    }

    fn pipeline_with(
        gateway: Arc<RecordingGateway>,
        store: Arc<dyn KnowledgeStore>,
        sink: Arc<MemorySink>,
    ) -> RagPipeline {
        RagPipeline::new(
            "test-model",
            gateway,
            store,
            Arc::new(Correlator::default()),
            sink,
        )
        .with_delivery(DeliveryPolicy {
            deadline: std::time::Duration::from_millis(100),
            max_attempts: 1,
            initial_backoff: std::time::Duration::from_millis(1),
        })
    }

    fn question_inputs(question: &str) -> HashMap<String, String> {
        HashMap::from([("question".to_string(), question.to_string())])
    }

    #[tokio::test]
    async fn test_ask_question_traces_retrieval_and_model_call() {
        let gateway = Arc::new(RecordingGateway::new("42\n---\nbecause"));
        let store = Arc::new(InMemoryKnowledgeStore::with_documents(vec![Document::new(
            "doc-1",
            "The answer to everything is 42.",
        )]));
        let sink = Arc::new(MemorySink::default());
        let pipeline = pipeline_with(gateway.clone(), store, sink.clone());

        let answer = pipeline
            .ask_question(&question_inputs("What is the answer to everything?"))
            .await
            .unwrap();
        assert_eq!(answer, "42\n---\nbecause");

        // The retrieved document reached the prompt.
        let seen = gateway.seen_messages.lock().unwrap();
        assert!(seen[0]
            .content
            .as_deref()
            .unwrap()
            .contains("The answer to everything is 42."));

        // The delivered trace holds retrieval + model spans in open order.
        assert_eq!(sink.trace_count(), 1);
        match &sink.records()[0] {
            SinkRecord::Trace(assembled) => {
                assert_eq!(assembled.span_count(), 2);
                let kinds: Vec<_> = assembled
                    .spans_in_open_order()
                    .iter()
                    .map(|s| s.kind.clone())
                    .collect();
                assert_eq!(kinds, vec![SpanKind::RetrievalCall, SpanKind::ModelCall]);
                assert_eq!(assembled.trace.status, ObservationStatus::Complete);
            }
            SinkRecord::Span(_) => panic!("Expected a trace record"),
        }
    }

    #[tokio::test]
    async fn test_retrieval_failure_delivers_errored_trace() {
        let gateway = Arc::new(RecordingGateway::new("unused"));
        let sink = Arc::new(MemorySink::default());
        let pipeline = pipeline_with(gateway, Arc::new(FailingStore), sink.clone());

        let err = pipeline
            .ask_question(&question_inputs("anything"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowtraceError::Gateway(_)));

        assert_eq!(sink.trace_count(), 1);
        match &sink.records()[0] {
            SinkRecord::Trace(assembled) => {
                assert_eq!(assembled.trace.status, ObservationStatus::Errored);
                assert_eq!(
                    assembled.trace_children[0].span.status,
                    ObservationStatus::Errored
                );
            }
            SinkRecord::Span(_) => panic!("Expected a trace record"),
        }
    }

    #[tokio::test]
    async fn test_missing_question_input_fails() {
        let gateway = Arc::new(RecordingGateway::new("unused"));
        let sink = Arc::new(MemorySink::default());
        let pipeline = pipeline_with(
            gateway,
            Arc::new(InMemoryKnowledgeStore::new()),
            sink.clone(),
        );

        let err = pipeline.ask_question(&HashMap::new()).await.unwrap_err();
        match err {
            FlowtraceError::MissingVariable(name) => assert_eq!(name, "question"),
            other => panic!("Expected MissingVariable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_custom_template_extra_inputs() {
        let gateway = Arc::new(RecordingGateway::new("B\n---\nexplanation"));
        let store = Arc::new(InMemoryKnowledgeStore::with_documents(vec![Document::new(
            "doc-1",
            "Carriers inherit one affected X chromosome.",
        )]));
        let sink = Arc::new(MemorySink::default());
        let pipeline = pipeline_with(gateway.clone(), store, sink).with_template(vec![
            MessageTemplate::system(
                "Question: {{question}}\nOptions:\n- {{option_A}}\n- {{option_B}}\n\
                 Retrieved data:\n{{retrieved_data}}",
            ),
        ]);

        let mut inputs = question_inputs("What is the carrier probability?");
        inputs.insert("option_A".to_string(), "25%".to_string());
        inputs.insert("option_B".to_string(), "50%".to_string());

        let answer = pipeline.ask_question(&inputs).await.unwrap();
        assert_eq!(answer, "B\n---\nexplanation");

        let seen = gateway.seen_messages.lock().unwrap();
        let prompt = seen[0].content.as_deref().unwrap();
        assert!(prompt.contains("- 25%"));
        assert!(prompt.contains("- 50%"));
        assert!(prompt.contains("Carriers inherit"));
    }
}
