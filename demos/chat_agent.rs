//! Interactive chat agent with hierarchical tracing
//!
//! This example runs a conversational agent with function calling. Every turn records
//! a model-call span, tool invocations become nested tool-call spans, and when you
//! exit the whole conversation trace is handed to the configured sink.
//!
//! # Running the example
//!
//! ```bash
//! OPENAI_API_KEY=... cargo run --example chat_agent
//! ```
//!
//! Set `FLOWTRACE_ENDPOINT` (and optionally `FLOWTRACE_API_KEY`) to deliver traces to
//! a remote service; without it, traces are collected in memory and summarized on exit.
//!
//! Type 'exit' to end the conversation.

use anyhow::Result;
use flowtrace::prelude::*;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

const SYSTEM_PROMPT_TEMPLATE: &str = "You are a helpful assistant knowledgeable on the \
    following topics: {{topics}}. When you reply you should use the following tone of \
    voice: {{tone}}";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let gateway = Arc::new(OpenAiGateway::new(OpenAiConfig::from_env()?)?);

    let memory_sink = Arc::new(MemorySink::default());
    let sink: Arc<dyn Sink> = match std::env::var("FLOWTRACE_ENDPOINT") {
        Ok(endpoint) => {
            let mut config = SinkConfig::new(endpoint);
            if let Ok(api_key) = std::env::var("FLOWTRACE_API_KEY") {
                config = config.with_api_key(api_key);
            }
            Arc::new(HttpSink::new(config)?)
        }
        Err(_) => memory_sink.clone() as Arc<dyn Sink>,
    };

    let tools = ToolRegistry::new()
        .with(Box::new(CalculatorTool))?
        .with(Box::new(RandomNumberTool))?;

    let correlator = Arc::new(Correlator::default());
    let agent = ChatAgent::new(
        std::env::var("MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
        gateway,
        tools,
        Arc::clone(&correlator),
        sink,
    )
    .with_completion(CompletionConfig {
        temperature: 0.7,
        max_tokens: 200,
        top_p: Some(1.0),
        stop: Some("\n\n\n".to_string()),
        presence_penalty: Some(0.5),
        frequency_penalty: Some(0.5),
        seed: Some(42),
    });

    let system_prompt = populate_template(
        SYSTEM_PROMPT_TEMPLATE,
        &HashMap::from([
            ("topics".to_string(), "math science".to_string()),
            ("tone".to_string(), "groovy 80s surfer dude".to_string()),
        ]),
    )?;

    let mut conversation = agent.start_conversation(&system_prompt)?;

    println!("Chat agent ready. Ask about math or science; type 'exit' to quit.");

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF: treat like an aborted conversation.
            let assembled = agent.abort_conversation(conversation).await?;
            println!("\nConversation aborted ({} spans recorded).", assembled.span_count());
            return Ok(());
        }
        let input = input.trim();

        if input == "exit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match agent.reply(&mut conversation, input).await {
            Ok(response) => println!("Agent: {}", response),
            Err(e) => eprintln!("Error: {}", e),
        }
    }

    let assembled = agent.end_conversation(conversation).await?;
    println!(
        "Conversation {} complete: {} spans recorded.",
        assembled.trace.id,
        assembled.span_count()
    );

    if memory_sink.trace_count() > 0 {
        println!("Delivered records (in memory): {}", memory_sink.len());
    }

    Ok(())
}
