//! Concrete model-call providers.

pub mod openai;

pub use openai::{OpenAiConfig, OpenAiGateway};
