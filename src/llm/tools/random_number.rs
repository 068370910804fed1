//! Random number tool.

use crate::error::Result;
use crate::llm::tools::{LlmTool, ToolDescriptor};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Pick a random number between 1 and 100.
pub struct RandomNumberTool;

impl LlmTool for RandomNumberTool {
    fn run(&self, _args: &HashMap<String, Value>) -> Result<Value> {
        Ok(json!(fastrand::i64(1..=100)))
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::function(
            "pick_random_number",
            "Pick a random number between 1 and 100.",
            json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": false
            }),
        )
    }
}
