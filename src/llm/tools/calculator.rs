//! Arithmetic tool over two numbers.

use crate::error::{FlowtraceError, Result};
use crate::llm::tools::{LlmTool, ToolDescriptor};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Deserialize, JsonSchema)]
struct CalculatorArgs {
    /// One of "add", "subtract", "multiply", "divide".
    operation: String,
    num1: i64,
    num2: i64,
}

/// Do arithmetic operations on two numbers.
///
/// Division produces a floating-point result; dividing by zero and unrecognized
/// operations are tool errors, reported to the caller rather than panicking.
pub struct CalculatorTool;

impl LlmTool for CalculatorTool {
    fn run(&self, args: &HashMap<String, Value>) -> Result<Value> {
        let args: CalculatorArgs =
            serde_json::from_value(Value::Object(args.clone().into_iter().collect()))
                .map_err(|e| FlowtraceError::ToolError(format!("invalid arguments: {}", e)))?;

        match args.operation.as_str() {
            "add" => Ok(json!(args.num1 + args.num2)),
            "subtract" => Ok(json!(args.num1 - args.num2)),
            "multiply" => Ok(json!(args.num1 * args.num2)),
            "divide" => {
                if args.num2 == 0 {
                    return Err(FlowtraceError::ToolError("division by zero".to_string()));
                }
                Ok(json!(args.num1 as f64 / args.num2 as f64))
            }
            other => Err(FlowtraceError::ToolError(format!(
                "unrecognized operation: {}",
                other
            ))),
        }
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::function(
            "calculator",
            "Do arithmetic operations on two numbers.",
            serde_json::to_value(schemars::schema_for!(CalculatorArgs)).unwrap_or(Value::Null),
        )
    }
}
