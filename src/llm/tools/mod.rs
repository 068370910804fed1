//! Tool functions callable by the model, plus their registry.

pub mod calculator;
pub mod random_number;
pub mod registry;
pub mod tool;

pub use calculator::CalculatorTool;
pub use random_number::RandomNumberTool;
pub use registry::ToolRegistry;
pub use tool::{FunctionDescriptor, LlmTool, ToolDescriptor};
