//! Registry of tool functions available to an agent.
//!
//! Tools are registered under the stable name their descriptor declares, at
//! construction time, with an append-only lifecycle: duplicate registration is an
//! error and nothing is removed at runtime. Lookup order is registration order.

use crate::error::{FlowtraceError, Result};
use crate::llm::tools::{LlmTool, ToolDescriptor};

/// Append-only collection of tools, keyed by descriptor name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn LlmTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one tool under its declared name. Fails if the name is taken.
    pub fn register(&mut self, tool: Box<dyn LlmTool>) -> Result<()> {
        let name = tool.descriptor().function.name;
        if self.get(&name).is_some() {
            return Err(FlowtraceError::Config(format!(
                "tool '{}' is already registered",
                name
            )));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Builder-style registration for construction-time chains.
    pub fn with(mut self, tool: Box<dyn LlmTool>) -> Result<Self> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&dyn LlmTool> {
        self.tools
            .iter()
            .find(|t| t.matches(name))
            .map(|t| t.as_ref())
    }

    /// Descriptors of all registered tools, in registration order, ready to hand to
    /// a model-call provider.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
