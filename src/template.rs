//! Prompt template substitution.
//!
//! Templates use double-brace placeholders (`{{name}}`, whitespace inside the braces
//! tolerated). Substitution is strict: a placeholder with no corresponding key fails
//! with `MissingVariable`. Replacement is a single left-to-right scan, so substituted
//! values are never re-scanned and the order of placeholders cannot change the result.

use crate::error::{FlowtraceError, Result};
use crate::llm::models::{LlmMessage, MessageRole};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern")
    })
}

/// Replace every `{{name}}` placeholder in `template` with its value from `inputs`.
///
/// Fails with `MissingVariable` naming the first placeholder that has no mapping.
/// Replacement text containing brace markers is copied literally, never re-substituted.
pub fn populate_template(template: &str, inputs: &HashMap<String, String>) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut last_end = 0;

    for captures in placeholder_pattern().captures_iter(template) {
        let full = captures.get(0).expect("match group");
        let name = &captures[1];

        let value = inputs
            .get(name)
            .ok_or_else(|| FlowtraceError::MissingVariable(name.to_string()))?;

        result.push_str(&template[last_end..full.start()]);
        result.push_str(value);
        last_end = full.end();
    }
    result.push_str(&template[last_end..]);

    Ok(result)
}

/// One role-tagged message with placeholders still unsubstituted.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub role: MessageRole,
    pub content: String,
}

impl MessageTemplate {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Populate a whole message template list, producing ready-to-send messages.
pub fn populate_messages(
    templates: &[MessageTemplate],
    inputs: &HashMap<String, String>,
) -> Result<Vec<LlmMessage>> {
    templates
        .iter()
        .map(|t| {
            let content = populate_template(&t.content, inputs)?;
            Ok(LlmMessage {
                role: t.role,
                content: Some(content),
                tool_calls: None,
            })
        })
        .collect()
}
