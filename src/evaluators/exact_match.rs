//! Exact-match comparison with answer extraction.

/// Extract the answer portion of a generated reply.
///
/// The reply format asks the model to lead with the answer and follow with an
/// explanation behind a `---` separator; extraction takes the first segment, trims
/// surrounding whitespace, and strips a leading code-fence line if the model wrapped
/// its answer in one.
pub fn extract_answer(generated: &str) -> String {
    let first_segment = generated.split("---").next().unwrap_or(generated);
    let trimmed = first_segment.trim();

    let without_fence = if trimmed.starts_with("```") {
        match trimmed.find('\n') {
            Some(newline) => &trimmed[newline + 1..],
            None => "",
        }
    } else {
        trimmed
    };

    without_fence
        .strip_suffix("```")
        .unwrap_or(without_fence)
        .trim()
        .to_string()
}

/// True iff the generated reply's extracted answer is identical to the target.
pub fn exact_match(generated: &str, target: &str) -> bool {
    extract_answer(generated) == target.trim()
}
