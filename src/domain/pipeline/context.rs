//! Running context threaded through the steps of one pipeline run.

/// Accumulated step output for a single run.
///
/// Starts with a header naming the domain and grows by one line per
/// completed analysis step. It is never trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisContext {
    text: String,
}

impl AnalysisContext {
    /// Creates the context header for `domain`.
    pub fn new(domain: &str) -> Self {
        Self {
            text: format!("Analyzing {}:\n", domain),
        }
    }

    /// Appends a step's raw response on a new line.
    pub fn append(&mut self, response: &str) {
        self.text.push('\n');
        self.text.push_str(response);
    }

    /// Builds the full prompt for a rendered step.
    pub fn prompt_for(&self, rendered_step: &str) -> String {
        format!("{}\n\n{}", self.text, rendered_step)
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}
