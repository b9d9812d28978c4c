use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// Fields that must be filled in before the configuration can run.
    #[error("configuration is incomplete, missing: {}", .0.join(", "))]
    ValidationGap(Vec<String>),
}

impl SubmissionError {
    pub fn missing(&self) -> &[String] {
        match self {
            SubmissionError::ValidationGap(fields) => fields,
        }
    }
}
