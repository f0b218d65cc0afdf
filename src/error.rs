use thiserror::Error;

/// Failures detected while scheduling a frame.
///
/// Every variant is recovered where it is detected: the affected instances
/// are skipped or fall back to neutral state, and the error itself is only
/// logged. Nothing here aborts a frame.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("hardware data unavailable for model '{model}'")]
    ResourceUnavailable { model: String },

    #[error("bone setup failed for instance {instance}")]
    BoneSetup { instance: usize },

    #[error("batched query returned {got} results, expected {expected}")]
    QueryShortfall { expected: usize, got: usize },
}
