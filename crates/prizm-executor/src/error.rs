//! Executor boundary errors.

/// An executor blew up instead of returning a result.
///
/// Kept deliberately opaque: `message` is the one-line summary surfaced to
/// users, `detail` carries a stack trace or deeper diagnostic when the
/// executor has one.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ExecutorError {
  pub message: String,
  pub detail: Option<String>,
}

impl ExecutorError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      detail: None,
    }
  }

  pub fn with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      detail: Some(detail.into()),
    }
  }
}
