//! Error types shared by the session manager and the collaborator clients.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Which external collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Roadmap,
    Videos,
    Repositories,
    Completion,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Collaborator::Roadmap => "roadmap generator",
            Collaborator::Videos => "video search",
            Collaborator::Repositories => "repository search",
            Collaborator::Completion => "prompt completion",
        };
        f.write_str(name)
    }
}

/// A single failed call to an external API.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected response: {0}")]
    Response(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// One or more collaborator failures, collected so none are dropped when
/// calls run side by side.
#[derive(Debug)]
pub struct UpstreamError {
    failures: Vec<(Collaborator, CollaboratorError)>,
}

impl UpstreamError {
    pub fn new(collaborator: Collaborator, error: CollaboratorError) -> Self {
        Self {
            failures: vec![(collaborator, error)],
        }
    }

    pub fn from_failures(failures: Vec<(Collaborator, CollaboratorError)>) -> Self {
        debug_assert!(!failures.is_empty());
        Self { failures }
    }

    pub fn failures(&self) -> &[(Collaborator, CollaboratorError)] {
        &self.failures
    }

    pub fn is_timeout(&self) -> bool {
        self.failures
            .iter()
            .any(|(_, e)| matches!(e, CollaboratorError::Timeout(_)))
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (collaborator, error)) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{collaborator}: {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for UpstreamError {}

/// Errors returned by [`crate::manager::SessionManager`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("upstream failure: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("quiz format error: {0}")]
    QuizFormat(String),
}

impl SessionError {
    pub(crate) fn input(msg: impl Into<String>) -> Self {
        SessionError::InvalidInput(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        SessionError::InvalidState(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_lists_every_failure() {
        let err = UpstreamError::from_failures(vec![
            (
                Collaborator::Videos,
                CollaboratorError::NotConfigured("YOUTUBE_API_KEY"),
            ),
            (
                Collaborator::Repositories,
                CollaboratorError::Timeout(Duration::from_secs(3)),
            ),
        ]);

        let text = err.to_string();
        assert!(text.contains("video search: YOUTUBE_API_KEY is not configured"));
        assert!(text.contains("repository search: request timed out after 3s"));
        assert!(err.is_timeout());
        assert_eq!(err.failures().len(), 2);
    }
}
