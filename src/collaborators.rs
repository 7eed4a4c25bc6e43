//! Contracts for the external services the session manager depends on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryLink {
    pub name: String,
    pub url: String,
}

/// Produces a markdown weekly study plan for a topic.
#[async_trait]
pub trait RoadmapGenerator: Send + Sync {
    async fn generate_roadmap(&self, topic: &str) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search_videos(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<VideoLink>, CollaboratorError>;
}

/// Results come back already ranked (most starred first); callers keep that order.
#[async_trait]
pub trait RepositorySearch: Send + Sync {
    async fn search_repositories(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<RepositoryLink>, CollaboratorError>;
}

/// Free-form prompt in, model text out.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError>;
}
