use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::collaborators::{RepositoryLink, RepositorySearch};
use crate::constants;
use crate::error::CollaboratorError;
use crate::llm_interaction::map_transport_error;

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repository>,
}

#[derive(Deserialize, Debug)]
struct Repository {
    full_name: String,
    html_url: String,
}

/// GitHub repository search, most starred first.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    token: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl GitHubClient {
    /// Works without a token, subject to GitHub's anonymous rate limit.
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(constants::USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            token: token.filter(|t| !t.trim().is_empty()),
            base_url: constants::GITHUB_API_URL.clone(),
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl RepositorySearch for GitHubClient {
    #[instrument(skip(self))]
    async fn search_repositories(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<RepositoryLink>, CollaboratorError> {
        let url = format!("{}/search/repositories", self.base_url.trim_end_matches('/'));
        let per_page = limit.to_string();
        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .query(&[
                ("q", topic),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "GitHub search failed");
            return Err(CollaboratorError::Status { status, body });
        }

        let search = response
            .json::<SearchResponse>()
            .await
            .map_err(|e| CollaboratorError::Response(format!("invalid GitHub JSON: {e}")))?;

        let repositories: Vec<RepositoryLink> = search
            .items
            .into_iter()
            .take(limit)
            .map(|repo| RepositoryLink {
                name: repo.full_name,
                url: repo.html_url,
            })
            .collect();

        debug!(count = repositories.len(), "GitHub search complete");
        Ok(repositories)
    }
}
