use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, instrument};

use crate::collaborators::{VideoLink, VideoSearch};
use crate::constants;
use crate::error::CollaboratorError;
use crate::llm_interaction::map_transport_error;

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize, Debug)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Snippet {
    title: String,
}

/// YouTube Data API v3 video search.
#[derive(Clone)]
pub struct YouTubeClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl YouTubeClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(constants::USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: constants::YOUTUBE_API_URL.clone(),
            timeout,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl VideoSearch for YouTubeClient {
    #[instrument(skip(self))]
    async fn search_videos(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<VideoLink>, CollaboratorError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(CollaboratorError::NotConfigured("YOUTUBE_API_KEY"))?;

        let url = format!("{}/search", self.base_url.trim_end_matches('/'));
        let max_results = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("q", topic),
                ("maxResults", max_results.as_str()),
                ("key", api_key),
            ])
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "YouTube search failed");
            return Err(CollaboratorError::Status { status, body });
        }

        let search = response
            .json::<SearchResponse>()
            .await
            .map_err(|e| CollaboratorError::Response(format!("invalid YouTube JSON: {e}")))?;

        let videos: Vec<VideoLink> = search
            .items
            .into_iter()
            .filter_map(|item| {
                // Channel or playlist hits carry no videoId.
                let video_id = item.id.video_id?;
                Some(VideoLink {
                    title: item.snippet.title,
                    url: format!("{}{}", constants::YOUTUBE_WATCH_URL, video_id),
                })
            })
            .take(limit)
            .collect();

        debug!(count = videos.len(), "YouTube search complete");
        Ok(videos)
    }
}
