// Mock collaborators shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mentor::collaborators::{
    Completion, RepositoryLink, RepositorySearch, RoadmapGenerator, VideoLink, VideoSearch,
};
use mentor::{CollaboratorError, SessionConfig, SessionManager};

pub struct MockRoadmap {
    pub text: Option<String>,
}

#[async_trait]
impl RoadmapGenerator for MockRoadmap {
    async fn generate_roadmap(&self, _topic: &str) -> Result<String, CollaboratorError> {
        self.text
            .clone()
            .ok_or_else(|| CollaboratorError::Response("roadmap service down".to_string()))
    }
}

/// Succeeds, but only after `delay`.
pub struct SlowRoadmap {
    pub delay: Duration,
}

#[async_trait]
impl RoadmapGenerator for SlowRoadmap {
    async fn generate_roadmap(&self, _topic: &str) -> Result<String, CollaboratorError> {
        tokio::time::sleep(self.delay).await;
        Ok("Week 1: eventually".to_string())
    }
}

pub struct MockVideos {
    pub links: Option<Vec<VideoLink>>,
}

#[async_trait]
impl VideoSearch for MockVideos {
    async fn search_videos(
        &self,
        _topic: &str,
        limit: usize,
    ) -> Result<Vec<VideoLink>, CollaboratorError> {
        match &self.links {
            Some(links) => Ok(links.iter().take(limit).cloned().collect()),
            None => Err(CollaboratorError::NotConfigured("YOUTUBE_API_KEY")),
        }
    }
}

pub struct MockRepositories {
    pub links: Option<Vec<RepositoryLink>>,
}

#[async_trait]
impl RepositorySearch for MockRepositories {
    async fn search_repositories(
        &self,
        _topic: &str,
        limit: usize,
    ) -> Result<Vec<RepositoryLink>, CollaboratorError> {
        match &self.links {
            Some(links) => Ok(links.iter().take(limit).cloned().collect()),
            None => Err(CollaboratorError::Response("rate limited".to_string())),
        }
    }
}

type Responder = dyn Fn(&str) -> Result<String, CollaboratorError> + Send + Sync;

/// Answers every prompt through `respond` and remembers what it was asked.
pub struct MockCompletion {
    respond: Box<Responder>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    pub fn new(
        respond: impl Fn(&str) -> Result<String, CollaboratorError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call sleeps for `delay` before answering.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(|_| Ok("too late".to_string()))
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn summary_calls(&self) -> usize {
        self.prompts()
            .iter()
            .filter(|p| is_summary_prompt(p))
            .count()
    }
}

#[async_trait]
impl Completion for MockCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, CollaboratorError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.respond)(prompt)
    }
}

pub fn is_summary_prompt(prompt: &str) -> bool {
    prompt.starts_with("Summarize")
}

pub fn is_quiz_prompt(prompt: &str) -> bool {
    prompt.contains("multiple-choice")
}

pub const CAPITAL_QUIZ: &str = r#"Here is your quiz:
```json
[
  {"question": "Capital of France?", "options": ["A. Paris", "B. Lyon", "C. Nice", "D. Lille"], "answer": "A", "explanation": "Paris is the capital."},
  {"question": "Largest planet?", "options": ["A. Mars", "B. Jupiter", "C. Venus", "D. Earth"], "answer": "B", "explanation": "Jupiter is the largest."}
]
```"#;

pub fn rust_videos() -> MockVideos {
    MockVideos {
        links: Some(vec![VideoLink {
            title: "Intro to Rust".to_string(),
            url: "http://v1".to_string(),
        }]),
    }
}

pub fn rust_repositories() -> MockRepositories {
    MockRepositories {
        links: Some(vec![RepositoryLink {
            name: "rust-lang/rust".to_string(),
            url: "http://r1".to_string(),
        }]),
    }
}

pub fn roadmap() -> MockRoadmap {
    MockRoadmap {
        text: Some("Week 1: basics".to_string()),
    }
}

/// A manager whose search collaborators always succeed.
pub fn manager_with(completion: Arc<MockCompletion>) -> SessionManager {
    SessionManager::new(
        Arc::new(roadmap()),
        Arc::new(rust_videos()),
        Arc::new(rust_repositories()),
        completion,
    )
    .with_config(SessionConfig {
        call_timeout: Duration::from_millis(200),
        ..SessionConfig::default()
    })
}

/// Echo-style completion: quizzes get [`CAPITAL_QUIZ`], summaries and
/// answers get fixed text.
pub fn default_completion() -> Arc<MockCompletion> {
    Arc::new(MockCompletion::new(|prompt| {
        if is_quiz_prompt(prompt) {
            Ok(CAPITAL_QUIZ.to_string())
        } else if is_summary_prompt(prompt) {
            Ok("  The learner is studying Rust basics.  ".to_string())
        } else {
            Ok("Here is an answer.".to_string())
        }
    }))
}
