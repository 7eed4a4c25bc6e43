//! The session manager: turn-taking over an explicit [`Session`] value.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::collaborators::{Completion, RepositorySearch, RoadmapGenerator, VideoSearch};
use crate::constants;
use crate::error::{Collaborator, CollaboratorError, SessionError, UpstreamError};
use crate::prompts;
use crate::quiz::{self, AnswerCheck, Difficulty, Quiz};
use crate::{Message, Sender, Session};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Follow-up and summary prompts see this many exchanges (two messages each).
    pub recent_exchanges: usize,
    /// Recompute the summary whenever the history length is a multiple of this.
    pub summary_every: usize,
    /// Links requested from each search collaborator.
    pub result_limit: usize,
    /// Upper bound on every collaborator call.
    pub call_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recent_exchanges: constants::DEFAULT_RECENT_EXCHANGES,
            summary_every: constants::DEFAULT_SUMMARY_EVERY,
            result_limit: constants::DEFAULT_RESULT_LIMIT,
            call_timeout: Duration::from_secs(constants::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SessionConfig {
    fn window_len(&self) -> usize {
        self.recent_exchanges * 2
    }
}

/// Runs session operations against the external collaborators. Holds no
/// per-session state, so one manager serves every session.
#[derive(Clone)]
pub struct SessionManager {
    roadmaps: Arc<dyn RoadmapGenerator>,
    videos: Arc<dyn VideoSearch>,
    repositories: Arc<dyn RepositorySearch>,
    completion: Arc<dyn Completion>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        roadmaps: Arc<dyn RoadmapGenerator>,
        videos: Arc<dyn VideoSearch>,
        repositories: Arc<dyn RepositorySearch>,
        completion: Arc<dyn Completion>,
    ) -> Self {
        Self {
            roadmaps,
            videos,
            repositories,
            completion,
            config: SessionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Generates the roadmap and link lists for `topic` and opens the chat.
    ///
    /// The three lookups run concurrently. The session is only touched once
    /// all of them have succeeded; any failure leaves it exactly as it was.
    #[instrument(skip(self, session))]
    pub async fn start_topic(&self, session: &mut Session, topic: &str) -> Result<(), SessionError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SessionError::input("topic must not be empty"));
        }
        if session.roadmap_given() {
            return Err(SessionError::state(format!(
                "a roadmap for '{}' was already generated",
                session.topic()
            )));
        }

        let limit = self.config.result_limit;
        let (roadmap, videos, repositories) = futures::join!(
            self.bounded(self.roadmaps.generate_roadmap(topic)),
            self.bounded(self.videos.search_videos(topic, limit)),
            self.bounded(self.repositories.search_repositories(topic, limit)),
        );

        let (roadmap, videos, repositories) = match (roadmap, videos, repositories) {
            (Ok(roadmap), Ok(videos), Ok(repositories)) => (roadmap, videos, repositories),
            (roadmap, videos, repositories) => {
                let failures: Vec<_> = [
                    roadmap.err().map(|e| (Collaborator::Roadmap, e)),
                    videos.err().map(|e| (Collaborator::Videos, e)),
                    repositories.err().map(|e| (Collaborator::Repositories, e)),
                ]
                .into_iter()
                .flatten()
                .collect();
                let err = UpstreamError::from_failures(failures);
                error!(%err, "Enrichment failed, session left unchanged");
                return Err(err.into());
            }
        };

        info!(
            videos = videos.len(),
            repositories = repositories.len(),
            "Roadmap generated"
        );
        let message = prompts::enrichment(topic, &roadmap, &videos, &repositories);
        session.begin_topic(topic.to_string(), message);
        Ok(())
    }

    /// Answers a follow-up question.
    ///
    /// A failed completion still gets a reply in the history (a fixed
    /// apology) and is reported as [`SessionError::Upstream`].
    #[instrument(skip(self, session))]
    pub async fn ask_follow_up(
        &self,
        session: &mut Session,
        question: &str,
    ) -> Result<(), SessionError> {
        self.require_roadmap(session)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::input("question must not be empty"));
        }

        let len_before = session.history().len();
        session.add_message(Sender::User, question);
        let window = session.recent_messages(self.config.window_len()).to_vec();
        let prompt = prompts::follow_up(session.topic(), session.summary(), &window, question);
        debug!(prompt_len = prompt.len(), "Sending follow-up prompt");

        let outcome = match self.bounded(self.completion.complete(&prompt)).await {
            Ok(answer) => {
                session.add_message(Sender::Assistant, answer.trim());
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Follow-up completion failed, replying with fallback");
                session.add_message(Sender::Assistant, constants::FALLBACK_REPLY);
                Err(UpstreamError::new(Collaborator::Completion, e).into())
            }
        };

        self.maybe_summarize(session, len_before, &window).await;
        outcome
    }

    /// Refreshes the summary when this turn pushed the history length onto
    /// or past a multiple of `summary_every`, summarizing the same window the
    /// follow-up prompt was built from. Best effort: a failed summary keeps
    /// the previous one.
    async fn maybe_summarize(
        &self,
        session: &mut Session,
        len_before: usize,
        window: &[Message],
    ) {
        let every = self.config.summary_every;
        let len = session.history().len();
        if every == 0 || len / every == len_before / every {
            return;
        }

        let prompt = prompts::summary(window);
        match self.bounded(self.completion.complete(&prompt)).await {
            Ok(summary) => {
                debug!(history_len = len, "Rolling summary updated");
                session.set_summary(summary.trim().to_string());
            }
            Err(e) => warn!(error = %e, history_len = len, "Summarization failed, keeping previous summary"),
        }
    }

    /// Generates a fresh quiz, replacing any previous one and its answers.
    #[instrument(skip(self, session))]
    pub async fn request_quiz(
        &self,
        session: &mut Session,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<(), SessionError> {
        self.require_roadmap(session)?;
        if !(1..=constants::MAX_QUIZ_QUESTIONS).contains(&count) {
            return Err(SessionError::input(format!(
                "question count must be between 1 and {}, got {count}",
                constants::MAX_QUIZ_QUESTIONS
            )));
        }

        let prompt = prompts::quiz(session.topic(), difficulty, count);
        let response = self
            .bounded(self.completion.complete(&prompt))
            .await
            .map_err(|e| UpstreamError::new(Collaborator::Completion, e))?;

        let questions = quiz::parse_questions(&response).inspect_err(|e| {
            warn!(error = %e, "Discarding unparseable quiz response");
        })?;
        if questions.len() != count {
            warn!(requested = count, received = questions.len(), "Quiz size differs from request");
        }

        info!(questions = questions.len(), %difficulty, "Quiz generated");
        session.replace_quiz(Quiz::new(difficulty, questions));
        Ok(())
    }

    pub fn record_answer(
        &self,
        session: &mut Session,
        index: usize,
        option: &str,
    ) -> Result<(), SessionError> {
        let quiz = session
            .quiz_mut()
            .ok_or_else(|| SessionError::state("no quiz has been requested"))?;
        quiz.record_answer(index, option)?;
        debug!(index, option, "Answer recorded");
        Ok(())
    }

    pub fn check_answer(&self, session: &Session, index: usize) -> Result<AnswerCheck, SessionError> {
        session
            .quiz()
            .ok_or_else(|| SessionError::state("no quiz has been requested"))?
            .check_answer(index)
    }

    fn require_roadmap(&self, session: &Session) -> Result<(), SessionError> {
        if session.roadmap_given() {
            Ok(())
        } else {
            Err(SessionError::state("start a topic before chatting or taking a quiz"))
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, CollaboratorError> {
        let limit = self.config.call_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(CollaboratorError::Timeout(limit)))
    }
}
