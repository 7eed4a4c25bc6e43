pub mod chat;
pub mod collaborators;
pub mod constants;
pub mod error;
pub mod github;
pub mod llm_interaction;
pub mod manager;
pub mod prompts;
pub mod quiz;
pub mod web_server;
pub mod youtube;

use std::fmt;

use serde::Serialize;

pub use error::{Collaborator, CollaboratorError, SessionError, UpstreamError};
pub use manager::{SessionConfig, SessionManager};
pub use quiz::{AnswerCheck, Difficulty, Quiz, QuizQuestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => f.write_str("User"),
            Sender::Assistant => f.write_str("Assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
}

/// Conversation state for one learner. Only [`SessionManager`] mutates it,
/// the caller owns and stores it between interactions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Session {
    topic: String,
    roadmap_given: bool,
    history: Vec<Message>,
    summary: String,
    quiz: Option<Quiz>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn roadmap_given(&self) -> bool {
        self.roadmap_given
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    /// The last `count` messages, oldest first.
    pub fn recent_messages(&self, count: usize) -> &[Message] {
        let start = self.history.len().saturating_sub(count);
        &self.history[start..]
    }

    /// Back to an empty session with no topic.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn add_message(&mut self, sender: Sender, text: impl Into<String>) {
        self.history.push(Message {
            sender,
            text: text.into(),
        });
    }

    /// Commits a generated roadmap in one step so the session never shows a
    /// topic without its enrichment message.
    pub(crate) fn begin_topic(&mut self, topic: String, enrichment: String) {
        self.add_message(Sender::Assistant, enrichment);
        self.topic = topic;
        self.roadmap_given = true;
    }

    pub(crate) fn set_summary(&mut self, summary: String) {
        self.summary = summary;
    }

    pub(crate) fn replace_quiz(&mut self, quiz: Quiz) {
        self.quiz = Some(quiz);
    }

    pub(crate) fn quiz_mut(&mut self) -> Option<&mut Quiz> {
        self.quiz.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_new() {
        let session = Session::new();
        assert_eq!(session.topic(), "");
        assert!(!session.roadmap_given());
        assert!(session.history().is_empty());
        assert_eq!(session.summary(), "");
        assert!(session.quiz().is_none());
    }

    #[test]
    fn test_begin_topic_sets_flag_and_message() {
        let mut session = Session::new();
        session.begin_topic("Rust".to_string(), "Week 1: basics".to_string());

        assert_eq!(session.topic(), "Rust");
        assert!(session.roadmap_given());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.history()[0].sender, Sender::Assistant);
    }

    #[test]
    fn test_recent_messages() {
        let mut session = Session::new();
        for i in 0..4 {
            session.add_message(Sender::User, format!("q{i}"));
        }

        let recent = session.recent_messages(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "q2");
        assert_eq!(recent[1].text, "q3");
        assert_eq!(session.recent_messages(10).len(), 4);
    }

    #[test]
    fn test_reset() {
        let mut session = Session::new();
        session.begin_topic("Rust".to_string(), "plan".to_string());
        session.set_summary("short".to_string());
        session.reset();

        assert_eq!(session.topic(), "");
        assert!(!session.roadmap_given());
        assert!(session.history().is_empty());
        assert_eq!(session.summary(), "");
    }

    #[test]
    fn test_sender_display() {
        assert_eq!(Sender::User.to_string(), "User");
        assert_eq!(Sender::Assistant.to_string(), "Assistant");
    }
}
