// Endpoints and defaults, overridable from the environment.

use std::env;

lazy_static::lazy_static! {
    pub static ref GEMINI_API_URL: String = env::var("GEMINI_API_URL").unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());
    pub static ref YOUTUBE_API_URL: String = env::var("YOUTUBE_API_URL").unwrap_or_else(|_| "https://www.googleapis.com/youtube/v3".to_string());
    pub static ref GITHUB_API_URL: String = env::var("GITHUB_API_URL").unwrap_or_else(|_| "https://api.github.com".to_string());
}

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const YOUTUBE_WATCH_URL: &str = "https://www.youtube.com/watch?v=";
pub const USER_AGENT: &str = concat!("mentor/", env!("CARGO_PKG_VERSION"));

/// Number of links requested from each search collaborator.
pub const DEFAULT_RESULT_LIMIT: usize = 5;
/// Follow-up prompts include this many user/assistant exchanges.
pub const DEFAULT_RECENT_EXCHANGES: usize = 5;
/// The rolling summary is recomputed whenever the history length is a multiple of this.
pub const DEFAULT_SUMMARY_EVERY: usize = 6;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MAX_QUIZ_QUESTIONS: usize = 5;
/// Web sessions idle for this long are discarded.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 60 * 60;

pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error while answering. Please try again.";
