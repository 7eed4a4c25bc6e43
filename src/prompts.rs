// Prompt templates sent to the completion model, plus the enrichment message layout.

use crate::collaborators::{RepositoryLink, VideoLink};
use crate::quiz::Difficulty;
use crate::Message;

pub fn roadmap(topic: &str) -> String {
    format!(
        "You are a professional mentor. Please create a personalized weekly learning roadmap \
        for the topic: \"{topic}\".\n\n\
        Include:\n\
        - Weekly breakdown (e.g., Week 1, Week 2...)\n\
        - Subtopics to learn each week\n\
        - Suggested resources (books, videos, online courses)\n\
        - Clear and simple structure\n\n\
        Format it in clean markdown so it can be displayed nicely in a webpage."
    )
}

/// Renders messages as `sender: text` lines.
pub fn render_window(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn follow_up(topic: &str, summary: &str, recent: &[Message], question: &str) -> String {
    let summary = if summary.is_empty() {
        "(none yet)"
    } else {
        summary
    };
    format!(
        "You are a helpful AI tutor.\n\n\
        The topic the user is learning about is: **{topic}**\n\n\
        Summary of the earlier conversation:\n{summary}\n\n\
        Most recent messages:\n{window}\n\n\
        Now the user is asking: \"{question}\"\n\n\
        Respond clearly, helpfully, and concisely with reference to earlier discussion.",
        window = render_window(recent),
    )
}

pub fn summary(recent: &[Message]) -> String {
    format!(
        "Summarize the following tutoring conversation in 3-5 lines. \
        Keep the learner's goals, open questions and anything already explained.\n\n{}",
        render_window(recent)
    )
}

pub fn quiz(topic: &str, difficulty: Difficulty, count: usize) -> String {
    format!(
        "Create exactly {count} multiple-choice questions about \"{topic}\" at {difficulty} difficulty.\n\n\
        Return only a JSON array. Each element must be an object with these fields:\n\
        - \"question\": the question text\n\
        - \"options\": an array of exactly 4 strings labeled \"A. ...\", \"B. ...\", \"C. ...\", \"D. ...\"\n\
        - \"answer\": the single letter of the correct option (A, B, C or D)\n\
        - \"explanation\": one or two sentences explaining the correct answer\n\n\
        Wrap the array in a ```json code block."
    )
}

/// The first assistant message of a session: roadmap, then videos, then repositories.
pub fn enrichment(
    topic: &str,
    roadmap: &str,
    videos: &[VideoLink],
    repositories: &[RepositoryLink],
) -> String {
    let video_list = link_list(videos.iter().map(|v| (v.title.as_str(), v.url.as_str())));
    let repo_list = link_list(repositories.iter().map(|r| (r.name.as_str(), r.url.as_str())));
    format!(
        "**Personalized {topic} Learning Roadmap:**\n\n{roadmap}\n\n\
        **Top YouTube Tutorials:**\n\n{video_list}\n\n\
        **Top GitHub Projects:**\n\n{repo_list}",
        roadmap = roadmap.trim(),
    )
}

fn link_list<'a>(links: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let lines: Vec<String> = links
        .map(|(label, url)| format!("- [{}]({url})", escape_link_label(label)))
        .collect();
    if lines.is_empty() {
        "_Nothing found._".to_string()
    } else {
        lines.join("\n")
    }
}

/// Backslash-escapes characters that would end or nest a markdown link label.
fn escape_link_label(label: &str) -> String {
    let mut escaped = String::with_capacity(label.len());
    for c in label.chars() {
        if matches!(c, '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
