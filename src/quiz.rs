//! Quiz state and validation of model-generated quiz JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use crate::error::SessionError;

pub const OPTION_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];
const MISSING_OPTION: &str = "(no option provided)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => f.write_str("Easy"),
            Difficulty::Medium => f.write_str("Medium"),
            Difficulty::Hard => f.write_str("Hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(SessionError::input(format!(
                "unknown difficulty '{other}', expected easy, medium or hard"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizQuestion {
    pub prompt: String,
    /// Always four entries, each starting with its label ("A. ...").
    pub options: Vec<String>,
    /// One of "A".."D", or empty when the model gave no usable answer.
    pub correct_label: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerCheck {
    pub correct: bool,
    pub correct_label: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quiz {
    difficulty: Difficulty,
    questions: Vec<QuizQuestion>,
    answers: BTreeMap<usize, String>,
}

impl Quiz {
    pub fn new(difficulty: Difficulty, questions: Vec<QuizQuestion>) -> Self {
        Self {
            difficulty,
            questions,
            answers: BTreeMap::new(),
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn answers(&self) -> &BTreeMap<usize, String> {
        &self.answers
    }

    pub fn answer(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    /// Stores `option` as the selected answer; it must match one of the
    /// question's options verbatim.
    pub fn record_answer(&mut self, index: usize, option: &str) -> Result<(), SessionError> {
        let question = self.questions.get(index).ok_or_else(|| {
            SessionError::input(format!(
                "question {index} is out of range (quiz has {})",
                self.questions.len()
            ))
        })?;
        if !question.options.iter().any(|o| o == option) {
            return Err(SessionError::input(format!(
                "'{option}' is not an option of question {index}"
            )));
        }
        self.answers.insert(index, option.to_string());
        Ok(())
    }

    pub fn check_answer(&self, index: usize) -> Result<AnswerCheck, SessionError> {
        let question = self.questions.get(index).ok_or_else(|| {
            SessionError::state(format!("question {index} does not exist"))
        })?;
        let selected = self
            .answer(index)
            .ok_or_else(|| SessionError::state(format!("question {index} has no recorded answer")))?;

        let label: String = selected.chars().take(1).collect();
        Ok(AnswerCheck {
            correct: !question.correct_label.is_empty() && label == question.correct_label,
            correct_label: question.correct_label.clone(),
            explanation: question.explanation.clone(),
        })
    }
}

/// Returns the body of the first ```json fenced block, else of the first
/// unlabeled fence, else the trimmed text.
pub fn extract_json_block(text: &str) -> &str {
    let blocks = fenced_blocks(text);
    let body = blocks
        .iter()
        .find(|(info, _)| info.eq_ignore_ascii_case("json"))
        .or_else(|| blocks.iter().find(|(info, _)| info.is_empty()))
        .map(|&(_, body)| body.trim());
    body.unwrap_or_else(|| text.trim())
}

/// Closed ``` blocks as (info string, body) pairs. A block on a single line
/// takes a leading word as its info string.
fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    const FENCE: &str = "```";
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(FENCE) {
        let after = &rest[open + FENCE.len()..];
        let Some(close) = after.find(FENCE) else {
            break;
        };
        let inner = &after[..close];
        let block = match inner.split_once('\n') {
            Some((info, body)) => (info.trim(), body),
            None => {
                let inner = inner.trim_start();
                let info_len = inner
                    .find(|c: char| !c.is_ascii_alphanumeric())
                    .unwrap_or(inner.len());
                inner.split_at(info_len)
            }
        };
        blocks.push(block);
        rest = &after[close + FENCE.len()..];
    }
    blocks
}

/// Parses model output into quiz questions.
///
/// Malformed JSON or the wrong top-level shape is an error. Missing fields
/// inside a question fall back to empty text or placeholder options.
pub fn parse_questions(text: &str) -> Result<Vec<QuizQuestion>, SessionError> {
    let body = extract_json_block(text);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| SessionError::QuizFormat(format!("response is not valid JSON: {e}")))?;

    let Value::Array(items) = value else {
        return Err(SessionError::QuizFormat(
            "expected a JSON array of questions".to_string(),
        ));
    };
    if items.is_empty() {
        return Err(SessionError::QuizFormat(
            "the question array is empty".to_string(),
        ));
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_question(i, item))
        .collect()
}

fn parse_question(index: usize, item: &Value) -> Result<QuizQuestion, SessionError> {
    let Value::Object(fields) = item else {
        return Err(SessionError::QuizFormat(format!(
            "question {index} is not an object"
        )));
    };

    let text_field = |name: &str| {
        fields
            .get(name)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let raw_options: Vec<String> = match fields.get("options") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(options)) => options
            .iter()
            .map(|o| match o {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .collect(),
        Some(_) => {
            return Err(SessionError::QuizFormat(format!(
                "question {index}: options must be an array"
            )))
        }
    };
    if raw_options.len() > OPTION_LABELS.len() {
        return Err(SessionError::QuizFormat(format!(
            "question {index} has {} options, expected {}",
            raw_options.len(),
            OPTION_LABELS.len()
        )));
    }
    let options = OPTION_LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let option = raw_options.get(i).map(String::as_str).unwrap_or(MISSING_OPTION);
            label_option(*label, option)
        })
        .collect();

    let answer = text_field("answer");
    let correct_label = match answer.chars().next().map(|c| c.to_ascii_uppercase()) {
        None => String::new(),
        Some(c) if OPTION_LABELS.contains(&c) => c.to_string(),
        Some(_) => {
            return Err(SessionError::QuizFormat(format!(
                "question {index}: answer '{answer}' is not one of A, B, C or D"
            )))
        }
    };

    Ok(QuizQuestion {
        prompt: text_field("question"),
        options,
        correct_label,
        explanation: text_field("explanation"),
    })
}

/// Puts `label` in front of `option`. A leading "A." / "A)" / "A:" is only
/// treated as an existing label when it is this slot's letter followed by
/// whitespace; anything else is option text.
fn label_option(label: char, option: &str) -> String {
    let mut chars = option.chars();
    let own_label = chars.next() == Some(label)
        && matches!(chars.next(), Some('.' | ')' | ':'))
        && chars.next().map_or(true, char::is_whitespace);
    let text = if own_label { option[2..].trim_start() } else { option };
    format!("{label}. {text}")
}
