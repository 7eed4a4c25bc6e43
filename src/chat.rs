// Line-oriented chat front end over the session manager.
// Reads from any BufRead and writes to any Write so it can run on a
// terminal or against scripted input.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::quiz::{Difficulty, OPTION_LABELS};
use crate::{Session, SessionError, SessionManager};

const HELP: &str = "Ask anything about your topic. Commands: /quiz <easy|medium|hard> [count], /summary, /new [topic], /help, /quit";
const DEFAULT_QUIZ_SIZE: usize = 3;

pub async fn run_chat<R: BufRead, W: Write>(
    manager: &SessionManager,
    topic: Option<String>,
    mut input: R,
    mut output: W,
) -> Result<Session> {
    info!("Starting interactive chat session...");
    let mut session = Session::new();
    let mut pending_topic = topic;

    'session: loop {
        while !session.roadmap_given() {
            let topic = match pending_topic.take() {
                Some(topic) => topic,
                None => {
                    write!(output, "Enter a topic to start: ")?;
                    output.flush()?;
                    match read_line(&mut input)? {
                        Some(line) => line,
                        None => return Ok(session),
                    }
                }
            };

            writeln!(output, "Generating roadmap for '{}'...", topic.trim())?;
            match manager.start_topic(&mut session, &topic).await {
                Ok(()) => {
                    if let Some(message) = session.history().last() {
                        writeln!(output, "\n{}\n", message.text)?;
                    }
                }
                Err(e) => writeln!(output, "Error: {e}")?,
            }
        }

        writeln!(output, "{HELP}")?;
        loop {
            write!(output, "> ")?;
            output.flush()?;
            let Some(line) = read_line(&mut input)? else {
                break 'session;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match line.split_whitespace().next().unwrap_or_default() {
                "/quit" | "/exit" => break 'session,
                "/help" => writeln!(output, "{HELP}")?,
                "/new" => {
                    info!(previous = session.topic(), "Starting over with a new topic");
                    session.reset();
                    pending_topic = line
                        .split_once(char::is_whitespace)
                        .map(|(_, topic)| topic.trim().to_string());
                    continue 'session;
                }
                "/summary" => {
                    if session.summary().is_empty() {
                        writeln!(output, "(no summary yet)")?;
                    } else {
                        writeln!(output, "{}", session.summary())?;
                    }
                }
                "/quiz" => {
                    let (difficulty, count) = match parse_quiz_args(line) {
                        Ok(args) => args,
                        Err(e) => {
                            writeln!(output, "Error: {e}")?;
                            continue;
                        }
                    };
                    writeln!(output, "Generating {difficulty} quiz...")?;
                    match manager.request_quiz(&mut session, difficulty, count).await {
                        Ok(()) => run_quiz(manager, &mut session, &mut input, &mut output)?,
                        Err(e) => writeln!(output, "Error: {e}")?,
                    }
                }
                _ => {
                    let result = manager.ask_follow_up(&mut session, line).await;
                    if let Some(message) = session.history().last() {
                        writeln!(output, "\n{}\n", message.text)?;
                    }
                    if let Err(e) = result {
                        warn!(error = %e, "Follow-up failed");
                    }
                }
            }
        }
    }

    info!("Chat session finished.");
    Ok(session)
}

fn parse_quiz_args(line: &str) -> Result<(Difficulty, usize), SessionError> {
    let mut args = line.split_whitespace().skip(1);
    let difficulty = match args.next() {
        Some(d) => d.parse()?,
        None => Difficulty::Medium,
    };
    let count = match args.next() {
        Some(c) => c
            .parse()
            .map_err(|_| SessionError::InvalidInput(format!("'{c}' is not a question count")))?,
        None => DEFAULT_QUIZ_SIZE,
    };
    Ok((difficulty, count))
}

fn run_quiz<R: BufRead, W: Write>(
    manager: &SessionManager,
    session: &mut Session,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let questions = match session.quiz() {
        Some(quiz) => quiz.questions().to_vec(),
        None => return Ok(()),
    };

    let mut score = 0;
    for (index, question) in questions.iter().enumerate() {
        writeln!(output, "\nQ{}. {}", index + 1, question.prompt)?;
        for option in &question.options {
            writeln!(output, "   {option}")?;
        }

        let selected = loop {
            write!(output, "Your answer (A-D, empty to skip): ")?;
            output.flush()?;
            let Some(line) = read_line(input)? else {
                return Ok(());
            };
            let letter = line.trim().to_ascii_uppercase();
            if letter.is_empty() {
                break None;
            }
            let found = OPTION_LABELS
                .iter()
                .position(|label| letter.starts_with(*label))
                .and_then(|i| question.options.get(i));
            match found {
                Some(option) => break Some(option.clone()),
                None => writeln!(output, "Please answer with A, B, C or D.")?,
            }
        };
        let Some(selected) = selected else {
            continue;
        };

        manager.record_answer(session, index, &selected)?;
        let check = manager.check_answer(session, index)?;
        if check.correct {
            score += 1;
            writeln!(output, "Correct!")?;
        } else {
            writeln!(output, "Not quite, the answer is {}.", check.correct_label)?;
        }
        if !check.explanation.is_empty() {
            writeln!(output, "{}", check.explanation)?;
        }
    }

    writeln!(output, "\nScore: {score}/{}", questions.len())?;
    Ok(())
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("Failed to read from input")?;
    if read == 0 {
        Ok(None)
    } else {
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
