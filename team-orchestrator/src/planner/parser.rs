//! Decomposition text parser.
//!
//! Expected input is a sequence of blocks:
//!
//! ```text
//! ### Subtask 1: Research Latest Papers
//! Description: Gather and analyze recent research papers on the topic
//! Required Agents: research, qa
//! Dependencies: none
//! ```
//!
//! Parsing is line-oriented and tolerant: unlabeled lines after a header extend
//! the description, text before the first header is ignored, and labels may be
//! bulleted or bold (`- **Dependencies:** 1, 2`).

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ParseError;
use crate::planner::types::Subtask;

const HEADER_KEYWORD: &str = "subtask";
const DESCRIPTION_LABELS: [&str; 1] = ["description"];
const CAPABILITY_LABELS: [&str; 3] = ["required agents", "required capabilities", "capabilities"];
const DEPENDENCY_LABELS: [&str; 1] = ["dependencies"];

/// How to treat dependency references that are not subtask ordinals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Reject the whole decomposition
    #[default]
    Strict,
    /// Drop the reference and keep going
    Lenient,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SubtaskParser {
    mode: ParseMode,
}

impl SubtaskParser {
    pub fn new(mode: ParseMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Parse decomposition text into subtasks with ids `task_0..task_{n-1}`
    /// in header order. Text without any header yields an empty list.
    pub fn parse(&self, text: &str) -> Result<Vec<Subtask>, ParseError> {
        let mut subtasks: Vec<Subtask> = Vec::new();

        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(title) = header_title(line) {
                let id = format!("task_{}", subtasks.len());
                subtasks.push(Subtask::new(id, title));
                continue;
            }

            // preamble before the first header
            let Some(current) = subtasks.last_mut() else {
                continue;
            };

            if let Some(value) = labeled_value(line, &DESCRIPTION_LABELS) {
                append_line(&mut current.description, value);
            } else if let Some(value) = labeled_value(line, &CAPABILITY_LABELS) {
                current.required_capabilities = parse_capabilities(value);
            } else if let Some(value) = labeled_value(line, &DEPENDENCY_LABELS) {
                current.dependencies = self.parse_dependencies(&current.id, value)?;
            } else {
                append_line(&mut current.description, line);
            }
        }

        Ok(subtasks)
    }

    fn parse_dependencies(&self, task_id: &str, value: &str) -> Result<Vec<String>, ParseError> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            return Ok(Vec::new());
        }

        let mut dependencies: Vec<String> = Vec::new();
        for reference in value.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            match parse_ordinal(reference) {
                Some(ordinal) => {
                    let dep_id = format!("task_{}", ordinal - 1);
                    if !dependencies.contains(&dep_id) {
                        dependencies.push(dep_id);
                    }
                }
                None => match self.mode {
                    ParseMode::Strict => {
                        return Err(ParseError::InvalidDependencyReference {
                            task_id: task_id.to_string(),
                            reference: reference.to_string(),
                        })
                    }
                    ParseMode::Lenient => {
                        warn!(task_id, reference, "dropping malformed dependency reference");
                    }
                },
            }
        }
        Ok(dependencies)
    }
}

/// Parse decomposition text in strict mode
pub fn parse_decomposition(text: &str) -> Result<Vec<Subtask>, ParseError> {
    SubtaskParser::default().parse(text)
}

/// `### Subtask 2: Title` -> `Some("Title")`
fn header_title(line: &str) -> Option<String> {
    let rest = line.strip_prefix('#')?.trim_start_matches('#').trim_start();
    let rest = strip_keyword(rest)?;
    // `## Subtasks` is a section heading, not a subtask
    if rest
        .chars()
        .next()
        .is_some_and(|c| !(c.is_whitespace() || c.is_ascii_digit() || matches!(c, ':' | '.' | '-' | '#')))
    {
        return None;
    }

    let title = match rest.split_once(':') {
        Some((_, title)) => title,
        // no colon: drop the ordinal, keep whatever follows
        None => rest
            .trim_start()
            .trim_start_matches(|c: char| {
                c.is_ascii_digit() || c.is_whitespace() || matches!(c, '.' | '#' | '-')
            }),
    };
    Some(title.trim().trim_matches('*').trim().to_string())
}

/// Value of a `Label: value` line for any of `labels` (case-insensitive)
fn labeled_value<'a>(line: &'a str, labels: &[&str]) -> Option<&'a str> {
    let body = line.trim_start_matches(|c: char| c == '-' || c == '*' || c.is_whitespace());

    labels.iter().find_map(|label| {
        let head = body.get(..label.len())?;
        if !head.eq_ignore_ascii_case(label) {
            return None;
        }
        let rest = body[label.len()..].trim_start_matches('*');
        let value = rest.strip_prefix(':')?;
        Some(value.trim_start_matches('*').trim())
    })
}

fn parse_capabilities(value: &str) -> Vec<String> {
    let mut capabilities: Vec<String> = Vec::new();
    for tag in value.split(',').map(|t| t.trim().to_lowercase()) {
        if !tag.is_empty() && !capabilities.contains(&tag) {
            capabilities.push(tag);
        }
    }
    capabilities
}

/// `2`, `#2`, `Subtask 2` -> `Some(2)`; zero and non-numbers -> `None`
fn parse_ordinal(reference: &str) -> Option<usize> {
    let text = reference.trim();
    let text = strip_keyword(text).map_or(text, str::trim_start);
    let text = text.trim_start_matches('#');
    match text.parse::<usize>() {
        Ok(0) | Err(_) => None,
        Ok(ordinal) => Some(ordinal),
    }
}

/// Remainder of `text` after a leading case-insensitive `subtask`
fn strip_keyword(text: &str) -> Option<&str> {
    let head = text.get(..HEADER_KEYWORD.len())?;
    if !head.eq_ignore_ascii_case(HEADER_KEYWORD) {
        return None;
    }
    text.get(HEADER_KEYWORD.len()..)
}

fn append_line(buffer: &mut String, line: &str) {
    if line.is_empty() {
        return;
    }
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(line);
}
