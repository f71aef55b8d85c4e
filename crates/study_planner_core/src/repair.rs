//! crates/study_planner_core/src/repair.rs
//!
//! Recovers a study plan from a completion that may not be well-formed JSON.
//!
//! Stages run from the most faithful to the most lossy and stop at the first
//! candidate that both parses and passes [`AiGeneratedPlan::validate`]:
//!
//! 1. `Direct`: the whole trimmed response.
//! 2. `Extracted`: the greedy span from the first `{` to the last `}`.
//! 3. `PartialObject`: the object that opens with a `"weeks"` key, up to the
//!    last `]` followed by `}`.
//! 4. `WeeksRescue`: the `"weeks"` array on its own. A truncated array is cut
//!    after its last complete element and closed, then wrapped as
//!    `{"weeks": [...]}`.
//!
//! Responses over [`MAX_RESPONSE_CHARS`] are rejected before any stage runs.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::plan::AiGeneratedPlan;

/// Longest response the parser will attempt to repair.
pub const MAX_RESPONSE_CHARS: usize = 10_000;
/// Characters kept from each end of an unrecoverable response.
const DIAGNOSTIC_CHARS: usize = 1000;

/// The stage that produced a usable plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStage {
    Direct,
    Extracted,
    PartialObject,
    WeeksRescue,
}

impl fmt::Display for RepairStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepairStage::Direct => "direct parse",
            RepairStage::Extracted => "object extraction",
            RepairStage::PartialObject => "partial object repair",
            RepairStage::WeeksRescue => "weeks array rescue",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairedPlan {
    pub plan: AiGeneratedPlan,
    pub stage: RepairStage,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanParseError {
    #[error("AI response too long ({length} characters, limit 10000); it was most likely truncated by the provider")]
    TooLong { length: usize },
    #[error("AI response was empty")]
    Empty,
    #[error("Could not recover a study plan from the AI response. Response start: {head} ... Response end: {tail}")]
    Unrecoverable { head: String, tail: String },
}

fn braced_span() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

fn weeks_object() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)\{[^{]*?"weeks"\s*:\s*\[.*\]\s*\}"#).expect("static regex")
    })
}

fn weeks_opener() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""weeks"\s*:\s*\["#).expect("static regex"))
}

/// Parses a plan out of a raw completion, escalating through the repair stages.
pub fn parse_plan_response(raw: &str) -> Result<RepairedPlan, PlanParseError> {
    let length = raw.chars().count();
    if length > MAX_RESPONSE_CHARS {
        return Err(PlanParseError::TooLong { length });
    }

    let text = raw.trim();
    if text.is_empty() {
        return Err(PlanParseError::Empty);
    }

    let stages = [
        RepairStage::Direct,
        RepairStage::Extracted,
        RepairStage::PartialObject,
        RepairStage::WeeksRescue,
    ];

    for stage in stages {
        let Some(candidate) = candidate_for(stage, text) else {
            debug!(%stage, "no candidate found");
            continue;
        };
        match serde_json::from_str::<AiGeneratedPlan>(&candidate) {
            Ok(plan) => match plan.validate() {
                Ok(()) => return Ok(RepairedPlan { plan, stage }),
                Err(e) => debug!(%stage, "candidate rejected: {}", e),
            },
            Err(e) => debug!(%stage, "candidate did not parse: {}", e),
        }
    }

    Err(PlanParseError::Unrecoverable {
        head: text.chars().take(DIAGNOSTIC_CHARS).collect(),
        tail: last_chars(text, DIAGNOSTIC_CHARS).to_string(),
    })
}

fn candidate_for(stage: RepairStage, text: &str) -> Option<String> {
    match stage {
        RepairStage::Direct => Some(text.to_string()),
        RepairStage::Extracted => braced_span().find(text).map(|m| m.as_str().to_string()),
        RepairStage::PartialObject => weeks_object().find(text).map(|m| m.as_str().to_string()),
        RepairStage::WeeksRescue => rescue_weeks_array(text),
    }
}

/// Parses any JSON object out of a completion using only the direct and
/// extraction stages.
pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Option<(T, RepairStage)> {
    let text = raw.trim();
    if let Ok(value) = serde_json::from_str(text) {
        return Some((value, RepairStage::Direct));
    }
    let span = braced_span().find(text)?;
    serde_json::from_str(span.as_str())
        .ok()
        .map(|value| (value, RepairStage::Extracted))
}

fn rescue_weeks_array(text: &str) -> Option<String> {
    let opener = weeks_opener().find(text)?;
    // The match ends just past the opening bracket.
    let array_start = opener.end() - 1;
    let array = close_truncated_array(&text[array_start..])?;
    Some(format!("{{\"weeks\": {array}}}"))
}

/// Returns the JSON array at the start of `text`, closing it after its last
/// complete object element if the text ends before the array does.
fn close_truncated_array(text: &str) -> Option<String> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut last_cut: Option<(usize, String)> = None;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => stack.push(c),
            '}' | ']' => {
                let open = stack.pop()?;
                if (open == '{') != (c == '}') {
                    return None;
                }
                let end = i + c.len_utf8();
                if stack.is_empty() {
                    return Some(text[..end].to_string());
                }
                if c == '}' && stack.last() == Some(&'[') {
                    let closers = stack
                        .iter()
                        .rev()
                        .map(|open| if *open == '{' { '}' } else { ']' })
                        .collect();
                    last_cut = Some((end, closers));
                }
            }
            _ => {}
        }
    }

    let (end, closers) = last_cut?;
    Some(format!("{}{}", &text[..end], closers))
}

fn last_chars(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    match text.char_indices().nth(count - n) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
