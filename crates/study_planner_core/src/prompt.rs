//! crates/study_planner_core/src/prompt.rs
//!
//! Builds the instructions sent to the completion service. Everything here is
//! pure string construction so the output can be asserted on directly.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::preferences::PlanPreferences;

/// Most weeks a single generated plan may contain. Larger plans get cut off
/// by the provider mid-structure.
pub const MAX_PLAN_WEEKS: u32 = 8;
pub const MAX_DESCRIPTION_CHARS: usize = 100;
pub const PLAN_MAX_TOKENS: u32 = 3000;
/// Longest study text forwarded to the summary and quiz prompts.
pub const MAX_SOURCE_CHARS: usize = 12_000;

const PLAN_SYSTEM_INSTRUCTIONS: &str = r#"You are a study planning assistant that creates realistic weekly study schedules.

You MUST respond with ONLY a single JSON object. No markdown, no code fences, no commentary before or after it.

The JSON object must have exactly this shape:
{"weeks":[{"weekNumber":1,"sessions":[{"subject":"<subject>","startTime":"<ISO 8601 UTC timestamp>","endTime":"<ISO 8601 UTC timestamp>","description":"<short description>","learningStyle":"<visual|auditory|reading|kinesthetic|balanced>"}]}]}

Rules:
- Use the subject names EXACTLY as given, with the same spelling and capitalisation.
- Every endTime must be later than its startTime.
- Sessions must not overlap.
- Keep each description short and concrete."#;

/// A system/user instruction pair plus the generation limits that go with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    /// Number of weeks the model was told to produce.
    pub week_cap: u32,
    pub max_tokens: u32,
}

/// Builds the plan generation prompt, starting the plan on `start_date`.
pub fn build_plan_prompt(prefs: &PlanPreferences, start_date: NaiveDate) -> Prompt {
    let week_cap = prefs.weeks.min(MAX_PLAN_WEEKS);
    let (window_start, window_end) = prefs.preference.window();

    let subjects = prefs
        .subjects
        .iter()
        .map(|s| format!("\"{s}\""))
        .collect::<Vec<_>>()
        .join(", ");

    let days = if prefs.preferred_days.is_empty() {
        "any day of the week".to_string()
    } else {
        prefs
            .preferred_days
            .iter()
            .map(|d| weekday_name(*d))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut user = format!(
        "Create a study plan with exactly {week_cap} week(s), numbered with \"weekNumber\" from 1 to {week_cap}.\n\
         Subjects: {subjects}\n\
         Weekly study time: {hours} hours, about {per_week} sessions per week spread across the subjects.\n\
         Session length: {session} minutes, with at least {brk} minutes between consecutive sessions.\n\
         Study days: {days}.\n\
         Preferred time of day: {pref} (schedule sessions between {window_start:02}:00 and {window_end:02}:00 UTC).\n\
         The first week starts on {start} ({start_day}).\n\
         Each description must be under {MAX_DESCRIPTION_CHARS} characters.\n",
        hours = prefs.hours,
        per_week = prefs.sessions_per_week(),
        session = prefs.session_length,
        brk = prefs.break_length,
        pref = prefs.preference.as_str(),
        start = start_date.format("%Y-%m-%d"),
        start_day = weekday_name(start_date.weekday()),
    );

    if !prefs.focus_areas.is_empty() {
        user.push_str(&format!("Focus areas: {}.\n", prefs.focus_areas.join(", ")));
    }
    if let Some(exams) = &prefs.exam_dates {
        user.push_str(&format!(
            "Upcoming exams: {exams}. Increase review sessions for these subjects before their exam dates.\n"
        ));
    }
    if let Some(goals) = &prefs.goals {
        user.push_str(&format!("Goals: {goals}\n"));
    }
    user.push_str("Respond with ONLY the JSON object.");

    Prompt {
        system: PLAN_SYSTEM_INSTRUCTIONS.to_string(),
        user,
        week_cap,
        max_tokens: PLAN_MAX_TOKENS,
    }
}

/// Builds a prompt that condenses study material into revision notes.
pub fn build_summary_prompt(text: &str, subject: Option<&str>) -> Prompt {
    let source = truncate_chars(text, MAX_SOURCE_CHARS);
    let topic = subject
        .map(|s| format!(" for the subject \"{s}\""))
        .unwrap_or_default();
    Prompt {
        system: "You are a study assistant. Summarise study material into clear, well-structured revision notes. Use short paragraphs and bullet points. Do not invent facts that are not in the material.".to_string(),
        user: format!("Summarise the following material{topic}:\n\n{source}"),
        week_cap: 0,
        max_tokens: 1500,
    }
}

/// Builds a prompt asking for a multiple-choice quiz as a JSON object.
pub fn build_quiz_prompt(text: &str, num_questions: u32) -> Prompt {
    let source = truncate_chars(text, MAX_SOURCE_CHARS);
    Prompt {
        system: r#"You are a study assistant that writes multiple-choice quizzes.
You MUST respond with ONLY a JSON object of this shape and nothing else:
{"questions":[{"question":"<text>","options":["<a>","<b>","<c>","<d>"],"answer":"<one of the options, verbatim>","explanation":"<one sentence>"}]}"#
            .to_string(),
        user: format!(
            "Write exactly {num_questions} questions with four options each, based only on this material:\n\n{source}"
        ),
        week_cap: 0,
        max_tokens: 2500,
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::{PlanRequest, TimePreference};

    fn prefs(weeks: u32) -> PlanPreferences {
        PlanPreferences::try_from(PlanRequest {
            subjects: vec!["Math".to_string(), "Physics".to_string()],
            hours: Some(10),
            preference: Some("morning".to_string()),
            weeks: Some(weeks),
            session_length: Some(60),
            break_length: Some(15),
            preferred_days: vec!["monday".to_string(), "wednesday".to_string()],
            ..Default::default()
        })
        .unwrap()
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 27).unwrap()
    }

    #[test]
    fn week_cap_is_min_of_weeks_and_eight() {
        for weeks in 1..=52 {
            let prompt = build_plan_prompt(&prefs(weeks), start());
            let expected = weeks.min(MAX_PLAN_WEEKS);
            assert_eq!(prompt.week_cap, expected);
            assert!(prompt
                .user
                .contains(&format!("exactly {expected} week(s)")));
        }
    }

    #[test]
    fn plan_prompt_carries_preferences() {
        let prompt = build_plan_prompt(&prefs(4), start());
        assert!(prompt.user.contains("\"Math\", \"Physics\""));
        assert!(prompt.user.contains("Monday, Wednesday"));
        assert!(prompt.user.contains("between 06:00 and 12:00 UTC"));
        assert!(prompt.user.contains("2025-01-27 (Monday)"));
        assert!(prompt.user.contains("under 100 characters"));
        assert!(prompt.system.contains("ONLY a single JSON object"));
        assert!(prompt.system.contains("\"weekNumber\""));
        assert_eq!(prompt.max_tokens, PLAN_MAX_TOKENS);
    }

    #[test]
    fn optional_sections_only_when_present() {
        let mut p = prefs(2);
        let plain = build_plan_prompt(&p, start());
        assert!(!plain.user.contains("Focus areas"));
        assert!(!plain.user.contains("Upcoming exams"));

        p.focus_areas = vec!["calculus".to_string()];
        p.exam_dates = Some("Math on 2025-02-20".to_string());
        p.preference = TimePreference::Flexible;
        p.preferred_days.clear();
        let full = build_plan_prompt(&p, start());
        assert!(full.user.contains("Focus areas: calculus."));
        assert!(full.user.contains("Upcoming exams: Math on 2025-02-20."));
        assert!(full.user.contains("any day of the week"));
    }

    #[test]
    fn prompt_is_deterministic() {
        assert_eq!(
            build_plan_prompt(&prefs(3), start()),
            build_plan_prompt(&prefs(3), start())
        );
    }

    #[test]
    fn source_text_is_truncated_on_char_boundary() {
        let text = "é".repeat(MAX_SOURCE_CHARS + 10);
        let prompt = build_summary_prompt(&text, Some("French"));
        assert!(prompt.user.contains("for the subject \"French\""));
        assert_eq!(
            prompt.user.chars().filter(|c| *c == 'é').count(),
            MAX_SOURCE_CHARS
        );

        let quiz = build_quiz_prompt("short text", 5);
        assert!(quiz.user.contains("exactly 5 questions"));
    }
}
