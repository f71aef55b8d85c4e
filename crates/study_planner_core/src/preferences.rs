//! crates/study_planner_core/src/preferences.rs
//!
//! The study preferences a user submits when asking for a generated plan,
//! and their validation.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

pub const MIN_WEEKLY_HOURS: u32 = 1;
pub const MAX_WEEKLY_HOURS: u32 = 40;
pub const MIN_WEEKS: u32 = 1;
pub const MAX_WEEKS: u32 = 52;
pub const DEFAULT_WEEKS: u32 = 4;
pub const DEFAULT_SESSION_MINUTES: u32 = 60;
pub const DEFAULT_BREAK_MINUTES: u32 = 15;

/// The raw body of a plan generation request, exactly as the client sends it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    #[serde(default)]
    pub subjects: Vec<String>,
    pub hours: Option<u32>,
    pub preference: Option<String>,
    pub weeks: Option<u32>,
    pub goals: Option<String>,
    pub session_length: Option<u32>,
    pub break_length: Option<u32>,
    #[serde(default)]
    pub preferred_days: Vec<String>,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    pub exam_dates: Option<String>,
}

/// Reasons a plan request is rejected before any LLM call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreferenceError {
    #[error("At least one subject is required")]
    MissingSubjects,
    #[error("Weekly study hours are required")]
    MissingHours,
    #[error("Weekly study hours must be between 1 and 40, got {0}")]
    HoursOutOfRange(u32),
    #[error("Number of weeks must be between 1 and 52, got {0}")]
    WeeksOutOfRange(u32),
    #[error("Session length must be between 15 and 240 minutes, got {0}")]
    SessionLengthOutOfRange(u32),
    #[error("Break length must be at most 120 minutes, got {0}")]
    BreakLengthOutOfRange(u32),
    #[error("Unknown time-of-day preference '{0}'")]
    UnknownPreference(String),
    #[error("Unknown weekday '{0}'")]
    UnknownWeekday(String),
}

/// Time of day the user would rather study in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimePreference {
    Morning,
    Afternoon,
    Evening,
    Night,
    #[default]
    Flexible,
}

impl TimePreference {
    /// The hour window (start inclusive, end exclusive) sessions should fall in.
    pub fn window(&self) -> (u32, u32) {
        match self {
            TimePreference::Morning => (6, 12),
            TimePreference::Afternoon => (12, 17),
            TimePreference::Evening => (17, 21),
            TimePreference::Night => (20, 24),
            TimePreference::Flexible => (8, 22),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimePreference::Morning => "morning",
            TimePreference::Afternoon => "afternoon",
            TimePreference::Evening => "evening",
            TimePreference::Night => "night",
            TimePreference::Flexible => "flexible",
        }
    }
}

impl std::str::FromStr for TimePreference {
    type Err = PreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(TimePreference::Morning),
            "afternoon" => Ok(TimePreference::Afternoon),
            "evening" => Ok(TimePreference::Evening),
            "night" => Ok(TimePreference::Night),
            "flexible" | "any" | "" => Ok(TimePreference::Flexible),
            other => Err(PreferenceError::UnknownPreference(other.to_string())),
        }
    }
}

/// Validated preferences, ready for the prompt builder.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanPreferences {
    pub subjects: Vec<String>,
    pub hours: u32,
    pub weeks: u32,
    pub preference: TimePreference,
    pub session_length: u32,
    pub break_length: u32,
    /// Empty means any day of the week.
    pub preferred_days: Vec<Weekday>,
    pub focus_areas: Vec<String>,
    pub exam_dates: Option<String>,
    pub goals: Option<String>,
}

impl PlanPreferences {
    /// Sessions per week needed to cover the weekly hours, rounded up.
    pub fn sessions_per_week(&self) -> u32 {
        let minutes = self.hours * 60;
        minutes.div_ceil(self.session_length).max(1)
    }
}

impl TryFrom<PlanRequest> for PlanPreferences {
    type Error = PreferenceError;

    fn try_from(request: PlanRequest) -> Result<Self, Self::Error> {
        let mut subjects: Vec<String> = Vec::with_capacity(request.subjects.len());
        for subject in request.subjects {
            let subject = subject.trim();
            if !subject.is_empty() && !subjects.iter().any(|s| s == subject) {
                subjects.push(subject.to_string());
            }
        }
        if subjects.is_empty() {
            return Err(PreferenceError::MissingSubjects);
        }

        let hours = request.hours.ok_or(PreferenceError::MissingHours)?;
        if !(MIN_WEEKLY_HOURS..=MAX_WEEKLY_HOURS).contains(&hours) {
            return Err(PreferenceError::HoursOutOfRange(hours));
        }

        let weeks = request.weeks.unwrap_or(DEFAULT_WEEKS);
        if !(MIN_WEEKS..=MAX_WEEKS).contains(&weeks) {
            return Err(PreferenceError::WeeksOutOfRange(weeks));
        }

        let session_length = request.session_length.unwrap_or(DEFAULT_SESSION_MINUTES);
        if !(15..=240).contains(&session_length) {
            return Err(PreferenceError::SessionLengthOutOfRange(session_length));
        }

        let break_length = request.break_length.unwrap_or(DEFAULT_BREAK_MINUTES);
        if break_length > 120 {
            return Err(PreferenceError::BreakLengthOutOfRange(break_length));
        }

        let preference = match request.preference.as_deref() {
            Some(value) => value.parse()?,
            None => TimePreference::default(),
        };

        let mut preferred_days = Vec::new();
        for day in &request.preferred_days {
            let weekday = day
                .trim()
                .parse::<Weekday>()
                .map_err(|_| PreferenceError::UnknownWeekday(day.clone()))?;
            if !preferred_days.contains(&weekday) {
                preferred_days.push(weekday);
            }
        }

        let focus_areas = request
            .focus_areas
            .into_iter()
            .map(|area| area.trim().to_string())
            .filter(|area| !area.is_empty())
            .collect();

        Ok(Self {
            subjects,
            hours,
            weeks,
            preference,
            session_length,
            break_length,
            preferred_days,
            focus_areas,
            exam_dates: non_blank(request.exam_dates),
            goals: non_blank(request.goals),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
