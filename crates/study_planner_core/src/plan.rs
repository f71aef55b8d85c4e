//! crates/study_planner_core/src/plan.rs
//!
//! The structured plan the model is asked to produce, before it is flattened
//! into individual study sessions.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{NewStudySession, SessionStatus};

/// A generated plan: weeks of proposed sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiGeneratedPlan {
    pub weeks: Vec<PlanWeek>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanWeek {
    #[serde(default)]
    pub week_number: u32,
    #[serde(default)]
    pub sessions: Vec<PlannedSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedSession {
    pub subject: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_learning_style")]
    pub learning_style: String,
}

fn default_learning_style() -> String {
    "balanced".to_string()
}

/// Accepts RFC 3339 timestamps and zone-less ISO timestamps, the latter read as UTC.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("'{raw}' is not an ISO 8601 timestamp"))
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Structural problems that make a syntactically valid plan unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanSchemaError {
    #[error("plan contains no weeks")]
    NoWeeks,
    #[error("plan contains no sessions")]
    NoSessions,
    #[error("session {index} in week {week} has an empty subject")]
    EmptySubject { week: u32, index: usize },
    #[error("session {index} in week {week} ends before it starts")]
    InvalidTimeRange { week: u32, index: usize },
}

impl AiGeneratedPlan {
    /// Rejects plans that parse but could not be scheduled.
    pub fn validate(&self) -> Result<(), PlanSchemaError> {
        if self.weeks.is_empty() {
            return Err(PlanSchemaError::NoWeeks);
        }
        if self.session_count() == 0 {
            return Err(PlanSchemaError::NoSessions);
        }
        for week in &self.weeks {
            for (index, session) in week.sessions.iter().enumerate() {
                if session.subject.trim().is_empty() {
                    return Err(PlanSchemaError::EmptySubject {
                        week: week.week_number,
                        index,
                    });
                }
                if session.end_time <= session.start_time {
                    return Err(PlanSchemaError::InvalidTimeRange {
                        week: week.week_number,
                        index,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.weeks.iter().map(|w| w.sessions.len()).sum()
    }

    /// Flattens the plan into session drafts, in week order then session order.
    pub fn flatten(&self) -> Vec<NewStudySession> {
        self.weeks
            .iter()
            .flat_map(|week| week.sessions.iter())
            .map(|planned| NewStudySession {
                subject: planned.subject.trim().to_string(),
                start_time: planned.start_time,
                end_time: planned.end_time,
                description: planned.description.clone(),
                status: SessionStatus::Scheduled,
                progress: 0,
                is_ai_generated: true,
            })
            .collect()
    }

    /// Subjects in the plan that were not part of the request.
    pub fn unknown_subjects<'a>(&'a self, requested: &[String]) -> Vec<&'a str> {
        let mut unknown: Vec<&str> = Vec::new();
        for session in self.weeks.iter().flat_map(|w| w.sessions.iter()) {
            let subject = session.subject.trim();
            if !requested.iter().any(|r| r == subject) && !unknown.contains(&subject) {
                unknown.push(subject);
            }
        }
        unknown
    }
}
