//! crates/study_planner_core/src/domain.rs
//!
//! Defines the core data structures shared by the service and the client.
//! Records that travel over the HTTP API derive serde with the camelCase
//! field names the API uses; storage details stay in the adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Users & Auth
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

//=========================================================================================
// Study Sessions
//=========================================================================================

/// Lifecycle state of a study session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    Completed,
    Missed,
    Deleted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Completed => "completed",
            SessionStatus::Missed => "missed",
            SessionStatus::Deleted => "deleted",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(SessionStatus::Scheduled),
            "completed" => Ok(SessionStatus::Completed),
            "missed" => Ok(SessionStatus::Missed),
            "deleted" => Ok(SessionStatus::Deleted),
            other => Err(SessionError::UnknownStatus(other.to_string())),
        }
    }
}

/// A single scheduled block of study time on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: Uuid,
    pub subject: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(rename = "isAIGenerated", default)]
    pub is_ai_generated: bool,
}

/// Errors raised when a session violates its invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Subject must not be empty")]
    EmptySubject,
    #[error("End time must be after start time")]
    InvalidTimeRange,
    #[error("Progress must be between 0 and 100, got {0}")]
    ProgressOutOfRange(u32),
    #[error("Unknown session status '{0}'")]
    UnknownStatus(String),
}

/// The fields needed to create a session. The id is assigned by whoever persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudySession {
    pub subject: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(rename = "isAIGenerated", default)]
    pub is_ai_generated: bool,
}

impl NewStudySession {
    /// Checks the session invariants and trims the subject.
    pub fn validated(mut self) -> Result<Self, SessionError> {
        self.subject = self.subject.trim().to_string();
        check_session_fields(&self.subject, self.start_time, self.end_time, self.progress)?;
        Ok(self)
    }

    pub fn into_session(self, id: Uuid) -> StudySession {
        StudySession {
            id,
            subject: self.subject,
            start_time: self.start_time,
            end_time: self.end_time,
            description: self.description,
            status: self.status,
            progress: self.progress,
            is_ai_generated: self.is_ai_generated,
        }
    }
}

/// A partial update to an existing session. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub subject: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub status: Option<SessionStatus>,
    pub progress: Option<u8>,
}

impl SessionUpdate {
    /// Applies the update to a copy of `session`, re-checking every invariant.
    ///
    /// Marking a session completed without naming a progress value sets it to 100.
    pub fn apply_to(&self, session: &StudySession) -> Result<StudySession, SessionError> {
        let mut updated = session.clone();
        if let Some(subject) = &self.subject {
            updated.subject = subject.trim().to_string();
        }
        if let Some(start_time) = self.start_time {
            updated.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            updated.end_time = end_time;
        }
        if let Some(description) = &self.description {
            updated.description = description.clone();
        }
        if let Some(status) = self.status {
            updated.status = status;
            if status == SessionStatus::Completed && self.progress.is_none() {
                updated.progress = 100;
            }
        }
        if let Some(progress) = self.progress {
            updated.progress = progress;
        }
        check_session_fields(
            &updated.subject,
            updated.start_time,
            updated.end_time,
            updated.progress,
        )?;
        Ok(updated)
    }
}

fn check_session_fields(
    subject: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    progress: u8,
) -> Result<(), SessionError> {
    if subject.trim().is_empty() {
        return Err(SessionError::EmptySubject);
    }
    if end_time <= start_time {
        return Err(SessionError::InvalidTimeRange);
    }
    if progress > 100 {
        return Err(SessionError::ProgressOutOfRange(u32::from(progress)));
    }
    Ok(())
}

//=========================================================================================
// Study Plan
//=========================================================================================

/// The per-user container for sessions. Created lazily on first session fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub weekly_goal: u32,
    pub subjects: Vec<String>,
    pub sessions: Vec<StudySession>,
}

/// Editable plan metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub weekly_goal: Option<u32>,
    pub subjects: Option<Vec<String>>,
}

//=========================================================================================
// Notes & Subjects
//=========================================================================================

/// An uploaded study file and its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub title: String,
    pub file_url: String,
    /// Key of the object in file storage.
    pub public_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A subject summary derived from notes and sessions. Never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub name: String,
    pub color: &'static str,
    pub documents_count: usize,
    pub progress: u8,
}

const SUBJECT_PALETTE: [&str; 8] = [
    "#4F46E5", "#059669", "#DC2626", "#D97706", "#7C3AED", "#0891B2", "#DB2777", "#65A30D",
];

/// Picks a stable colour for a subject name.
pub fn subject_color(name: &str) -> &'static str {
    let hash = name
        .to_lowercase()
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(usize::from(b)));
    SUBJECT_PALETTE[hash % SUBJECT_PALETTE.len()]
}

/// Derives subject summaries from a user's notes and sessions.
///
/// Names are matched case-insensitively; the first spelling seen wins.
/// Progress is the rounded mean progress of the subject's sessions.
pub fn derive_subjects(notes: &[Note], sessions: &[StudySession]) -> Vec<Subject> {
    struct Tally {
        name: String,
        documents: usize,
        progress_sum: u32,
        session_count: u32,
    }

    fn tally_for(tallies: &mut Vec<Tally>, name: &str) -> usize {
        let key = name.trim();
        if let Some(i) = tallies.iter().position(|t| t.name.eq_ignore_ascii_case(key)) {
            return i;
        }
        tallies.push(Tally {
            name: key.to_string(),
            documents: 0,
            progress_sum: 0,
            session_count: 0,
        });
        tallies.len() - 1
    }

    let mut tallies: Vec<Tally> = Vec::new();
    for note in notes {
        let i = tally_for(&mut tallies, &note.subject);
        tallies[i].documents += 1;
    }
    for session in sessions {
        let i = tally_for(&mut tallies, &session.subject);
        tallies[i].progress_sum += u32::from(session.progress);
        tallies[i].session_count += 1;
    }

    let mut subjects: Vec<Subject> = tallies
        .into_iter()
        .filter(|t| !t.name.is_empty())
        .map(|t| {
            let progress = if t.session_count == 0 {
                0
            } else {
                ((t.progress_sum + t.session_count / 2) / t.session_count).min(100) as u8
            };
            Subject {
                color: subject_color(&t.name),
                name: t.name,
                documents_count: t.documents,
                progress,
            }
        })
        .collect();
    subjects.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    subjects
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(subject: &str, hour: u32, progress: u8) -> StudySession {
        StudySession {
            id: Uuid::new_v4(),
            subject: subject.to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 1, 27, hour, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 1, 27, hour + 1, 0, 0).unwrap(),
            description: String::new(),
            status: SessionStatus::Scheduled,
            progress,
            is_ai_generated: false,
        }
    }

    fn note(subject: &str) -> Note {
        Note {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            subject: subject.to_string(),
            title: "Lecture 1".to_string(),
            file_url: "http://localhost/uploads/a.pdf".to_string(),
            public_id: "a.pdf".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn new_session_rejects_inverted_range() {
        let start = Utc.with_ymd_and_hms(2025, 1, 27, 10, 0, 0).unwrap();
        let new = NewStudySession {
            subject: "Math".to_string(),
            start_time: start,
            end_time: start,
            description: String::new(),
            status: SessionStatus::Scheduled,
            progress: 0,
            is_ai_generated: false,
        };
        assert_eq!(new.validated(), Err(SessionError::InvalidTimeRange));
    }

    #[test]
    fn new_session_rejects_blank_subject() {
        let mut new = NewStudySession {
            subject: "   ".to_string(),
            start_time: Utc.with_ymd_and_hms(2025, 1, 27, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 1, 27, 10, 0, 0).unwrap(),
            description: String::new(),
            status: SessionStatus::Scheduled,
            progress: 0,
            is_ai_generated: false,
        };
        assert_eq!(new.clone().validated(), Err(SessionError::EmptySubject));
        new.subject = "  Math ".to_string();
        assert_eq!(new.validated().unwrap().subject, "Math");
    }

    #[test]
    fn completing_a_session_fills_progress() {
        let original = session("Math", 9, 30);
        let update = SessionUpdate {
            status: Some(SessionStatus::Completed),
            ..Default::default()
        };
        let updated = update.apply_to(&original).unwrap();
        assert_eq!(updated.status, SessionStatus::Completed);
        assert_eq!(updated.progress, 100);

        let explicit = SessionUpdate {
            status: Some(SessionStatus::Completed),
            progress: Some(80),
            ..Default::default()
        };
        assert_eq!(explicit.apply_to(&original).unwrap().progress, 80);
    }

    #[test]
    fn update_rechecks_invariants() {
        let original = session("Math", 9, 0);
        let update = SessionUpdate {
            end_time: Some(original.start_time),
            ..Default::default()
        };
        assert_eq!(update.apply_to(&original), Err(SessionError::InvalidTimeRange));

        let too_much = SessionUpdate {
            progress: Some(120),
            ..Default::default()
        };
        assert_eq!(
            too_much.apply_to(&original),
            Err(SessionError::ProgressOutOfRange(120))
        );
    }

    #[test]
    fn session_serializes_with_api_field_names() {
        let json = serde_json::to_value(session("Math", 9, 0)).unwrap();
        assert!(json.get("startTime").is_some());
        assert!(json.get("isAIGenerated").is_some());
        assert_eq!(json["status"], "scheduled");
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Completed".parse::<SessionStatus>(), Ok(SessionStatus::Completed));
        assert!(matches!(
            "later".parse::<SessionStatus>(),
            Err(SessionError::UnknownStatus(_))
        ));
    }

    #[test]
    fn subjects_merge_notes_and_sessions() {
        let notes = vec![note("Physics"), note("physics"), note("Chemistry")];
        let sessions = vec![
            session("Physics", 9, 50),
            session("Physics", 11, 100),
            session("Math", 13, 0),
        ];

        let subjects = derive_subjects(&notes, &sessions);
        let names: Vec<&str> = subjects.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Chemistry", "Math", "Physics"]);

        let physics = &subjects[2];
        assert_eq!(physics.documents_count, 2);
        assert_eq!(physics.progress, 75);
        assert_eq!(physics.color, subject_color("physics"));
        assert_eq!(subjects[0].progress, 0);
    }
}
