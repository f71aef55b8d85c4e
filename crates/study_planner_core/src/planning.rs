//! crates/study_planner_core/src/planning.rs
//!
//! The client side of plan generation: clear upcoming sessions, ask the server
//! for a plan, create its sessions, then reconcile with what the server holds.
//!
//! None of this is transactional. Deletes run one at a time and failures are
//! only counted. Creates are dispatched together; a failed create leaves a
//! local-only session behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{NewStudySession, StudySession};
use crate::plan::AiGeneratedPlan;
use crate::ports::{PortError, SessionGateway};
use crate::preferences::PlanRequest;
use crate::store::{SessionStore, StoredSession, SyncState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupReport {
    pub deleted: usize,
    pub failed: usize,
}

impl CleanupReport {
    pub fn summary(&self) -> String {
        format!("{} deleted, {} failed", self.deleted, self.failed)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterializeReport {
    pub saved: Vec<StudySession>,
    pub local_only: Vec<StudySession>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A user-facing message, the equivalent of a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub hint: Option<String>,
}

impl Notification {
    fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            hint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// `None` when the server's sessions could not be loaded and nothing was cleared.
    pub cleanup: Option<CleanupReport>,
    pub materialized: MaterializeReport,
    /// False when the final re-fetch failed and the store still holds optimistic state.
    pub reconciled: bool,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, thiserror::Error)]
pub enum PlanGenerationError {
    #[error("A study plan is already being generated")]
    AlreadyRunning,
    #[error("Failed to generate study plan: {source}")]
    Request {
        cleanup: Option<CleanupReport>,
        #[source]
        source: PortError,
    },
}

impl PlanGenerationError {
    /// The error as a toast. A failed request still reports what cleanup did.
    pub fn notification(&self) -> Notification {
        let mut message = self.to_string();
        let hint = error_hint(&message).map(str::to_string);
        if let Self::Request { cleanup, .. } = self {
            match cleanup {
                Some(report) if report.deleted + report.failed > 0 => {
                    message.push_str(&format!(
                        ". Existing sessions were cleared first: {}",
                        report.summary()
                    ));
                }
                Some(_) => {}
                None => message.push_str(". Sessions could not be loaded, so none were cleared"),
            }
        }
        Notification {
            level: NotificationLevel::Error,
            hint,
            message,
        }
    }
}

/// Suggests what the user can do about a failed generation, keyed off the error text.
pub fn error_hint(message: &str) -> Option<&'static str> {
    let m = message.to_lowercase();
    if m.contains("truncated") || m.contains("too long") {
        Some("Try fewer subjects or fewer weeks so the plan fits in one response.")
    } else if m.contains("rate limit") || m.contains("429") {
        Some("The AI service is busy. Wait a minute and try again.")
    } else if m.contains("api key") || m.contains("401") {
        Some("The AI service is not configured correctly on the server.")
    } else if m.contains("timed out") || m.contains("timeout") {
        Some("The AI service took too long to respond. Try again later.")
    } else if m.contains("already being generated") {
        Some("Wait for the current plan to finish generating.")
    } else if m.contains("recover") || m.contains("parse") {
        Some("The AI returned an unexpected format. Try generating again.")
    } else {
        None
    }
}

/// Runs plan generation against a [`SessionGateway`] and keeps a [`SessionStore`] in step.
pub struct PlanGenerator<G> {
    gateway: G,
    store: Mutex<SessionStore>,
    running: AtomicBool,
}

/// Clears the running flag when a generation ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<G: SessionGateway> PlanGenerator<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            store: Mutex::new(SessionStore::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// A copy of the current local calendar.
    pub fn snapshot(&self) -> Vec<StoredSession> {
        self.store().entries().to_vec()
    }

    /// Replaces local state with the server's session list.
    pub async fn refresh(&self) -> Result<(), PortError> {
        let sessions = self.gateway.list_sessions().await?;
        self.store().reconcile(sessions);
        Ok(())
    }

    /// Deletes every session starting on `today` or later, one request at a time.
    ///
    /// Local-only sessions are dropped without a request and are not counted.
    pub async fn clear_upcoming(&self, today: NaiveDate) -> CleanupReport {
        let upcoming = self.store().from_date(today);
        let mut report = CleanupReport::default();

        for entry in upcoming {
            let id = entry.session.id;
            if entry.sync == SyncState::LocalOnly {
                self.store().remove(id);
                continue;
            }
            match self.gateway.delete_session(id).await {
                Ok(()) => {
                    self.store().remove(id);
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!(session_id = %id, "Failed to delete session: {}", e);
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Creates every session of `plan` concurrently and records the results locally.
    pub async fn materialize(&self, plan: &AiGeneratedPlan) -> MaterializeReport {
        let drafts: Vec<NewStudySession> = plan.flatten();
        let results = join_all(drafts.iter().map(|d| self.gateway.create_session(d))).await;

        let mut report = MaterializeReport::default();
        let mut store = self.store();
        for (draft, result) in drafts.into_iter().zip(results) {
            match result {
                Ok(saved) => {
                    store.upsert(saved.clone(), SyncState::Synced);
                    report.saved.push(saved);
                }
                Err(e) => {
                    warn!(
                        subject = %draft.subject,
                        "Failed to save session, keeping it locally: {}", e
                    );
                    let local = draft.into_session(Uuid::new_v4());
                    store.upsert(local.clone(), SyncState::LocalOnly);
                    report.local_only.push(local);
                }
            }
        }
        report
    }

    /// The full flow: clear upcoming sessions, request a plan, create it, reconcile.
    pub async fn generate(
        &self,
        request: &PlanRequest,
        today: NaiveDate,
    ) -> Result<GenerationOutcome, PlanGenerationError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PlanGenerationError::AlreadyRunning);
        }
        let _running = RunningGuard(&self.running);

        let mut notifications = Vec::new();

        // Cleanup only runs against a fresh server list; stale local ids are never deleted.
        let cleanup = match self.refresh().await {
            Ok(()) => {
                let report = self.clear_upcoming(today).await;
                info!(
                    deleted = report.deleted,
                    failed = report.failed,
                    "Cleared upcoming sessions"
                );
                if report.deleted + report.failed > 0 {
                    let level = if report.failed > 0 {
                        NotificationLevel::Warning
                    } else {
                        NotificationLevel::Info
                    };
                    notifications.push(Notification::new(
                        level,
                        format!("Cleared existing sessions: {}", report.summary()),
                    ));
                }
                Some(report)
            }
            Err(e) => {
                warn!("Could not load sessions before cleanup, skipping it: {}", e);
                notifications.push(Notification {
                    level: NotificationLevel::Warning,
                    message: "Could not load your sessions; upcoming ones were not cleared."
                        .to_string(),
                    hint: Some("The new plan may overlap sessions on your calendar.".to_string()),
                });
                None
            }
        };

        let plan = self
            .gateway
            .request_plan(request)
            .await
            .map_err(|source| PlanGenerationError::Request { cleanup, source })?;

        let materialized = self.materialize(&plan).await;
        notifications.push(materialize_notification(&materialized));

        let reconciled = match self.refresh().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not re-fetch sessions after generation: {}", e);
                notifications.push(Notification::new(
                    NotificationLevel::Warning,
                    "Could not reload your calendar from the server; showing local changes.",
                ));
                false
            }
        };

        Ok(GenerationOutcome {
            cleanup,
            materialized,
            reconciled,
            notifications,
        })
    }

    fn store(&self) -> MutexGuard<'_, SessionStore> {
        // Store updates cannot panic midway; a poisoned lock is still consistent.
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn materialize_notification(report: &MaterializeReport) -> Notification {
    let saved = report.saved.len();
    let local = report.local_only.len();
    if local == 0 {
        Notification::new(
            NotificationLevel::Success,
            format!("Study plan created: {saved} sessions saved"),
        )
    } else {
        Notification {
            level: NotificationLevel::Warning,
            message: format!(
                "Study plan created: {saved} sessions saved to the server, {local} kept on this device only"
            ),
            hint: Some("Sessions kept on this device disappear when you reload.".to_string()),
        }
    }
}
