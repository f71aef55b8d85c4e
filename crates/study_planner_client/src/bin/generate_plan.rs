//! crates/study_planner_client/src/bin/generate_plan.rs
//!
//! Runs the full plan generation flow against a running API: clear upcoming
//! sessions, request a plan, create its sessions and reconcile the calendar.
//!
//! Usage: `generate-plan <preferences.json>`

use chrono::Utc;
use study_planner_client::{ClientConfig, HttpSessionGateway};
use study_planner_core::{
    planning::NotificationLevel, store::SyncState, Notification, PlanGenerator, PlanRequest,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn report(notification: &Notification) {
    let hint = notification.hint.as_deref().unwrap_or("");
    match notification.level {
        NotificationLevel::Success | NotificationLevel::Info => {
            info!(hint, "{}", notification.message)
        }
        NotificationLevel::Warning => warn!(hint, "{}", notification.message),
        NotificationLevel::Error => error!(hint, "{}", notification.message),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: generate-plan <preferences.json>")?;
    let raw = tokio::fs::read_to_string(&path).await?;
    let request: PlanRequest = serde_json::from_str(&raw)?;

    let config = ClientConfig::from_lookup(|key| std::env::var(key).ok())?;
    info!(server = %config.base_url, subjects = request.subjects.len(), "Generating study plan");
    let generator = PlanGenerator::new(HttpSessionGateway::new(config)?);

    match generator.generate(&request, Utc::now().date_naive()).await {
        Ok(outcome) => {
            outcome.notifications.iter().for_each(report);
            for entry in generator.snapshot() {
                let session = &entry.session;
                let marker = match entry.sync {
                    SyncState::Synced => "",
                    SyncState::LocalOnly => " (local only)",
                };
                println!(
                    "{}  {} - {}  {}{}",
                    session.start_time.format("%a %Y-%m-%d"),
                    session.start_time.format("%H:%M"),
                    session.end_time.format("%H:%M"),
                    session.subject,
                    marker
                );
            }
            Ok(())
        }
        Err(e) => {
            report(&e.notification());
            Err(e.into())
        }
    }
}
