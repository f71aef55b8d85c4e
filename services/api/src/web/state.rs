//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use study_planner_core::ports::{CompletionService, DatabaseService, FileStorage};
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub completion: Arc<dyn CompletionService>,
    pub storage: Arc<dyn FileStorage>,
    pub generations: Arc<GenerationGuard>,
}

impl AppState {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        config: Arc<Config>,
        completion: Arc<dyn CompletionService>,
        storage: Arc<dyn FileStorage>,
    ) -> Self {
        Self {
            db,
            config,
            completion,
            storage,
            generations: Arc::new(GenerationGuard::default()),
        }
    }
}

//=========================================================================================
// Per-User Generation Guard
//=========================================================================================

/// Tracks which users currently have a plan generation in flight.
#[derive(Debug, Default)]
pub struct GenerationGuard {
    in_flight: Mutex<HashSet<Uuid>>,
}

/// Held for the duration of one generation; releases the user's slot on drop.
#[derive(Debug)]
pub struct GenerationPermit<'a> {
    guard: &'a GenerationGuard,
    user_id: Uuid,
}

impl GenerationGuard {
    /// Claims the user's slot, or returns `None` if a generation is already running.
    pub fn try_acquire(&self, user_id: Uuid) -> Option<GenerationPermit<'_>> {
        if !self.users().insert(user_id) {
            return None;
        }
        Some(GenerationPermit {
            guard: self,
            user_id,
        })
    }

    pub fn is_running(&self, user_id: Uuid) -> bool {
        self.users().contains(&user_id)
    }

    fn users(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for GenerationPermit<'_> {
    fn drop(&mut self) {
        self.guard.users().remove(&self.user_id);
    }
}
