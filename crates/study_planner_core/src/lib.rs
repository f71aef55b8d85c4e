pub mod domain;
pub mod plan;
pub mod planning;
pub mod ports;
pub mod preferences;
pub mod prompt;
pub mod quiz;
pub mod repair;
pub mod store;

pub use domain::{
    NewStudySession, Note, PlanDetails, SessionError, SessionStatus, SessionUpdate,
    StudyPlan, StudySession, Subject, User, UserCredentials,
};
pub use plan::AiGeneratedPlan;
pub use planning::{GenerationOutcome, Notification, PlanGenerationError, PlanGenerator};
pub use ports::{
    CompletionService, DatabaseService, FileStorage, PortError, PortResult, SessionGateway,
    StoredFile,
};
pub use preferences::{PlanPreferences, PlanRequest, PreferenceError};
pub use repair::{parse_plan_response, PlanParseError, RepairStage};
