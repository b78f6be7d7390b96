pub mod database;
pub mod export;
pub mod orchestrator;
pub mod persistence;
pub mod session;
pub mod settings;

pub use database::Database;
pub use orchestrator::{Orchestrator, RejectReason, SubmitOutcome};
pub use persistence::PersistenceAdapter;
pub use session::{SessionHandle, SessionStore};
pub use settings::SettingsService;
