pub mod api;
pub mod session;

pub use api::{ApiError, ExportFormat, HttpApi, ImportOutcome, Persistence, TaskDraft};
pub use session::{MutationError, SaveStatus, Session};
