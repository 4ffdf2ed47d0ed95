// Per-upload session workspaces: allocation, isolation, reclamation
pub mod reaper;
pub mod store;

pub use store::{SessionError, SessionStore, UploadSession};

/// Fixed logical name of the uploaded document inside a workspace.
pub const SOURCE_NAME: &str = "source.pdf";
/// Fixed logical name of the persisted extraction output.
pub const RESULT_TEXT_NAME: &str = "extracted.txt";
/// Fixed logical name of the JSON extraction record.
pub const RESULT_RECORD_NAME: &str = "result.json";
