//! Publish session supervision

pub mod supervisor;

pub use supervisor::{IngestSupervisor, SessionHandle, SessionTasks};

/// Generate an unguessable stream key for a newly created stream
///
/// The key is what binds a publisher connection to its stream record, so it
/// doubles as a bearer credential.
pub fn generate_stream_key() -> String {
    format!("live_{}", uuid::Uuid::new_v4())
}
