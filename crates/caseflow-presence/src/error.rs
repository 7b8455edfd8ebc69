use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresenceError {
    #[error("presence task failed: {0}")]
    TaskJoin(String),
}
