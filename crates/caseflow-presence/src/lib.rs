//! Live-activity plumbing for the request workspace: the presence poller and the
//! typing heartbeat. Both only feed display state.

pub mod backoff;
pub mod cursor;
pub mod error;
pub mod poller;
pub mod typing;

pub use backoff::BackoffPolicy;
pub use cursor::ActivityCursor;
pub use error::PresenceError;
pub use poller::{ConnectionMode, PresencePoller, PresenceSnapshot};
pub use typing::{ComposerState, TypingSignaler, DEFAULT_HEARTBEAT};
