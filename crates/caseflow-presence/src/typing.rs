use std::sync::Arc;
use std::time::Duration;

use caseflow_core::PresenceBackend;
use caseflow_domain::RequestId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::debug;

use crate::error::PresenceError;

pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(2_500);

/// Composer inputs that decide whether this user is typing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposerState {
    pub focused: bool,
    /// Workspace is loading or uploading.
    pub busy: bool,
    pub draft: String,
}

impl ComposerState {
    pub fn is_typing_active(&self) -> bool {
        self.focused && !self.busy && !self.draft.trim().is_empty()
    }
}

/// Emits `typing: true` on activation and then every heartbeat, and a single
/// `typing: false` when the composer stops qualifying or the signaler goes away.
/// Failed signals are logged at debug level and otherwise ignored. A signal that takes
/// longer than one heartbeat is abandoned so a slow endpoint cannot hold back the
/// next one.
pub struct TypingSignaler {
    state_tx: watch::Sender<ComposerState>,
    task: JoinHandle<()>,
}

impl TypingSignaler {
    pub fn spawn(
        backend: Arc<dyn PresenceBackend>,
        request_id: RequestId,
        heartbeat: Duration,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ComposerState::default());
        let task = tokio::spawn(run_heartbeat(backend, request_id, heartbeat, state_rx));
        Self { state_tx, task }
    }

    pub fn update(&self, state: ComposerState) {
        self.state_tx.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    pub fn set_focused(&self, focused: bool) {
        self.modify(|state| state.focused = focused);
    }

    pub fn set_busy(&self, busy: bool) {
        self.modify(|state| state.busy = busy);
    }

    pub fn set_draft(&self, draft: impl Into<String>) {
        let draft = draft.into();
        self.modify(|state| state.draft = draft);
    }

    pub fn state(&self) -> ComposerState {
        self.state_tx.borrow().clone()
    }

    /// Sends the closing `typing: false` if needed and waits for the task to end.
    pub async fn shutdown(self) -> Result<(), PresenceError> {
        let Self { state_tx, task } = self;
        drop(state_tx);
        task.await
            .map_err(|error| PresenceError::TaskJoin(format!("typing signaler: {error}")))
    }

    fn modify(&self, apply: impl FnOnce(&mut ComposerState)) {
        self.state_tx.send_if_modified(|state| {
            let before = state.clone();
            apply(state);
            *state != before
        });
    }
}

async fn run_heartbeat(
    backend: Arc<dyn PresenceBackend>,
    request_id: RequestId,
    heartbeat: Duration,
    mut state_rx: watch::Receiver<ComposerState>,
) {
    let mut ticker = interval_at(Instant::now() + heartbeat, heartbeat);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut active = false;

    loop {
        tokio::select! {
            biased;
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_active = state_rx.borrow_and_update().is_typing_active();
                if now_active == active {
                    continue;
                }
                active = now_active;
                if active {
                    ticker.reset();
                }
                signal(backend.as_ref(), &request_id, active, heartbeat).await;
            }
            _ = ticker.tick(), if active => {
                signal(backend.as_ref(), &request_id, true, heartbeat).await;
            }
        }
    }

    if active {
        signal(backend.as_ref(), &request_id, false, heartbeat).await;
    }
}

async fn signal(
    backend: &dyn PresenceBackend,
    request_id: &RequestId,
    typing: bool,
    limit: Duration,
) {
    match timeout(limit, backend.signal_typing(request_id, typing)).await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => debug!(
            request_id = %request_id,
            typing,
            error = %error,
            "typing signal dropped"
        ),
        Err(_) => debug!(
            request_id = %request_id,
            typing,
            timeout_ms = limit.as_millis() as u64,
            "typing signal timed out"
        ),
    }
}
