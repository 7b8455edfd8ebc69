use std::sync::Arc;

use caseflow_core::{PresenceBackend, WorkflowError};
use caseflow_domain::{LivenessResponse, RequestId, TypingPeer};
use tokio::sync::{oneshot, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::cursor::ActivityCursor;
use crate::error::PresenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    #[default]
    Online,
    Degraded,
}

/// What the chat view renders. Never feeds back into workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PresenceSnapshot {
    pub request_id: Option<RequestId>,
    pub mode: ConnectionMode,
    pub cursor: Option<String>,
    pub typing_peers: Vec<TypingPeer>,
    pub consecutive_failures: u32,
    /// Bumped every time the cursor advances, so views know new activity arrived.
    pub activity_generation: u64,
    pub in_flight: bool,
}

#[derive(Debug)]
struct PollerState {
    request_id: RequestId,
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Short-poll loop for one workspace session.
///
/// One task per viewed request. Probes run strictly one after another; a nudge or a
/// visibility change can pull the next probe forward but never overlaps it with the
/// current one, and never cuts short the wait after a failed probe.
pub struct PresencePoller {
    backend: Arc<dyn PresenceBackend>,
    policy: BackoffPolicy,
    snapshot_tx: watch::Sender<PresenceSnapshot>,
    visibility_tx: watch::Sender<bool>,
    nudge: Arc<Notify>,
    session: Mutex<Option<PollerState>>,
}

impl PresencePoller {
    pub fn new(backend: Arc<dyn PresenceBackend>, policy: BackoffPolicy) -> Self {
        let (snapshot_tx, _) = watch::channel(PresenceSnapshot::default());
        let (visibility_tx, _) = watch::channel(true);
        Self {
            backend,
            policy,
            snapshot_tx,
            visibility_tx,
            nudge: Arc::new(Notify::new()),
            session: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PresenceSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> PresenceSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Becoming visible triggers an immediate probe unless the last probe failed;
    /// becoming hidden only stretches the delay after the next probe.
    pub fn set_visible(&self, visible: bool) {
        self.visibility_tx.send_if_modified(|current| {
            let changed = *current != visible;
            *current = visible;
            changed
        });
    }

    /// Asks for an early probe, e.g. right after posting a message. Ignored while the
    /// endpoint is failing.
    pub fn nudge(&self) {
        self.nudge.notify_one();
    }

    pub async fn active_request(&self) -> Option<RequestId> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|state| state.request_id.clone())
    }

    /// Starts polling `request_id`. Switching to another request tears the old
    /// session down and re-seeds the cursor; starting the same request twice is a
    /// no-op.
    pub async fn start(
        &self,
        request_id: RequestId,
        seed: ActivityCursor,
    ) -> Result<(), PresenceError> {
        let mut guard = self.session.lock().await;
        if guard
            .as_ref()
            .is_some_and(|state| state.request_id == request_id)
        {
            return Ok(());
        }
        if let Some(previous) = guard.take() {
            self.shutdown(previous).await?;
        }

        self.snapshot_tx.send_replace(PresenceSnapshot {
            request_id: Some(request_id.clone()),
            cursor: seed.value().map(str::to_owned),
            ..PresenceSnapshot::default()
        });

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let probe_loop = ProbeLoop {
            backend: Arc::clone(&self.backend),
            policy: self.policy,
            request_id: request_id.clone(),
            cursor: seed,
            consecutive_failures: 0,
            snapshot_tx: self.snapshot_tx.clone(),
            visibility_rx: self.visibility_tx.subscribe(),
            nudge: Arc::clone(&self.nudge),
        };
        let task = tokio::spawn(probe_loop.run(stop_rx));

        *guard = Some(PollerState {
            request_id,
            stop_tx: Some(stop_tx),
            task,
        });
        Ok(())
    }

    /// Cancels the pending probe and resets everything the view shows. A probe that
    /// is still outstanding is dropped and its result never published.
    pub async fn stop(&self) -> Result<(), PresenceError> {
        let state = {
            let mut guard = self.session.lock().await;
            guard.take()
        };
        match state {
            Some(state) => self.shutdown(state).await,
            None => Ok(()),
        }
    }

    async fn shutdown(&self, mut state: PollerState) -> Result<(), PresenceError> {
        if let Some(stop_tx) = state.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        let joined = state.task.await;
        self.snapshot_tx.send_replace(PresenceSnapshot::default());
        joined.map_err(|error| {
            PresenceError::TaskJoin(format!(
                "presence poller for request {} failed to join: {error}",
                state.request_id
            ))
        })
    }
}

struct ProbeLoop {
    backend: Arc<dyn PresenceBackend>,
    policy: BackoffPolicy,
    request_id: RequestId,
    cursor: ActivityCursor,
    consecutive_failures: u32,
    snapshot_tx: watch::Sender<PresenceSnapshot>,
    visibility_rx: watch::Receiver<bool>,
    nudge: Arc<Notify>,
}

impl ProbeLoop {
    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) {
        let mut next_probe_at = Instant::now();
        loop {
            let early = tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                _ = sleep_until(next_probe_at) => false,
                _ = self.nudge.notified() => true,
                changed = self.visibility_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if !*self.visibility_rx.borrow_and_update() {
                        continue;
                    }
                    true
                }
            };
            // A failing endpoint keeps its full backoff window.
            if early && self.consecutive_failures > 0 && Instant::now() < next_probe_at {
                debug!(
                    request_id = %self.request_id,
                    consecutive_failures = self.consecutive_failures,
                    "early presence probe held back by failure backoff"
                );
                continue;
            }

            self.snapshot_tx
                .send_modify(|snapshot| snapshot.in_flight = true);
            let cursor = self.cursor.value().map(str::to_owned);
            let result = tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                result = self.backend.probe_liveness(&self.request_id, cursor.as_deref()) => result,
            };

            let visible = *self.visibility_rx.borrow();
            match result {
                Ok(response) => self.record_success(response),
                Err(error) => self.record_failure(&error, visible),
            }
            let delay = self.policy.next_delay(visible, self.consecutive_failures);
            next_probe_at = Instant::now() + delay;
        }
    }

    fn record_success(&mut self, response: LivenessResponse) {
        if self.consecutive_failures > 0 {
            info!(
                request_id = %self.request_id,
                consecutive_failures = self.consecutive_failures,
                "presence probe recovered"
            );
        }
        self.consecutive_failures = 0;
        let advanced = self.cursor.advance(response.cursor.as_deref());
        let cursor = self.cursor.value().map(str::to_owned);
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.mode = ConnectionMode::Online;
            snapshot.consecutive_failures = 0;
            snapshot.typing_peers = response.typing;
            snapshot.cursor = cursor;
            snapshot.in_flight = false;
            if advanced {
                snapshot.activity_generation += 1;
            }
        });
    }

    fn record_failure(&mut self, error: &WorkflowError, visible: bool) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let failures = self.consecutive_failures;
        let degraded = self.policy.is_degraded(failures);
        let delay = self.policy.next_delay(visible, failures);
        warn!(
            request_id = %self.request_id,
            consecutive_failures = failures,
            retry_in_ms = delay.as_millis() as u64,
            degraded,
            error = %error,
            "presence probe failed"
        );
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.consecutive_failures = failures;
            snapshot.in_flight = false;
            if degraded {
                snapshot.mode = ConnectionMode::Degraded;
            }
        });
    }
}
