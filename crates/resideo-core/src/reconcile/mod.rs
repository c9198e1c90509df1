// ── Reconciliation loop ──
//
// One task per device. It waits on two things: the periodic pull timer
// and the device's ChangeBus. A bus wake-up starts a push cycle (debounce,
// send, confirm with a pull); a timer tick starts a pull cycle. Both run
// to completion before the loop looks at either source again, which is
// what keeps a device to one request in flight.

mod backoff;

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use resideo_api::{Error as ApiError, ErrorClass, TokenSource};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use backoff::RetryPolicy;

use crate::bus::ChangeBus;
use crate::cache::{ReconciliationState, StatusCache};
use crate::config::{DeviceSettings, PushFailurePolicy};
use crate::event::{DeviceEvent, DeviceEventKind};
use crate::model::{DeviceIdentity, IntentBatch};
use crate::profile::DeviceProfile;
use crate::remote::{PushRequest, RemoteDevice};

const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Detail that `logging = "debug"` promotes to info.
macro_rules! detail {
    ($self:ident, $($arg:tt)+) => {
        if $self.settings.logging.is_verbose() {
            info!($($arg)+);
        } else if !$self.settings.logging.is_quiet() {
            debug!($($arg)+);
        }
    };
}

/// Logged unless `logging = "none"`.
macro_rules! notice {
    ($self:ident, $level:ident, $($arg:tt)+) => {
        if !$self.settings.logging.is_quiet() {
            $level!($($arg)+);
        }
    };
}

enum PullOutcome {
    Done,
    Failed,
    /// A local change arrived while waiting to retry.
    Preempted,
}

enum Wake {
    Elapsed,
    Signalled,
}

/// Everything one device's loop needs. Owned by the spawned task.
pub(crate) struct ReconciliationLoop {
    pub(crate) identity: Arc<DeviceIdentity>,
    pub(crate) profile: Arc<DeviceProfile>,
    pub(crate) cache: Arc<StatusCache>,
    pub(crate) bus: Arc<ChangeBus>,
    pub(crate) remote: Arc<dyn RemoteDevice>,
    pub(crate) tokens: Arc<dyn TokenSource>,
    pub(crate) settings: DeviceSettings,
    pub(crate) events: broadcast::Sender<DeviceEvent>,
    pub(crate) cancel: CancellationToken,
}

impl ReconciliationLoop {
    pub(crate) async fn run(self) {
        let period = self.settings.refresh_interval.max(MIN_REFRESH_INTERVAL);
        let mut pull_timer = tokio::time::interval(period);
        pull_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        detail!(self, device = %self.identity, ?period, "reconciliation loop started");

        loop {
            self.cache.set_state(ReconciliationState::Idle);

            let flow = tokio::select! {
                biased;
                () = self.cancel.cancelled() => ControlFlow::Break(()),
                () = self.bus.wait() => {
                    let flow = self.push_cycle().await;
                    pull_timer.reset();
                    flow
                }
                _ = pull_timer.tick() => match self.pull_cycle(true).await {
                    ControlFlow::Break(()) => ControlFlow::Break(()),
                    ControlFlow::Continue(PullOutcome::Preempted) => {
                        let flow = self.push_cycle().await;
                        pull_timer.reset();
                        flow
                    }
                    ControlFlow::Continue(PullOutcome::Done) => {
                        // Intent that could not be pushed before the first pull.
                        if !self.cache.snapshot().pending().is_empty() {
                            self.bus.signal();
                        }
                        ControlFlow::Continue(())
                    }
                    ControlFlow::Continue(PullOutcome::Failed) => ControlFlow::Continue(()),
                },
            };

            if flow.is_break() {
                break;
            }
        }

        self.cache.set_state(ReconciliationState::Idle);
        detail!(self, device = %self.identity, "reconciliation loop stopped");
    }

    // ── Push ─────────────────────────────────────────────────────────

    async fn push_cycle(&self) -> ControlFlow<()> {
        self.debounce().await?;

        if self.cache.snapshot().remote().is_none() {
            // Payloads are built against the vendor state; fetch it first.
            match self.pull_cycle(false).await? {
                PullOutcome::Done => {}
                PullOutcome::Failed | PullOutcome::Preempted => return ControlFlow::Continue(()),
            }
        }

        let policy = self.push_policy();
        let mut attempt = 0u32;
        let mut refreshed = false;
        // Requests the vendor took during this cycle; never sent twice.
        let mut accepted: Vec<PushRequest> = Vec::new();

        loop {
            // Rebuilt on every attempt so edits made during a backoff ride
            // along with the retry.
            let Some(batch) = self.cache.take_batch() else {
                return ControlFlow::Continue(());
            };
            let snapshot = self.cache.snapshot();
            let Some(remote) = snapshot.remote() else {
                return ControlFlow::Continue(());
            };
            let requests: Vec<PushRequest> = self
                .profile
                .build_push(remote, &batch)
                .into_iter()
                .filter(|request| !accepted.contains(request))
                .collect();
            if requests.is_empty() {
                if accepted.is_empty() {
                    detail!(self, device = %self.identity, "intent already matches the device");
                    self.cache.commit_intent(&batch);
                    return ControlFlow::Continue(());
                }
                return self.confirm_push(&batch).await;
            }

            self.cache.set_state(ReconciliationState::PushInFlight);
            let mut failure = None;
            for request in requests {
                detail!(self, device = %self.identity, resource = request.resource(), ?request, "push");
                let outcome = self
                    .guarded(self.remote.push(&self.identity, &request))
                    .await?;
                match outcome {
                    Ok(()) => accepted.push(request),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            let Some(err) = failure else {
                return self.confirm_push(&batch).await;
            };

            let class = err.class();
            if class == ErrorClass::Auth && !refreshed {
                refreshed = true;
                if self.refresh_token().await {
                    continue;
                }
            }
            if class == ErrorClass::Fatal {
                self.abandon(&batch, &err);
                return ControlFlow::Continue(());
            }

            attempt += 1;
            if attempt >= policy.max_attempts {
                self.abandon(&batch, &err);
                return ControlFlow::Continue(());
            }

            let delay = retry_delay(&policy, attempt, &err);
            notice!(
                self,
                warn,
                device = %self.identity,
                attempt,
                error = %err,
                "push failed, retrying in {delay:?}"
            );
            self.backoff(attempt, delay, false).await?;
        }
    }

    /// Wait until no new change has arrived for one debounce window.
    async fn debounce(&self) -> ControlFlow<()> {
        self.cache.set_state(ReconciliationState::PushPending);
        let window = || {
            self.profile
                .debounce_window(self.settings.push_delay, self.cache.snapshot().pending())
        };
        let mut deadline = Instant::now() + window();

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return ControlFlow::Break(()),
                () = self.bus.wait() => deadline = Instant::now() + window(),
                () = tokio::time::sleep_until(deadline) => return ControlFlow::Continue(()),
            }
        }
    }

    /// The vendor accepted every request. The intent stays in the snapshot
    /// until a pull reports the new values or the pull budget runs out.
    async fn confirm_push(&self, batch: &IntentBatch) -> ControlFlow<()> {
        let fields = batch.characteristics();
        notice!(self, info, device = %self.identity, ?fields, "push accepted");
        self.emit(DeviceEventKind::PushSucceeded { fields });

        if let PullOutcome::Failed = self.pull_cycle(false).await? {
            notice!(
                self,
                warn,
                device = %self.identity,
                "change accepted but not confirmed, showing vendor state from the next pull"
            );
        }
        self.cache.commit_intent(batch);
        ControlFlow::Continue(())
    }

    fn abandon(&self, batch: &IntentBatch, err: &ApiError) {
        let fault = self.profile.push_failure() == PushFailurePolicy::Fault;
        self.cache.abandon_intent(batch, fault);
        let fields = batch.characteristics();
        error!(device = %self.identity, ?fields, error = %err, "push abandoned");
        self.emit(DeviceEventKind::PushAbandoned {
            fields,
            error: err.to_string(),
        });
    }

    // ── Pull ─────────────────────────────────────────────────────────

    async fn pull_cycle(&self, preemptible: bool) -> ControlFlow<(), PullOutcome> {
        let policy = self.pull_policy();
        let mut attempt = 0u32;
        let mut refreshed = false;

        loop {
            self.cache.set_state(ReconciliationState::PullInFlight);
            let err = match self
                .guarded(self.remote.pull(&self.identity, &self.profile))
                .await?
            {
                Ok(state) => {
                    self.cache.apply_remote(state);
                    detail!(self, device = %self.identity, "pulled");
                    self.emit(DeviceEventKind::Updated);
                    return ControlFlow::Continue(PullOutcome::Done);
                }
                Err(e) => e,
            };

            let class = err.class();
            if class == ErrorClass::Auth && !refreshed {
                refreshed = true;
                if self.refresh_token().await {
                    continue;
                }
            }

            attempt += 1;
            if class == ErrorClass::Fatal || attempt >= policy.max_attempts {
                notice!(
                    self,
                    warn,
                    device = %self.identity,
                    attempt,
                    error = %err,
                    "pull failed, keeping last known state"
                );
                self.emit(DeviceEventKind::PullFailed {
                    error: err.to_string(),
                });
                return ControlFlow::Continue(PullOutcome::Failed);
            }

            let delay = retry_delay(&policy, attempt, &err);
            detail!(self, device = %self.identity, attempt, error = %err, "pull failed, retrying in {delay:?}");
            if let Wake::Signalled = self.backoff(attempt, delay, preemptible).await? {
                return ControlFlow::Continue(PullOutcome::Preempted);
            }
        }
    }

    // ── Shared helpers ───────────────────────────────────────────────

    fn push_policy(&self) -> RetryPolicy {
        if self.settings.retry {
            self.settings.push_retry.clone()
        } else {
            RetryPolicy::once()
        }
    }

    fn pull_policy(&self) -> RetryPolicy {
        if self.settings.retry {
            self.settings.pull_retry.clone()
        } else {
            RetryPolicy::once()
        }
    }

    /// Sleep in `Backoff`. A preemptible wait also ends on a bus signal.
    async fn backoff(&self, attempt: u32, delay: Duration, preemptible: bool) -> ControlFlow<(), Wake> {
        let until = Instant::now() + delay;
        self.cache
            .set_state(ReconciliationState::Backoff { attempt, until });
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => ControlFlow::Break(()),
            () = self.bus.wait(), if preemptible => ControlFlow::Continue(Wake::Signalled),
            () = tokio::time::sleep_until(until) => ControlFlow::Continue(Wake::Elapsed),
        }
    }

    /// Run a request unless the device is torn down first; the result of a
    /// request that loses the race is discarded.
    async fn guarded<T>(&self, request: impl Future<Output = T>) -> ControlFlow<(), T> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => ControlFlow::Break(()),
            out = request => ControlFlow::Continue(out),
        }
    }

    async fn refresh_token(&self) -> bool {
        notice!(self, info, device = %self.identity, "access token rejected, refreshing");
        match self.tokens.refresh().await {
            Ok(()) => true,
            Err(e) => {
                error!(device = %self.identity, error = %e, "token refresh failed");
                false
            }
        }
    }

    fn emit(&self, kind: DeviceEventKind) {
        // No subscribers is fine.
        let _ = self
            .events
            .send(DeviceEvent::new(self.identity.device_id.clone(), kind));
    }
}

fn retry_delay(policy: &RetryPolicy, attempt: u32, err: &ApiError) -> Duration {
    if err.class() == ErrorClass::RateLimited {
        policy.rate_limited_delay(attempt, err.retry_after_secs().map(Duration::from_secs))
    } else {
        policy.delay(attempt)
    }
}
