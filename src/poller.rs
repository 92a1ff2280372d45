//! Task status polling.
//!
//! The poller owns a single timer that runs only while the session is
//! approved and the store holds at least one active task. Each tick fetches
//! the full task list, diffs it against the previous snapshot and replaces
//! the store. At most one fetch is in flight; a tick or manual refresh that
//! finds one running is dropped.

use crate::error::ApiError;
use crate::fetcher::{CreditSource, StatusFetcher};
use crate::reconciler::Reconciler;
use crate::session::SessionStatus;
use crate::store::AppStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotApproved,
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Skipped(SkipReason),
    /// The fetch failed; the store was left as it was.
    Failed,
    Applied { credits_refreshed: bool },
}

type SessionRejectedHook = Box<dyn Fn(&ApiError) + Send + Sync>;

struct Inner {
    fetcher: Arc<dyn StatusFetcher>,
    credits: Arc<dyn CreditSource>,
    store: AppStore,
    session: watch::Receiver<SessionStatus>,
    interval: Duration,
    in_flight: AtomicBool,
    reconciler: Mutex<Reconciler>,
    phase: watch::Sender<PollPhase>,
    on_session_rejected: Option<SessionRejectedHook>,
}

pub struct PollerBuilder {
    fetcher: Arc<dyn StatusFetcher>,
    credits: Arc<dyn CreditSource>,
    store: AppStore,
    session: watch::Receiver<SessionStatus>,
    interval: Duration,
    on_session_rejected: Option<SessionRejectedHook>,
}

impl PollerBuilder {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Called when a poll is rejected because the session token is no
    /// longer valid or the account is no longer approved.
    pub fn on_session_rejected(
        mut self,
        hook: impl Fn(&ApiError) + Send + Sync + 'static,
    ) -> Self {
        self.on_session_rejected = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Poller {
        let (phase, _) = watch::channel(PollPhase::Idle);
        Poller {
            inner: Arc::new(Inner {
                fetcher: self.fetcher,
                credits: self.credits,
                store: self.store,
                session: self.session,
                interval: self.interval,
                in_flight: AtomicBool::new(false),
                reconciler: Mutex::new(Reconciler::new()),
                phase,
                on_session_rejected: self.on_session_rejected,
            }),
        }
    }
}

#[derive(Clone)]
pub struct Poller {
    inner: Arc<Inner>,
}

impl Poller {
    pub fn builder(
        fetcher: Arc<dyn StatusFetcher>,
        credits: Arc<dyn CreditSource>,
        store: AppStore,
        session: watch::Receiver<SessionStatus>,
    ) -> PollerBuilder {
        PollerBuilder {
            fetcher,
            credits,
            store,
            session,
            interval: DEFAULT_POLL_INTERVAL,
            on_session_rejected: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn phase(&self) -> PollPhase {
        *self.inner.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<PollPhase> {
        self.inner.phase.subscribe()
    }

    /// Performs one fetch now, whatever the timer state.
    pub async fn refresh_now(&self) -> PollOutcome {
        let status = *self.inner.session.borrow();
        if !status.is_approved() {
            return PollOutcome::Skipped(SkipReason::NotApproved);
        }

        let Some(guard) = InFlightGuard::acquire(&self.inner.in_flight) else {
            debug!("fetch already in flight, skipping");
            return PollOutcome::Skipped(SkipReason::InFlight);
        };

        debug!("fetching tasks");
        let fetched = match self.inner.fetcher.fetch_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!("Task fetch error: {}", e);
                if e.is_session_rejection() {
                    if let Some(hook) = &self.inner.on_session_rejected {
                        hook(&e);
                    }
                }
                return PollOutcome::Failed;
            }
        };

        let refresh_credits = self
            .inner
            .reconciler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .apply(fetched, &self.inner.store);
        drop(guard);

        if refresh_credits {
            info!("task reached a terminal state, refreshing credits");
            self.refresh_credits().await;
        }
        PollOutcome::Applied {
            credits_refreshed: refresh_credits,
        }
    }

    async fn refresh_credits(&self) {
        match self.inner.credits.credit_balance().await {
            Ok(credits) => self.inner.store.set_credits(Some(credits)),
            Err(e) => warn!("Failed to refresh credits: {}", e),
        }
    }

    /// Spawns the scheduler. Polling stops when the returned handle is
    /// stopped or dropped.
    pub fn start(&self) -> PollerHandle {
        let driver = tokio::spawn(self.clone().drive());
        PollerHandle { driver }
    }

    async fn drive(self) {
        let _reset = PhaseReset(self.inner.clone());
        let mut session = self.inner.session.clone();
        let mut active = self.inner.store.subscribe_active();
        let mut ticks = JoinSet::new();
        let mut timer: Option<Interval> = None;
        let mut was_approved = false;

        loop {
            let approved = session.borrow_and_update().is_approved();
            let has_active = *active.borrow_and_update();

            if approved && !was_approved {
                let poller = self.clone();
                ticks.spawn(async move {
                    poller.refresh_now().await;
                });
            }
            was_approved = approved;

            match (approved && has_active, timer.is_some()) {
                (true, false) => {
                    let period = self.inner.interval;
                    let mut interval = interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    timer = Some(interval);
                    self.set_phase(PollPhase::Active);
                }
                (false, true) => {
                    timer = None;
                    self.set_phase(PollPhase::Idle);
                }
                _ => {}
            }

            tokio::select! {
                changed = session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = active.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = next_tick(&mut timer) => {
                    let poller = self.clone();
                    ticks.spawn(async move {
                        poller.refresh_now().await;
                    });
                }
                Some(_) = ticks.join_next(), if !ticks.is_empty() => {}
            }
        }
    }

    fn set_phase(&self, phase: PollPhase) {
        let changed = self.inner.phase.send_if_modified(|current| {
            let changed = *current != phase;
            *current = phase;
            changed
        });
        if changed {
            info!(
                phase = ?phase,
                interval_ms = self.inner.interval.as_millis() as u64,
                "task polling phase changed"
            );
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Owns the running scheduler; dropping it stops the timer and aborts
/// outstanding ticks.
pub struct PollerHandle {
    driver: JoinHandle<()>,
}

impl PollerHandle {
    /// Stops polling; teardown itself happens in `Drop`.
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.driver.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// Runs when the driver exits or is aborted.
struct PhaseReset(Arc<Inner>);

impl Drop for PhaseReset {
    fn drop(&mut self) {
        self.0.phase.send_replace(PollPhase::Idle);
    }
}
