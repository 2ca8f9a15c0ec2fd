//! Feed poller.
//!
//! Two states drive the cadence:
//! ```text
//! SignedIn  --401, 401-->  SignedOut   (panel shown, slow interval)
//! SignedOut --200------->  SignedIn    (fast interval)
//! ```
//! The feed occasionally answers 401 to authenticated sessions, so a single
//! 401 is never enough to flip to `SignedOut`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::Config;
use crate::feed::{FeedClient, FeedResult};
use crate::host::{Badge, SignInPanel};

/// Consecutive 401s tolerated while signed in before giving up on the session.
pub const AUTH_FAILURE_LIMIT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInState {
    SignedIn,
    SignedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadReason {
    Uninstall,
    Disable,
    Shutdown,
    Upgrade,
    Downgrade,
}

/// Shortest period a timer is armed with; `tokio::time::interval` rejects zero.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    fast: Duration,
    slow: Duration,
}

impl Intervals {
    pub fn new(fast: Duration, slow: Duration) -> Self {
        Self {
            fast: fast.max(MIN_INTERVAL),
            slow: slow.max(MIN_INTERVAL),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.fast_interval(), config.slow_interval())
    }

    pub fn fast(&self) -> Duration {
        self.fast
    }

    pub fn slow(&self) -> Duration {
        self.slow
    }

    pub fn for_state(&self, state: SignInState) -> Duration {
        match state {
            SignInState::SignedIn => self.fast,
            SignInState::SignedOut => self.slow,
        }
    }
}

/// The one periodic timer driving polls. Never holds more than one interval.
#[derive(Default)]
pub struct PollTimer {
    interval: Option<Interval>,
    period: Option<Duration>,
}

impl PollTimer {
    /// Arm a timer whose first tick fires immediately.
    pub fn arm_now(&mut self, period: Duration) {
        self.arm_at(Instant::now(), period);
    }

    /// Drop the current timer and arm a new one that first fires after `period`.
    pub fn rearm(&mut self, period: Duration) {
        let period = period.max(MIN_INTERVAL);
        self.arm_at(Instant::now() + period, period);
    }

    pub fn clear(&mut self) {
        self.interval = None;
        self.period = None;
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Waits for the next tick; never completes while cleared.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn arm_at(&mut self, start: Instant, period: Duration) {
        self.clear();
        let period = period.max(MIN_INTERVAL);
        let mut interval = time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
        self.period = Some(period);
    }
}

pub struct PollerState {
    pub sign_in: SignInState,
    pub auth_failures: u8,
    pub timer: PollTimer,
}

impl Default for PollerState {
    fn default() -> Self {
        Self {
            sign_in: SignInState::SignedIn,
            auth_failures: 0,
            timer: PollTimer::default(),
        }
    }
}

pub struct Poller<B, P> {
    client: Arc<FeedClient>,
    badge: B,
    panel: P,
    intervals: Intervals,
    state: PollerState,
}

impl<B: Badge, P: SignInPanel> Poller<B, P> {
    pub fn new(client: FeedClient, badge: B, panel: P, intervals: Intervals) -> Self {
        Self {
            client: Arc::new(client),
            badge,
            panel,
            intervals,
            state: PollerState::default(),
        }
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    pub fn sign_in_state(&self) -> SignInState {
        self.state.sign_in
    }

    pub fn auth_failures(&self) -> u8 {
        self.state.auth_failures
    }

    pub fn timer_period(&self) -> Option<Duration> {
        self.state.timer.period()
    }

    /// Fetch the feed once and apply the outcome.
    pub async fn poll(&mut self) -> Option<SignInState> {
        let outcome = self.client.fetch().await;
        self.handle(outcome)
    }

    pub fn handle(&mut self, outcome: FeedResult) -> Option<SignInState> {
        match outcome {
            FeedResult::Success(count) => {
                self.set_count(count);
                self.state.auth_failures = 0;

                if self.state.sign_in == SignInState::SignedOut {
                    info!("Feed reachable again, switching to fast polling");
                    self.state.sign_in = SignInState::SignedIn;
                    self.reconfigure_interval();
                    return Some(SignInState::SignedIn);
                }
            }
            FeedResult::AuthRequired => {
                self.set_count(0);

                if self.state.sign_in == SignInState::SignedIn {
                    self.state.auth_failures += 1;
                    debug!("Auth failure {} of {}", self.state.auth_failures, AUTH_FAILURE_LIMIT);

                    if self.state.auth_failures >= AUTH_FAILURE_LIMIT {
                        info!("Session looks signed out, switching to slow polling");
                        self.state.sign_in = SignInState::SignedOut;
                        self.state.auth_failures = 0;
                        self.panel.show();
                        self.reconfigure_interval();
                        return Some(SignInState::SignedOut);
                    }
                }
            }
            FeedResult::TransientError => {}
        }

        None
    }

    pub fn set_count(&self, count: u32) {
        self.badge.set_badge((count != 0).then_some(count));
    }

    pub fn reconfigure_interval(&mut self) {
        let period = self.intervals.for_state(self.state.sign_in);
        debug!("Polling every {:?}", period);
        self.state.timer.rearm(period);
    }

    pub fn shutdown(&mut self) {
        info!("Stopping feed poller");
        self.state.timer.clear();
    }

    /// Returns true when the poller stopped. A missing reason is not a real unload.
    pub fn on_unload(&mut self, reason: Option<UnloadReason>) -> bool {
        match reason {
            Some(reason) => {
                info!("Unloading: {:?}", reason);
                self.shutdown();
                true
            }
            None => {
                debug!("Ignoring unload without a reason");
                false
            }
        }
    }

    /// Poll immediately, then on every tick, until a real unload arrives.
    pub async fn run(mut self, mut lifecycle: mpsc::Receiver<Option<UnloadReason>>) -> Self {
        if !self.state.timer.is_active() {
            self.state.timer.arm_now(self.intervals.for_state(self.state.sign_in));
        }
        info!("Polling {}", self.client.feed_url());

        loop {
            tokio::select! {
                biased;
                message = lifecycle.recv() => {
                    if self.on_lifecycle(message) {
                        break;
                    }
                }
                _ = self.state.timer.tick() => {
                    if !self.poll_until_unload(&mut lifecycle).await {
                        break;
                    }
                }
            }
        }

        self
    }

    /// Polls once while still listening for unloads. Returns false if the poller
    /// stopped before the request completed; the request is then dropped.
    async fn poll_until_unload(
        &mut self,
        lifecycle: &mut mpsc::Receiver<Option<UnloadReason>>,
    ) -> bool {
        let client = Arc::clone(&self.client);
        let fetch = client.fetch();
        tokio::pin!(fetch);

        let outcome = loop {
            tokio::select! {
                biased;
                message = lifecycle.recv() => {
                    if self.on_lifecycle(message) {
                        return false;
                    }
                }
                outcome = &mut fetch => break outcome,
            }
        };

        self.handle(outcome);
        true
    }

    /// A closed lifecycle channel means nobody can unload us any more.
    fn on_lifecycle(&mut self, message: Option<Option<UnloadReason>>) -> bool {
        match message {
            Some(reason) => self.on_unload(reason),
            None => {
                self.shutdown();
                true
            }
        }
    }
}
