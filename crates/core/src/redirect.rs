//! App-or-web redirect arbitration.
//!
//! On page load the browser is pointed at the native app's custom scheme. If
//! the app is installed the operating system takes over and the page is
//! hidden or suspended; otherwise nothing happens and, once the grace period
//! has passed, the page navigates to the web fallback instead.
//!
//! ```text
//! Idle --arm--> AttemptingApp --timer (delay <= t < stale_after)--> FallbackTriggered
//!                     |
//!                     +--hand-off observed / timer (t >= stale_after)--> AppTookOver
//! ```
//!
//! [`RedirectArbiter`] is the pure state machine. The browser script served
//! with the page implements the same rules from a serialized [`RedirectPlan`].

use std::time::Duration;

use serde::Serialize;

use crate::types::ProductIdentifier;

/// Default delay before the fallback timer fires.
///
/// iOS Safari needs a long grace period before a custom-scheme navigation
/// resolves; shorter delays fall back even when the app opens.
pub const DEFAULT_REDIRECT_DELAY_MS: u64 = 1200;

/// Default elapsed-time ceiling for the fallback.
///
/// A timer observed later than this means the page was suspended while the
/// app was in front.
pub const DEFAULT_REDIRECT_STALE_AFTER_MS: u64 = 1500;

/// Errors from invalid redirect timing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RedirectTimingError {
    /// The delay is zero.
    #[error("redirect delay must be greater than zero")]
    ZeroDelay,
    /// The stale threshold does not leave room after the delay.
    #[error("stale threshold ({stale_after_ms}ms) must be greater than the delay ({delay_ms}ms)")]
    StaleBeforeDelay {
        /// Configured delay.
        delay_ms: u64,
        /// Configured stale threshold.
        stale_after_ms: u64,
    },
}

/// Timer settings for the arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RedirectTiming {
    delay_ms: u64,
    stale_after_ms: u64,
}

impl RedirectTiming {
    /// Create validated timing.
    ///
    /// # Errors
    ///
    /// Returns an error if `delay_ms` is zero or not below `stale_after_ms`.
    pub const fn new(delay_ms: u64, stale_after_ms: u64) -> Result<Self, RedirectTimingError> {
        if delay_ms == 0 {
            return Err(RedirectTimingError::ZeroDelay);
        }
        if stale_after_ms <= delay_ms {
            return Err(RedirectTimingError::StaleBeforeDelay {
                delay_ms,
                stale_after_ms,
            });
        }
        Ok(Self {
            delay_ms,
            stale_after_ms,
        })
    }

    /// Delay before the fallback timer fires.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Elapsed time at or beyond which the fallback is suppressed.
    #[must_use]
    pub const fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl Default for RedirectTiming {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_REDIRECT_DELAY_MS,
            stale_after_ms: DEFAULT_REDIRECT_STALE_AFTER_MS,
        }
    }
}

/// Everything a page needs to run the arbitration for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectPlan {
    /// Native-scheme URI, e.g. `xetivo://product/abc123`.
    pub app_uri: String,
    /// Web URL used when the app does not take over.
    pub fallback_url: String,
    #[serde(flatten)]
    pub timing: RedirectTiming,
}

impl RedirectPlan {
    /// Build the plan for a product.
    ///
    /// `scheme` is the bare scheme name (`xetivo`, not `xetivo://`).
    /// `public_base_url` is the site origin without a trailing slash.
    #[must_use]
    pub fn new(
        id: &ProductIdentifier,
        scheme: &str,
        public_base_url: &str,
        timing: RedirectTiming,
    ) -> Self {
        let segment = id.as_path_segment();
        let base = public_base_url.trim_end_matches('/');
        Self {
            app_uri: format!("{scheme}://product/{segment}"),
            fallback_url: format!("{base}/product/{segment}"),
            timing,
        }
    }
}

/// A navigation the page should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Hand off to the native app.
    OpenApp(String),
    /// Replace the page with the web fallback.
    Fallback(String),
}

/// Arbitration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbitrationState {
    /// Not started.
    Idle,
    /// App navigation issued at `started_at`, waiting for the timer.
    AttemptingApp {
        /// Page-relative time of the app navigation.
        started_at: Duration,
    },
    /// The app took over the device. Terminal.
    AppTookOver,
    /// The page navigated to the web fallback. Terminal.
    FallbackTriggered,
}

impl ArbitrationState {
    /// Whether no further navigation can happen.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::AppTookOver | Self::FallbackTriggered)
    }
}

/// State machine racing the app hand-off against the fallback timer.
///
/// This is the reference model of the inline script in
/// `templates/partials/redirect_script.html`, which runs the same rules in
/// the browser: the window guard matches [`Self::arm`], `visibilitychange`
/// and `pagehide` match [`Self::hand_off_observed`], and the timer callback
/// matches [`Self::timer_fired`]. Changes to one must be mirrored in the
/// other.
///
/// Times are page-relative (time since navigation start), supplied by the
/// caller.
#[derive(Debug, Clone)]
pub struct RedirectArbiter {
    plan: RedirectPlan,
    state: ArbitrationState,
}

impl RedirectArbiter {
    /// Create an idle arbiter.
    #[must_use]
    pub const fn new(plan: RedirectPlan) -> Self {
        Self {
            plan,
            state: ArbitrationState::Idle,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ArbitrationState {
        self.state
    }

    /// The plan this arbiter runs.
    #[must_use]
    pub const fn plan(&self) -> &RedirectPlan {
        &self.plan
    }

    /// Start the arbitration.
    ///
    /// Returns the app navigation on the first call only; arming an arbiter
    /// that has already started is a no-op.
    pub fn arm(&mut self, now: Duration) -> Option<Navigation> {
        if self.state != ArbitrationState::Idle {
            return None;
        }
        self.state = ArbitrationState::AttemptingApp { started_at: now };
        Some(Navigation::OpenApp(self.plan.app_uri.clone()))
    }

    /// Record that the page was hidden or unloaded after the app navigation.
    pub fn hand_off_observed(&mut self) {
        if matches!(self.state, ArbitrationState::AttemptingApp { .. }) {
            self.state = ArbitrationState::AppTookOver;
        }
    }

    /// Handle the fallback timer firing at `now`.
    ///
    /// Returns the fallback navigation at most once per arbiter.
    pub fn timer_fired(&mut self, now: Duration) -> Option<Navigation> {
        let ArbitrationState::AttemptingApp { started_at } = self.state else {
            return None;
        };

        let elapsed = now.saturating_sub(started_at);
        if elapsed < self.plan.timing.delay() {
            return None;
        }

        if elapsed >= self.plan.timing.stale_after() {
            self.state = ArbitrationState::AppTookOver;
            return None;
        }

        self.state = ArbitrationState::FallbackTriggered;
        Some(Navigation::Fallback(self.plan.fallback_url.clone()))
    }
}
