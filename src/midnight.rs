//! Midnight rollover: fire a callback at every local midnight.
//!
//! Each fire re-arms a fresh one-shot for the next midnight instead of using a
//! 24h interval, so days of 23 or 25 hours around DST changes stay aligned.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Local, LocalResult, TimeZone};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

const QUARTER_HOURS_PER_DAY: i64 = 24 * 4;

/// Source of wall-clock time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Start of the local day following `now`.
///
/// A day whose midnight does not exist locally starts at its first valid
/// quarter hour; an ambiguous midnight resolves to the earlier instant.
pub fn next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    // Only reachable at the end of chrono's calendar.
    let fallback = || {
        now.clone()
            .checked_add_signed(ChronoDuration::hours(24))
            .unwrap_or_else(|| now.clone())
    };
    let Some(start) = now
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return fallback();
    };
    match tz.from_local_datetime(&start) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => (1..QUARTER_HOURS_PER_DAY)
            .find_map(|q| {
                tz.from_local_datetime(&(start + ChronoDuration::minutes(15 * q)))
                    .earliest()
            })
            .unwrap_or_else(fallback),
    }
}

pub fn duration_until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    until(now, &next_midnight(now))
}

/// Target after a fire at `fired`, read at `now`.
///
/// A wake that lands a hair before midnight must not target the same midnight twice.
fn following_midnight<Tz: TimeZone>(now: &DateTime<Tz>, fired: &DateTime<Tz>) -> DateTime<Tz> {
    let next = next_midnight(now);
    if next <= *fired {
        next_midnight(fired)
    } else {
        next
    }
}

fn until<Tz: TimeZone>(from: &DateTime<Tz>, to: &DateTime<Tz>) -> Duration {
    (to.clone() - from.clone()).to_std().unwrap_or(Duration::ZERO)
}

/// Self-rescheduling one-shot timer targeting the next local midnight.
///
/// The callback receives the wall-clock time read at fire. Errors and panics
/// from the callback are logged and the timer re-arms regardless. Dropping
/// the timer cancels it.
#[derive(Debug)]
pub struct MidnightTimer {
    handle: Option<JoinHandle<()>>,
    deadline: Arc<watch::Sender<Option<DateTime<Local>>>>,
}

impl MidnightTimer {
    /// Arm the timer. Must be called from within a tokio runtime.
    pub fn setup<C, F, Fut>(clock: Arc<C>, on_midnight: F) -> Self
    where
        C: Clock,
        F: Fn(DateTime<Local>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let now = clock.now();
        let target = next_midnight(&now);
        let wake = Instant::now() + until(&now, &target);
        let (tx, _) = watch::channel(Some(target));
        let deadline = Arc::new(tx);
        debug!(%target, "midnight rollover armed");

        let handle = tokio::spawn(run(clock, on_midnight, deadline.clone(), target, wake));
        Self {
            handle: Some(handle),
            deadline,
        }
    }

    /// The midnight the timer is currently armed for, if any.
    pub fn next_deadline(&self) -> Option<DateTime<Local>> {
        *self.deadline.borrow()
    }

    /// Watch re-arms. Sees `None` once the timer is cleaned up.
    pub fn subscribe_deadline(&self) -> watch::Receiver<Option<DateTime<Local>>> {
        self.deadline.subscribe()
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the armed timer without rescheduling.
    pub fn cleanup(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            self.deadline.send_replace(None);
            debug!("midnight rollover cancelled");
        }
    }
}

impl Drop for MidnightTimer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

async fn run<C, F, Fut>(
    clock: Arc<C>,
    on_midnight: F,
    deadline: Arc<watch::Sender<Option<DateTime<Local>>>>,
    mut target: DateTime<Local>,
    mut wake: Instant,
) where
    C: Clock,
    F: Fn(DateTime<Local>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    loop {
        tokio::time::sleep_until(wake).await;

        let now = clock.now();
        info!(%now, "midnight reached");
        match AssertUnwindSafe(on_midnight(now)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(?err, "midnight callback failed"),
            Err(_) => error!("midnight callback panicked"),
        }

        let now = clock.now();
        target = following_midnight(&now, &target);
        wake = Instant::now() + until(&now, &target);
        deadline.send_replace(Some(target));
        debug!(%target, "midnight rollover re-armed");
    }
}
