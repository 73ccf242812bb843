//! Page-level orchestration of the daily care board.
//!
//! Ties the refresh gate, the view state machine, the sorted view, the
//! debouncers and the midnight rollover to one [`CareService`]. Handlers here
//! are the last stop for errors: failures are logged and surfaced as
//! [`Notification`]s, never returned.

use crate::appointments::count_events_per_dog;
use crate::cache_gate::RefreshGate;
use crate::care::{log_care, log_group_potty_break, CareService};
use crate::config::Care;
use crate::debounce::Debouncer;
use crate::midnight::{Clock, MidnightTimer};
use crate::model::{CareCategory, DogCareStatus, Notification};
use crate::view::{CareViewState, SortedDogs};
use anyhow::{bail, Result};
use chrono::{DateTime, Local, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

struct BoardState {
    gate: RefreshGate,
    view: CareViewState,
    dogs: Arc<[DogCareStatus]>,
    sorted: SortedDogs,
    in_flight: usize,
}

struct BoardInner {
    service: Arc<dyn CareService>,
    state: Mutex<BoardState>,
    cell_delay: Duration,
    cell_debounces: Mutex<HashMap<String, Debouncer>>,
    action_debounce: Debouncer,
    midnight: Mutex<Option<MidnightTimer>>,
    notifications: mpsc::UnboundedSender<Notification>,
}

impl BoardInner {
    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notification: Notification) {
        if notification.is_error() {
            self.state().view.record_error();
        }
        // The receiver may be gone during teardown.
        let _ = self.notifications.send(notification);
    }
}

/// Releases one in-flight refresh on every exit path, including cancellation.
struct LoadingGuard<'a>(&'a BoardInner);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut st = self.0.state();
        st.in_flight = st.in_flight.saturating_sub(1);
    }
}

/// Handle to one board instance. Clones share the same board.
#[derive(Clone)]
pub struct CareBoard {
    inner: Arc<BoardInner>,
}

impl CareBoard {
    /// Build a board and the receiving end of its notification stream.
    pub fn new(
        service: Arc<dyn CareService>,
        care: &Care,
    ) -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = BoardInner {
            service,
            state: Mutex::new(BoardState {
                gate: RefreshGate::new(care.cache_ttl()),
                view: CareViewState::new(),
                dogs: Arc::from(Vec::new()),
                sorted: SortedDogs::default(),
                in_flight: 0,
            }),
            cell_delay: care.cell_debounce(),
            cell_debounces: Mutex::new(HashMap::new()),
            action_debounce: Debouncer::new(care.action_debounce()),
            midnight: Mutex::new(None),
            notifications: tx,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            rx,
        )
    }

    /// Fetch the daily status unless the gate says the data is fresh.
    ///
    /// Returns true when new data was stored.
    #[instrument(skip(self))]
    pub async fn refresh(&self, force: bool) -> bool {
        {
            let mut st = self.inner.state();
            if !st.gate.should_refresh(force) {
                return false;
            }
            if st.in_flight > 0 {
                debug!(in_flight = st.in_flight, "refresh overlaps one in flight");
            }
            st.in_flight += 1;
        }
        let _loading = LoadingGuard(self.inner.as_ref());

        match self.inner.service.fetch_daily_status().await {
            Ok(dogs) => {
                let count = dogs.len();
                let mut st = self.inner.state();
                st.dogs = dogs.into();
                st.gate.update_cache_timestamp();
                info!(count, "daily care status refreshed");
                true
            }
            Err(err) => {
                error!(?err, "failed to fetch daily care status");
                self.inner
                    .notify(Notification::error("Error", "Failed to load daily care data"));
                false
            }
        }
    }

    /// True while any refresh is still awaiting the service.
    pub fn is_loading(&self) -> bool {
        self.inner.state().in_flight > 0
    }

    pub fn sorted_dogs(&self) -> Arc<[DogCareStatus]> {
        let mut st = self.inner.state();
        let dogs = st.dogs.clone();
        st.sorted.get(&dogs)
    }

    pub fn view(&self) -> CareViewState {
        self.inner.state().view.clone()
    }

    pub fn change_category(&self, category: CareCategory) {
        self.inner.state().view.change_category(category);
    }

    pub fn open_dialog(&self, dog_id: &str) {
        self.inner.state().view.open_dialog(dog_id);
    }

    pub fn close_dialog(&self) {
        self.inner.state().view.close_dialog();
    }

    /// Log the active category for `dog_id` once clicking settles.
    ///
    /// Each dog has its own debounce window, so a click on another dog never
    /// drops this one.
    pub fn click_cell(&self, dog_id: &str) {
        let category = {
            let mut st = self.inner.state();
            st.view.record_click();
            st.view.active_category()
        };
        let board = self.clone();
        let mut cells = self
            .inner
            .cell_debounces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let debouncer = cells
            .entry(dog_id.to_string())
            .or_insert_with(|| Debouncer::new(self.inner.cell_delay));
        let dog_id = dog_id.to_string();
        debouncer.debounce(move || async move {
            let note = log_care(
                board.inner.service.as_ref(),
                &dog_id,
                category,
                Utc::now(),
                None,
            )
            .await;
            board.finish_action(note).await;
        });
    }

    /// Log a potty break for all `dog_ids` once the trigger settles.
    pub fn group_potty_break(&self, dog_ids: Vec<String>, notes: Option<String>) {
        let board = self.clone();
        self.inner.action_debounce.debounce(move || async move {
            let note = log_group_potty_break(
                board.inner.service.as_ref(),
                &dog_ids,
                Utc::now(),
                notes.as_deref(),
            )
            .await;
            board.finish_action(note).await;
        });
    }

    async fn finish_action(&self, note: Notification) {
        let ok = !note.is_error();
        self.inner.notify(note);
        if ok {
            self.refresh(true).await;
        }
    }

    /// Event counts per dog, matched by name. Empty when events cannot be loaded.
    #[instrument(skip(self))]
    pub async fn appointment_counts(&self) -> HashMap<String, usize> {
        match self.inner.service.fetch_events().await {
            Ok(events) => {
                let dogs = self.inner.state().dogs.clone();
                count_events_per_dog(&dogs, &events)
            }
            Err(err) => {
                error!(?err, "failed to fetch events");
                self.inner
                    .notify(Notification::error("Error", "Failed to load appointments"));
                HashMap::new()
            }
        }
    }

    /// Arm the daily rollover, replacing any timer armed before.
    pub fn start_midnight_rollover<C: Clock>(&self, clock: Arc<C>) {
        let weak: Weak<BoardInner> = Arc::downgrade(&self.inner);
        let timer = MidnightTimer::setup(clock, move |now| {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return Ok(());
                };
                CareBoard { inner }.on_midnight(now).await
            }
        });
        let mut slot = self
            .inner
            .midnight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(timer);
    }

    async fn on_midnight(&self, now: DateTime<Local>) -> Result<()> {
        info!(date = %now.date_naive(), "new day; forcing full refresh");
        self.inner.state().gate.reset_cache();
        if !self.refresh(true).await {
            bail!("refresh after midnight failed");
        }
        Ok(())
    }

    pub fn next_midnight(&self) -> Option<DateTime<Local>> {
        self.inner
            .midnight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(MidnightTimer::next_deadline)
    }

    /// Cancel every timer owned by the board. In-flight requests settle on their own.
    pub fn teardown(&self) {
        let cells = std::mem::take(
            &mut *self
                .inner
                .cell_debounces
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        // Dropping a debouncer cancels its pending click.
        drop(cells);
        self.inner.action_debounce.cancel();
        let timer = self
            .inner
            .midnight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut timer) = timer {
            timer.cleanup();
        }
        debug!("care board torn down");
    }
}
