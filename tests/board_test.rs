use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use kennel_care::care::{log_group_potty_break, CareService};
use kennel_care::config::Care;
use kennel_care::midnight::Clock;
use kennel_care::model::{CareCategory, CareEvent, CareRecord, DogCareStatus, DogFlags, Notification};
use kennel_care::CareBoard;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{advance, Instant};

fn dog(id: &str, name: &str, group: Option<&str>) -> DogCareStatus {
    DogCareStatus {
        dog_id: id.into(),
        dog_name: name.into(),
        breed: Some("Labrador".into()),
        photo: None,
        group_name: group.map(str::to_string),
        last_care: None,
        flags: DogFlags::default(),
    }
}

fn kennel() -> Vec<DogCareStatus> {
    vec![
        dog("d1", "Zed", Some("A")),
        dog("d2", "Ann", Some("A")),
        dog("d3", "Mid", None),
    ]
}

#[derive(Clone, Default)]
struct RecordingCare {
    status_responses: Arc<Mutex<VecDeque<Result<Vec<DogCareStatus>>>>>,
    status_calls: Arc<AtomicUsize>,
    status_delays: Arc<Mutex<VecDeque<Duration>>>,
    failing_dogs: Arc<Mutex<HashSet<String>>>,
    records: Arc<Mutex<Vec<CareRecord>>>,
    events: Arc<Mutex<Option<Vec<CareEvent>>>>,
}

impl RecordingCare {
    fn with_statuses(responses: Vec<Result<Vec<DogCareStatus>>>) -> Self {
        Self {
            status_responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    async fn delay_statuses(&self, delays: &[Duration]) {
        self.status_delays.lock().await.extend(delays.iter().copied());
    }

    async fn fail_for(&self, dog_id: &str) {
        self.failing_dogs.lock().await.insert(dog_id.to_string());
    }

    async fn records(&self) -> Vec<CareRecord> {
        self.records.lock().await.clone()
    }

    fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CareService for RecordingCare {
    async fn fetch_daily_status(&self) -> Result<Vec<DogCareStatus>> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.status_delays.lock().await.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut guard = self.status_responses.lock().await;
        guard.pop_front().unwrap_or_else(|| Ok(kennel()))
    }

    async fn record_care(&self, record: &CareRecord) -> Result<()> {
        self.records.lock().await.push(record.clone());
        if self.failing_dogs.lock().await.contains(&record.dog_id) {
            return Err(anyhow!("insert rejected for {}", record.dog_id));
        }
        Ok(())
    }

    async fn fetch_events(&self) -> Result<Vec<CareEvent>> {
        self.events
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("events table unavailable"))
    }
}

struct PausedClock {
    base: DateTime<Local>,
    start: Instant,
}

impl Clock for PausedClock {
    fn now(&self) -> DateTime<Local> {
        self.base + chrono::Duration::from_std(self.start.elapsed()).unwrap()
    }
}

fn care_timing() -> Care {
    Care {
        cache_ttl_ms: 20_000,
        cell_debounce_ms: 300,
        action_debounce_ms: 1_000,
    }
}

fn board_with(service: &RecordingCare, care: &Care) -> (CareBoard, mpsc::UnboundedReceiver<Notification>) {
    CareBoard::new(Arc::new(service.clone()), care)
}

async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn refresh_is_gated_by_ttl() {
    let service = RecordingCare::default();
    let (board, _rx) = board_with(&service, &care_timing());

    assert!(board.refresh(false).await);
    assert!(!board.refresh(false).await);
    assert_eq!(service.status_calls(), 1);

    advance(Duration::from_secs(19)).await;
    assert!(!board.refresh(false).await);
    assert!(board.refresh(true).await);
    assert_eq!(service.status_calls(), 2);

    advance(Duration::from_secs(20)).await;
    assert!(board.refresh(false).await);
    assert_eq!(service.status_calls(), 3);
    assert!(!board.is_loading());
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_notifies_and_clears_loading() {
    let service = RecordingCare::with_statuses(vec![Err(anyhow!("connection reset"))]);
    let (board, mut rx) = board_with(&service, &care_timing());

    assert!(!board.refresh(false).await);
    assert!(!board.is_loading());
    assert!(rx.recv().await.unwrap().is_error());
    assert_eq!(board.view().error_count(), 1);
    assert!(board.sorted_dogs().is_empty());

    // The failed fetch did not start a TTL window.
    assert!(board.refresh(false).await);
    assert_eq!(board.sorted_dogs().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn sorted_view_puts_ungrouped_last() {
    let service = RecordingCare::default();
    let (board, _rx) = board_with(&service, &care_timing());
    board.refresh(true).await;

    let sorted = board.sorted_dogs();
    let names: Vec<&str> = sorted.iter().map(|d| d.dog_name.as_str()).collect();
    assert_eq!(names, vec!["Ann", "Zed", "Mid"]);
    assert!(Arc::ptr_eq(&sorted, &board.sorted_dogs()));
}

#[tokio::test(start_paused = true)]
async fn category_change_closes_dialog() {
    let service = RecordingCare::default();
    let (board, _rx) = board_with(&service, &care_timing());

    assert_eq!(board.view().active_category(), CareCategory::Feeding);
    board.open_dialog("d1");
    assert!(board.view().is_dialog_open());

    board.change_category(CareCategory::Potty);
    let view = board.view();
    assert!(!view.is_dialog_open());
    assert_eq!(view.active_category(), CareCategory::Potty);
}

#[tokio::test(start_paused = true)]
async fn rapid_cell_clicks_record_once() {
    let service = RecordingCare::default();
    let (board, mut rx) = board_with(&service, &care_timing());
    board.change_category(CareCategory::Medication);
    let start = Instant::now();

    for _ in 0..3 {
        board.click_cell("d2");
        advance(Duration::from_millis(100)).await;
    }
    assert_eq!(board.view().click_count(), 3);
    assert!(service.records().await.is_empty());

    let note = rx.recv().await.unwrap();
    assert!(!note.is_error());
    // last click at t=200ms
    assert_eq!(start.elapsed(), Duration::from_millis(500));

    settle().await;
    let records = service.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].dog_id, "d2");
    assert_eq!(records[0].activity_type, "medication");
    // a successful log forces a refresh
    assert_eq!(service.status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn clicks_on_different_dogs_are_all_recorded() {
    let service = RecordingCare::default();
    let (board, mut rx) = board_with(&service, &care_timing());

    board.click_cell("d1");
    advance(Duration::from_millis(100)).await;
    board.click_cell("d2");

    assert!(!rx.recv().await.unwrap().is_error());
    assert!(!rx.recv().await.unwrap().is_error());
    settle().await;

    let mut recorded: Vec<String> = service.records().await.into_iter().map(|r| r.dog_id).collect();
    recorded.sort();
    assert_eq!(recorded, ids(&["d1", "d2"]));
    assert_eq!(board.view().click_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn overlapping_refreshes_stay_loading_until_the_last_finishes() {
    let service = RecordingCare::default();
    service
        .delay_statuses(&[Duration::from_millis(100), Duration::from_millis(300)])
        .await;
    let (board, _rx) = board_with(&service, &care_timing());

    let fast = tokio::spawn({
        let board = board.clone();
        async move { board.refresh(true).await }
    });
    settle().await;
    let slow = tokio::spawn({
        let board = board.clone();
        async move { board.refresh(true).await }
    });
    settle().await;
    assert!(board.is_loading());

    advance(Duration::from_millis(150)).await;
    settle().await;
    assert!(fast.is_finished());
    assert!(board.is_loading());

    advance(Duration::from_millis(200)).await;
    settle().await;
    assert!(slow.is_finished());
    assert!(!board.is_loading());
    assert!(fast.await.unwrap());
    assert!(slow.await.unwrap());
    assert_eq!(service.status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn teardown_cancels_pending_click() {
    let service = RecordingCare::default();
    let (board, mut rx) = board_with(&service, &care_timing());

    board.click_cell("d1");
    advance(Duration::from_millis(100)).await;
    board.teardown();

    advance(Duration::from_secs(5)).await;
    settle().await;
    assert!(service.records().await.is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn group_potty_break_reports_single_failure() {
    let service = RecordingCare::default();
    service.fail_for("d2").await;
    let at = Utc.with_ymd_and_hms(2024, 6, 12, 14, 0, 0).unwrap();

    let note = log_group_potty_break(&service, &ids(&["d1", "d2", "d3"]), at, None).await;
    assert_eq!(
        note,
        Notification::error("Error", "Failed to log group potty break")
    );

    let mut attempted: Vec<String> = service.records().await.into_iter().map(|r| r.dog_id).collect();
    attempted.sort();
    assert_eq!(attempted, ids(&["d1", "d2", "d3"]));
}

#[tokio::test]
async fn group_potty_break_success_and_empty_selection() {
    let service = RecordingCare::default();
    let at = Utc.with_ymd_and_hms(2024, 6, 12, 14, 0, 0).unwrap();

    let note = log_group_potty_break(&service, &ids(&["d1", "d3"]), at, Some("yard 2")).await;
    assert!(!note.is_error());
    let records = service.records().await;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.activity_type == "potty"));
    assert!(records.iter().all(|r| r.timestamp == "2024-06-12T14:00:00+00:00"));
    assert!(records.iter().all(|r| r.notes.as_deref() == Some("yard 2")));

    let note = log_group_potty_break(&service, &[], at, None).await;
    assert!(note.is_error());
    assert_eq!(service.records().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn board_group_potty_break_is_debounced_and_all_or_nothing() {
    let service = RecordingCare::default();
    service.fail_for("d2").await;
    let (board, mut rx) = board_with(&service, &care_timing());

    board.group_potty_break(ids(&["d1", "d2", "d3"]), None);
    advance(Duration::from_millis(500)).await;
    board.group_potty_break(ids(&["d1", "d2", "d3"]), None);

    let note = rx.recv().await.unwrap();
    assert!(note.is_error());
    settle().await;
    assert!(rx.try_recv().is_err());
    assert_eq!(service.records().await.len(), 3);
    // no refresh after a failed group action
    assert_eq!(service.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn midnight_forces_refresh_despite_ttl() {
    let service = RecordingCare::default();
    let care = Care {
        cache_ttl_ms: 24 * 3600 * 1000,
        ..care_timing()
    };
    let (board, _rx) = board_with(&service, &care);
    board.refresh(true).await;
    assert_eq!(service.status_calls(), 1);

    let clock = Arc::new(PausedClock {
        base: Local.with_ymd_and_hms(2024, 6, 12, 23, 50, 0).single().unwrap(),
        start: Instant::now(),
    });
    board.start_midnight_rollover(clock);
    let first = board.next_midnight().unwrap();
    assert_eq!(first, Local.with_ymd_and_hms(2024, 6, 13, 0, 0, 0).single().unwrap());

    advance(Duration::from_secs(600)).await;
    settle().await;
    assert_eq!(service.status_calls(), 2);
    assert_eq!(
        board.next_midnight(),
        Local.with_ymd_and_hms(2024, 6, 14, 0, 0, 0).single()
    );

    board.teardown();
    assert_eq!(board.next_midnight(), None);
}

#[tokio::test(start_paused = true)]
async fn appointment_counts_use_loaded_dogs() {
    let service = RecordingCare::default();
    *service.events.lock().await = Some(vec![CareEvent {
        title: "Vet check for ann and zed".into(),
        description: Some("ANN needs booster".into()),
        status: "scheduled".into(),
    }]);
    let (board, _rx) = board_with(&service, &care_timing());
    board.refresh(true).await;

    let counts = board.appointment_counts().await;
    assert_eq!(counts["d1"], 1);
    assert_eq!(counts["d2"], 1);
    assert_eq!(counts["d3"], 0);
}

#[tokio::test(start_paused = true)]
async fn appointment_fetch_failure_notifies() {
    let service = RecordingCare::default();
    let (board, mut rx) = board_with(&service, &care_timing());

    assert!(board.appointment_counts().await.is_empty());
    assert!(rx.recv().await.unwrap().is_error());
}
