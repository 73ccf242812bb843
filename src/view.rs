//! Board view state: the category/dialog state machine and the sorted dog list.

use crate::model::{CareCategory, DogCareStatus};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Active care tab plus the dialog opened from it.
///
/// Switching tabs always closes the dialog, so a dialog opened for one
/// category can never stay visible under another.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CareViewState {
    active_category: CareCategory,
    dialog_open: bool,
    selected_dog_id: Option<String>,
    click_count: u32,
    error_count: u32,
}

impl CareViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_category(&self) -> CareCategory {
        self.active_category
    }

    pub fn is_dialog_open(&self) -> bool {
        self.dialog_open
    }

    pub fn selected_dog_id(&self) -> Option<&str> {
        self.selected_dog_id.as_deref()
    }

    pub fn click_count(&self) -> u32 {
        self.click_count
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn change_category(&mut self, category: CareCategory) {
        debug!(
            from = %self.active_category,
            to = %category,
            clicks = self.click_count,
            errors = self.error_count,
            "care category changed"
        );
        self.active_category = category;
        self.dialog_open = false;
        self.selected_dog_id = None;
        self.click_count = 0;
        self.error_count = 0;
    }

    pub fn open_dialog(&mut self, dog_id: impl Into<String>) {
        self.selected_dog_id = Some(dog_id.into());
        self.dialog_open = true;
    }

    pub fn close_dialog(&mut self) {
        self.dialog_open = false;
        self.selected_dog_id = None;
    }

    pub fn record_click(&mut self) -> u32 {
        self.click_count = self.click_count.saturating_add(1);
        self.click_count
    }

    pub fn record_error(&mut self) -> u32 {
        self.error_count = self.error_count.saturating_add(1);
        self.error_count
    }
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Board ordering: grouped dogs by (group, name), then ungrouped dogs by name.
pub fn compare_dogs(a: &DogCareStatus, b: &DogCareStatus) -> Ordering {
    let by_group = match (a.group(), b.group()) {
        (Some(ga), Some(gb)) => fold(ga).cmp(&fold(gb)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_group.then_with(|| fold(&a.dog_name).cmp(&fold(&b.dog_name)))
}

/// Stable sort; equal keys keep their input order.
pub fn sort_dogs(dogs: &[DogCareStatus]) -> Vec<DogCareStatus> {
    let mut sorted = dogs.to_vec();
    sorted.sort_by(compare_dogs);
    sorted
}

/// [`sort_dogs`] memoized on the identity of the input slice.
#[derive(Debug)]
pub struct SortedDogs {
    source: Option<Arc<[DogCareStatus]>>,
    sorted: Arc<[DogCareStatus]>,
}

impl Default for SortedDogs {
    fn default() -> Self {
        Self {
            source: None,
            sorted: Arc::from(Vec::new()),
        }
    }
}

impl SortedDogs {
    pub fn get(&mut self, dogs: &Arc<[DogCareStatus]>) -> Arc<[DogCareStatus]> {
        let fresh = self
            .source
            .as_ref()
            .is_some_and(|src| Arc::ptr_eq(src, dogs));
        if !fresh {
            self.sorted = sort_dogs(dogs).into();
            self.source = Some(dogs.clone());
        }
        self.sorted.clone()
    }
}
