use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CareCategory {
    Feeding,
    Potty,
    Medication,
    Exercise,
    Puppy,
}

impl CareCategory {
    /// Tab order on the board; the first entry is the initial tab.
    pub const ALL: [CareCategory; 5] = [
        CareCategory::Feeding,
        CareCategory::Potty,
        CareCategory::Medication,
        CareCategory::Exercise,
        CareCategory::Puppy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CareCategory::Feeding => "feeding",
            CareCategory::Potty => "potty",
            CareCategory::Medication => "medication",
            CareCategory::Exercise => "exercise",
            CareCategory::Puppy => "puppy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl Default for CareCategory {
    fn default() -> Self {
        Self::ALL[0]
    }
}

impl fmt::Display for CareCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of the most recent care entry for a dog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastCare {
    pub category: CareCategory,
    pub task_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DogFlags {
    #[serde(default)]
    pub in_heat: bool,
    #[serde(default)]
    pub incompatible_with: Vec<String>,
    #[serde(default)]
    pub special_attention: Option<String>,
}

/// One row of the daily care board as returned by the hosted database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DogCareStatus {
    pub dog_id: String,
    pub dog_name: String,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub last_care: Option<LastCare>,
    #[serde(default)]
    pub flags: DogFlags,
}

impl DogCareStatus {
    /// Group name, treating blank strings as "no group".
    pub fn group(&self) -> Option<&str> {
        self.group_name
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }
}

/// Payload accepted by the care-recording endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CareRecord {
    pub dog_id: String,
    pub activity_type: String,
    /// RFC 3339 / ISO-8601 timestamp.
    pub timestamp: String,
    pub notes: Option<String>,
}

impl CareRecord {
    pub fn new(
        dog_id: impl Into<String>,
        category: CareCategory,
        at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> Self {
        Self {
            dog_id: dog_id.into(),
            activity_type: category.as_str().to_string(),
            timestamp: at.to_rfc3339(),
            notes: notes.filter(|n| !n.trim().is_empty()).map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CareEvent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: String,
}

/// Transient user-facing outcome of a handler (a toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success { title: String, message: String },
    Error { title: String, message: String },
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Notification::Success {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Notification::Error {
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Notification::Error { .. })
    }
}
