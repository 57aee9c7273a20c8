//! Announcement rows and the read state attached per recipient.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use milvault_core::{AnnouncementId, UserId};

/// Longest accepted announcement title.
pub const TITLE_MAX_LEN: usize = 100;
/// Longest accepted announcement body.
pub const CONTENT_MAX_LEN: usize = 5000;

/// Urgency of an announcement. Ordered, so `Urgent` sorts above the rest.
#[derive(
    Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published (or draft) announcement row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Announcement {
    pub id: AnnouncementId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "is_published")]
    pub published: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(rename = "created_by")]
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Announcement {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// An announcement together with the reading user's recipient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementWithReadState {
    pub announcement: Announcement,
    pub read_at: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl AnnouncementWithReadState {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }
}

/// Payload for creating an announcement. Author and timestamps are filled
/// in by the service.
#[derive(Debug, Clone)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    pub priority: Priority,
    pub category: Option<String>,
    /// Publish immediately; drafts stay invisible to recipients.
    pub publish: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewAnnouncement {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            priority: Priority::Normal,
            category: None,
            publish: true,
            expires_at: None,
        }
    }
}

/// Partial update to an announcement; unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnouncementChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "is_published", skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Delivery counters for one announcement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnouncementStats {
    pub recipients: usize,
    pub read: usize,
    pub acknowledged: usize,
}

/// Read-state facet used by board filters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ReadFilter {
    #[default]
    All,
    Read,
    Unread,
}

/// Keep only announcements of `priority`; `None` keeps everything.
pub fn filter_by_priority(
    items: &[AnnouncementWithReadState],
    priority: Option<Priority>,
) -> Vec<AnnouncementWithReadState> {
    match priority {
        None => items.to_vec(),
        Some(p) => items
            .iter()
            .filter(|item| item.announcement.priority == p)
            .cloned()
            .collect(),
    }
}

pub fn filter_by_read_state(
    items: &[AnnouncementWithReadState],
    filter: ReadFilter,
) -> Vec<AnnouncementWithReadState> {
    items
        .iter()
        .filter(|item| match filter {
            ReadFilter::All => true,
            ReadFilter::Read => item.is_read(),
            ReadFilter::Unread => !item.is_read(),
        })
        .cloned()
        .collect()
}

/// Sort most urgent first, newest first within a priority.
pub fn sort_urgent_first(items: &mut [AnnouncementWithReadState]) {
    items.sort_by(|a, b| {
        b.announcement
            .priority
            .cmp(&a.announcement.priority)
            .then(b.announcement.created_at.cmp(&a.announcement.created_at))
    });
}
