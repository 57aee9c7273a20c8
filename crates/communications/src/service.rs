//! Announcement delivery, read tracking and admin authoring.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use milvault_core::{AnnouncementId, Role, User, UserId};
use milvault_provider::TableApi;
use milvault_session::{Notifier, SessionManager, Severity};

use crate::error::CommunicationError;
use crate::model::{
    Announcement, AnnouncementChanges, AnnouncementStats, AnnouncementWithReadState,
    CONTENT_MAX_LEN, NewAnnouncement, Priority, TITLE_MAX_LEN,
};

const ANNOUNCEMENTS_TABLE: &str = "communications";
const RECIPIENTS_TABLE: &str = "communication_recipients";

/// Recipient rows are inner-joined so only addressed announcements come
/// back, and the caller's read state rides along.
const ANNOUNCEMENT_COLUMNS: &str = "id,title,content,priority,category,is_published,published_at,\
     expires_at,created_by,created_at,updated_at,\
     communication_recipients!inner(user_id,read_at,acknowledged_at,created_at)";
const RECIPIENT_FILTER: &str = "communication_recipients.user_id";

/// Announcement operations, read-scoped to the signed-in user and
/// write-gated to administrators.
pub struct CommunicationService {
    session: Arc<SessionManager>,
    tables: TableApi,
    notifier: Arc<dyn Notifier>,
    cache: Mutex<Vec<AnnouncementWithReadState>>,
}

impl CommunicationService {
    pub fn new(
        session: Arc<SessionManager>,
        tables: TableApi,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            tables,
            notifier,
            cache: Mutex::new(Vec::new()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reading
    // ─────────────────────────────────────────────────────────────────────

    /// Announcements addressed to the current user, newest first.
    ///
    /// The result also replaces the local cache that the synchronous
    /// accessors read from.
    pub async fn list(&self) -> Result<Vec<AnnouncementWithReadState>, CommunicationError> {
        let Some(user) = self.session.current_user() else {
            return Ok(Vec::new());
        };

        let fetched: Result<Vec<AnnouncementRow>, _> = self
            .tables
            .select(ANNOUNCEMENTS_TABLE)
            .columns(ANNOUNCEMENT_COLUMNS)
            .eq(RECIPIENT_FILTER, user.id)
            .order("created_at", false)
            .fetch()
            .await;

        let rows = match fetched {
            Ok(rows) => rows,
            Err(err) => {
                self.notifier
                    .notify(Severity::Error, "Failed to load announcements");
                return Err(err.into());
            }
        };

        let items: Vec<_> = rows
            .into_iter()
            .map(AnnouncementRow::into_read_state)
            .collect();
        *self.lock_cache() = items.clone();
        Ok(items)
    }

    pub async fn get(
        &self,
        id: AnnouncementId,
    ) -> Result<Option<AnnouncementWithReadState>, CommunicationError> {
        let Some(user) = self.session.current_user() else {
            return Ok(None);
        };

        let row: Option<AnnouncementRow> = match self
            .tables
            .select(ANNOUNCEMENTS_TABLE)
            .columns(ANNOUNCEMENT_COLUMNS)
            .eq("id", id)
            .eq(RECIPIENT_FILTER, user.id)
            .fetch_one()
            .await
        {
            Ok(row) => row,
            Err(err) => {
                self.notifier
                    .notify(Severity::Error, "Failed to load announcements");
                return Err(err.into());
            }
        };

        Ok(row.map(AnnouncementRow::into_read_state))
    }

    /// Last listed announcements, without a network round trip.
    pub fn cached(&self) -> Vec<AnnouncementWithReadState> {
        self.lock_cache().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.lock_cache().iter().filter(|a| !a.is_read()).count()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read receipts
    // ─────────────────────────────────────────────────────────────────────

    /// Stamp the caller's recipient row as read.
    pub async fn mark_read(&self, id: AnnouncementId) -> Result<(), CommunicationError> {
        let user = self
            .session
            .current_user()
            .ok_or(CommunicationError::NotAuthenticated)?;
        let stamp = Utc::now();

        let updated: Vec<RecipientState> = self
            .tables
            .update(RECIPIENTS_TABLE)
            .eq("communication_id", id)
            .eq("user_id", user.id)
            .apply(&ReadStamp { read_at: stamp })
            .await?;
        if updated.is_empty() {
            return Err(CommunicationError::NotFound);
        }

        if let Some(item) = self
            .lock_cache()
            .iter_mut()
            .find(|item| item.announcement.id == id)
        {
            item.read_at = Some(stamp);
        }
        Ok(())
    }

    /// Stamp the caller's recipient row as acknowledged, marking it read
    /// too if it was not already.
    pub async fn acknowledge(&self, id: AnnouncementId) -> Result<(), CommunicationError> {
        let user = self
            .session
            .current_user()
            .ok_or(CommunicationError::NotAuthenticated)?;
        let stamp = Utc::now();

        // An existing read time survives acknowledgement.
        let already_read = self
            .lock_cache()
            .iter()
            .find(|item| item.announcement.id == id)
            .is_some_and(AnnouncementWithReadState::is_read);

        let patch = AckStamp {
            acknowledged_at: stamp,
            read_at: (!already_read).then_some(stamp),
        };
        let updated: Vec<RecipientState> = self
            .tables
            .update(RECIPIENTS_TABLE)
            .eq("communication_id", id)
            .eq("user_id", user.id)
            .apply(&patch)
            .await?;
        if updated.is_empty() {
            return Err(CommunicationError::NotFound);
        }

        if let Some(item) = self
            .lock_cache()
            .iter_mut()
            .find(|item| item.announcement.id == id)
        {
            item.acknowledged_at = Some(stamp);
            if item.read_at.is_none() {
                item.read_at = Some(stamp);
            }
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Authoring (administrators only)
    // ─────────────────────────────────────────────────────────────────────

    /// Create an announcement authored by the current user. Publishing
    /// immediately stamps `published_at`.
    pub async fn create(&self, new: NewAnnouncement) -> Result<Announcement, CommunicationError> {
        let author = self.require_admin()?;
        validate(&new)?;

        let row = NewAnnouncementRow {
            title: new.title,
            content: new.content,
            priority: new.priority,
            category: new.category,
            is_published: new.publish,
            published_at: new.publish.then(Utc::now),
            expires_at: new.expires_at,
            created_by: author.id,
        };

        match self
            .tables
            .insert_one::<_, Announcement>(ANNOUNCEMENTS_TABLE, &row)
            .await
        {
            Ok(created) => {
                tracing::info!(id = %created.id, "announcement created");
                self.notifier
                    .notify(Severity::Success, "Announcement created");
                Ok(created)
            }
            Err(err) => {
                self.notifier
                    .notify(Severity::Error, "Announcement creation failed");
                Err(err.into())
            }
        }
    }

    /// Apply a partial edit. Setting `published` stamps a fresh
    /// `published_at`.
    pub async fn update(
        &self,
        id: AnnouncementId,
        changes: AnnouncementChanges,
    ) -> Result<Announcement, CommunicationError> {
        self.require_admin()?;

        let patch = StampedChanges {
            changes: &changes,
            published_at: (changes.published == Some(true)).then(Utc::now),
        };

        let rows: Vec<Announcement> = match self
            .tables
            .update(ANNOUNCEMENTS_TABLE)
            .eq("id", id)
            .apply(&patch)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                self.notifier
                    .notify(Severity::Error, "Announcement update failed");
                return Err(err.into());
            }
        };

        let Some(updated) = rows.into_iter().next() else {
            self.notifier
                .notify(Severity::Error, "Announcement update failed");
            return Err(CommunicationError::NotFound);
        };

        if let Some(item) = self
            .lock_cache()
            .iter_mut()
            .find(|item| item.announcement.id == id)
        {
            item.announcement = updated.clone();
        }
        self.notifier
            .notify(Severity::Success, "Announcement updated");
        Ok(updated)
    }

    pub async fn remove(&self, id: AnnouncementId) -> Result<(), CommunicationError> {
        self.require_admin()?;

        if let Err(err) = self
            .tables
            .delete(ANNOUNCEMENTS_TABLE)
            .eq("id", id)
            .execute()
            .await
        {
            self.notifier
                .notify(Severity::Error, "Announcement delete failed");
            return Err(err.into());
        }

        self.lock_cache().retain(|item| item.announcement.id != id);
        self.notifier
            .notify(Severity::Success, "Announcement deleted");
        Ok(())
    }

    /// Address an announcement to `user_ids`. No-op for an empty list.
    pub async fn assign_recipients(
        &self,
        id: AnnouncementId,
        user_ids: &[UserId],
    ) -> Result<(), CommunicationError> {
        self.require_admin()?;
        if user_ids.is_empty() {
            return Ok(());
        }

        let rows: Vec<NewRecipientRow> = user_ids
            .iter()
            .map(|&user_id| NewRecipientRow {
                communication_id: id,
                user_id,
            })
            .collect();

        match self
            .tables
            .insert::<_, RecipientState>(RECIPIENTS_TABLE, &rows)
            .await
        {
            Ok(_) => {
                self.notifier
                    .notify(Severity::Success, "Recipients assigned");
                Ok(())
            }
            Err(err) => {
                self.notifier
                    .notify(Severity::Error, "Recipient assignment failed");
                Err(err.into())
            }
        }
    }

    /// Delivery counters across every recipient of `id`.
    pub async fn stats(&self, id: AnnouncementId) -> Result<AnnouncementStats, CommunicationError> {
        self.require_admin()?;

        let rows: Vec<RecipientState> = self
            .tables
            .select(RECIPIENTS_TABLE)
            .columns("read_at,acknowledged_at")
            .eq("communication_id", id)
            .fetch()
            .await?;

        Ok(AnnouncementStats {
            recipients: rows.len(),
            read: rows.iter().filter(|r| r.read_at.is_some()).count(),
            acknowledged: rows.iter().filter(|r| r.acknowledged_at.is_some()).count(),
        })
    }

    fn require_admin(&self) -> Result<User, CommunicationError> {
        let user = self
            .session
            .current_user()
            .ok_or(CommunicationError::NotAuthenticated)?;
        if user.role != Role::Admin {
            return Err(CommunicationError::Forbidden);
        }
        Ok(user)
    }

    fn lock_cache(&self) -> MutexGuard<'_, Vec<AnnouncementWithReadState>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for CommunicationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommunicationService")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct AnnouncementRow {
    #[serde(flatten)]
    announcement: Announcement,
    #[serde(default)]
    communication_recipients: Vec<RecipientState>,
}

impl AnnouncementRow {
    fn into_read_state(self) -> AnnouncementWithReadState {
        let recipient = self
            .communication_recipients
            .into_iter()
            .next()
            .unwrap_or_default();
        AnnouncementWithReadState {
            announcement: self.announcement,
            read_at: recipient.read_at,
            acknowledged_at: recipient.acknowledged_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RecipientState {
    #[serde(default)]
    read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    acknowledged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct NewAnnouncementRow {
    title: String,
    content: String,
    priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    is_published: bool,
    /// Null while drafting; stamped on publish.
    published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    created_by: UserId,
}

#[derive(Debug, Serialize)]
struct NewRecipientRow {
    communication_id: AnnouncementId,
    user_id: UserId,
}

#[derive(Debug, Serialize)]
struct ReadStamp {
    read_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct AckStamp {
    acknowledged_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct StampedChanges<'a> {
    #[serde(flatten)]
    changes: &'a AnnouncementChanges,
    #[serde(skip_serializing_if = "Option::is_none")]
    published_at: Option<DateTime<Utc>>,
}

fn validate(new: &NewAnnouncement) -> Result<(), CommunicationError> {
    if new.title.trim().is_empty() {
        return Err(CommunicationError::EmptyTitle);
    }
    let title_len = new.title.chars().count();
    if title_len > TITLE_MAX_LEN {
        return Err(CommunicationError::TitleTooLong { len: title_len });
    }
    if new.content.trim().is_empty() {
        return Err(CommunicationError::EmptyContent);
    }
    let content_len = new.content.chars().count();
    if content_len > CONTENT_MAX_LEN {
        return Err(CommunicationError::ContentTooLong { len: content_len });
    }
    Ok(())
}
