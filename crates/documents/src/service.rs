//! Document operations over the table and storage surfaces.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use milvault_core::{CategoryId, DocumentId, UserId};
use milvault_provider::{StorageApi, TableApi};
use milvault_session::{Notifier, SessionManager, Severity};

use crate::error::DocumentError;
use crate::model::{
    ALLOWED_FILE_TYPES, Document, DocumentCategory, DocumentFilter, DocumentUpload, MAX_FILE_SIZE,
    sanitize_file_name,
};

const DOCUMENTS_TABLE: &str = "documents";
const CATEGORIES_TABLE: &str = "document_categories";
const DOCUMENT_COLUMNS: &str = "*,category:category_id(id,name,description)";

/// Fixed per-user storage quota in bytes (1 GiB).
pub const STORAGE_QUOTA: u64 = 1024 * 1024 * 1024;

/// Document vault operations, scoped to the signed-in user.
pub struct DocumentService {
    session: Arc<SessionManager>,
    tables: TableApi,
    storage: StorageApi,
    notifier: Arc<dyn Notifier>,
    documents_bucket: String,
    avatars_bucket: String,
    categories: Mutex<Option<Vec<DocumentCategory>>>,
}

impl DocumentService {
    pub fn new(
        session: Arc<SessionManager>,
        tables: TableApi,
        storage: StorageApi,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let config = session.config();
        let documents_bucket = config.documents_bucket.clone();
        let avatars_bucket = config.avatars_bucket.clone();

        Self {
            session,
            tables,
            storage,
            notifier,
            documents_bucket,
            avatars_bucket,
            categories: Mutex::new(None),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Listing and lookup
    // ─────────────────────────────────────────────────────────────────────

    /// The current user's documents, filtered and sorted.
    ///
    /// Without a signed-in user this resolves to an empty list rather than
    /// an error; the vault simply has nothing to show.
    pub async fn list(&self, filter: &DocumentFilter) -> Result<Vec<Document>, DocumentError> {
        let Some(user) = self.session.current_user() else {
            return Ok(Vec::new());
        };

        let mut query = self
            .tables
            .select(DOCUMENTS_TABLE)
            .columns(DOCUMENT_COLUMNS)
            .eq("user_id", user.id)
            .order(filter.sort_by.column(), filter.sort_order.is_ascending());

        if let Some(search) = &filter.search {
            query = query.ilike("title", &format!("*{search}*"));
        }
        if let Some(file_type) = &filter.file_type {
            query = query.eq("file_type", file_type);
        }
        if let Some(category_id) = filter.category_id {
            query = query.eq("category_id", category_id);
        }
        if let Some(classification) = filter.classification {
            query = query.eq("classification", classification);
        }
        if let Some(encrypted) = filter.encrypted {
            query = query.eq("is_encrypted", encrypted);
        }
        if let Some(after) = filter.created_after {
            query = query.gte("created_at", after.to_rfc3339());
        }
        if let Some(before) = filter.created_before {
            query = query.lte("created_at", before.to_rfc3339());
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }

        Ok(query.fetch().await?)
    }

    pub async fn get(&self, id: DocumentId) -> Result<Option<Document>, DocumentError> {
        let doc = self
            .tables
            .select(DOCUMENTS_TABLE)
            .columns(DOCUMENT_COLUMNS)
            .eq("id", id)
            .fetch_one()
            .await?;
        Ok(doc)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Upload and delete
    // ─────────────────────────────────────────────────────────────────────

    /// Validate, store the bytes, then insert the row.
    ///
    /// Validation failures never reach the network.
    pub async fn upload(&self, upload: DocumentUpload) -> Result<Document, DocumentError> {
        let user = self
            .session
            .current_user()
            .ok_or(DocumentError::NotAuthenticated)?;
        validate(&upload)?;

        let path = storage_path(user.id, &upload.file_name);
        let row = NewDocumentRow {
            title: upload
                .title
                .clone()
                .unwrap_or_else(|| upload.file_name.clone()),
            description: upload.description.clone().unwrap_or_default(),
            file_path: path.clone(),
            file_size: upload.bytes.len() as u64,
            file_type: upload.mime_type.clone(),
            category_id: upload.category_id,
            classification: upload.classification.as_str(),
            is_encrypted: upload.encrypted,
            expires_at: upload.expires_at,
            user_id: user.id,
        };

        if let Err(err) = self
            .storage
            .upload(&self.documents_bucket, &path, upload.bytes, &upload.mime_type)
            .await
        {
            self.notifier.notify(Severity::Error, "Document upload failed");
            return Err(err.into());
        }

        match self.tables.insert_one(DOCUMENTS_TABLE, &row).await {
            Ok(doc) => {
                tracing::info!(path, "document uploaded");
                self.notifier.notify(Severity::Success, "Document uploaded");
                Ok(doc)
            }
            Err(err) => {
                tracing::error!(path, "document row insert failed: {err}");
                self.notifier.notify(Severity::Error, "Document upload failed");
                Err(err.into())
            }
        }
    }

    /// Delete the row first, then the stored object. An object that fails
    /// to delete is invisible without its row; a row without its object
    /// would not be.
    pub async fn delete(&self, id: DocumentId) -> Result<(), DocumentError> {
        let Some(doc) = self.get(id).await? else {
            return Err(DocumentError::NotFound);
        };

        self.tables
            .delete(DOCUMENTS_TABLE)
            .eq("id", id)
            .execute()
            .await?;

        if let Err(err) = self
            .storage
            .remove(&self.documents_bucket, std::slice::from_ref(&doc.file_path))
            .await
        {
            tracing::warn!(path = doc.file_path, "document object not removed: {err}");
        }

        self.notifier.notify(Severity::Success, "Document deleted");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // URLs and storage accounting
    // ─────────────────────────────────────────────────────────────────────

    /// Time-limited download URL. `expires_in_secs == 0` yields the stable
    /// public URL instead, with no network call.
    pub async fn signed_url(
        &self,
        path: &str,
        expires_in_secs: u32,
    ) -> Result<String, DocumentError> {
        if expires_in_secs == 0 {
            return Ok(self.public_url(path));
        }
        Ok(self
            .storage
            .create_signed_url(&self.documents_bucket, path, expires_in_secs)
            .await?)
    }

    pub fn public_url(&self, path: &str) -> String {
        self.storage.public_url(&self.documents_bucket, path)
    }

    /// Fetch a document's raw bytes.
    pub async fn download(&self, path: &str) -> Result<Vec<u8>, DocumentError> {
        Ok(self.storage.download(&self.documents_bucket, path).await?)
    }

    /// Total bytes the current user has in the documents bucket.
    pub async fn storage_usage(&self) -> Result<u64, DocumentError> {
        let user = self
            .session
            .current_user()
            .ok_or(DocumentError::NotAuthenticated)?;

        let objects = self
            .storage
            .list(&self.documents_bucket, &user.id.to_string())
            .await?;
        Ok(objects
            .iter()
            .filter_map(|obj| obj.metadata.as_ref().and_then(|m| m.size))
            .sum())
    }

    /// Store the user's avatar, replacing any previous one, and return its
    /// public URL.
    pub async fn upload_avatar(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<String, DocumentError> {
        let user = self
            .session
            .current_user()
            .ok_or(DocumentError::NotAuthenticated)?;
        if bytes.is_empty() {
            return Err(DocumentError::EmptyFile);
        }

        let ext = std::path::Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let path = format!("{}/{}.{ext}", user.id, user.id);

        self.storage
            .upload_overwriting(&self.avatars_bucket, &path, bytes, mime_type)
            .await?;
        Ok(self.storage.public_url(&self.avatars_bucket, &path))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Categories
    // ─────────────────────────────────────────────────────────────────────

    /// Category list, cached after the first successful load.
    pub async fn categories(&self) -> Result<Vec<DocumentCategory>, DocumentError> {
        let mut cache = self.categories.lock().await;
        if let Some(cached) = cache.as_ref() {
            return Ok(cached.clone());
        }

        let loaded = self.load_categories().await?;
        *cache = Some(loaded.clone());
        Ok(loaded)
    }

    /// Force a reload, replacing the cache on success.
    pub async fn refresh_categories(&self) -> Result<Vec<DocumentCategory>, DocumentError> {
        let loaded = self.load_categories().await?;
        *self.categories.lock().await = Some(loaded.clone());
        Ok(loaded)
    }

    async fn load_categories(&self) -> Result<Vec<DocumentCategory>, DocumentError> {
        Ok(self
            .tables
            .select(CATEGORIES_TABLE)
            .order("name", true)
            .fetch()
            .await?)
    }
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("documents_bucket", &self.documents_bucket)
            .field("avatars_bucket", &self.avatars_bucket)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct NewDocumentRow {
    title: String,
    description: String,
    file_path: String,
    file_size: u64,
    file_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    category_id: Option<CategoryId>,
    classification: &'static str,
    is_encrypted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    user_id: UserId,
}

fn validate(upload: &DocumentUpload) -> Result<(), DocumentError> {
    if upload.bytes.is_empty() {
        return Err(DocumentError::EmptyFile);
    }
    let size = upload.bytes.len() as u64;
    if size > MAX_FILE_SIZE {
        return Err(DocumentError::TooLarge { size });
    }
    if !ALLOWED_FILE_TYPES.contains(&upload.mime_type.as_str()) {
        return Err(DocumentError::UnsupportedType(upload.mime_type.clone()));
    }
    Ok(())
}

/// `{owner}/{uuid}_{sanitized name}`; the fresh id keeps re-uploads of the
/// same file name from colliding.
fn storage_path(owner: UserId, file_name: &str) -> String {
    format!(
        "{owner}/{}_{}",
        uuid::Uuid::now_v7(),
        sanitize_file_name(file_name)
    )
}
