//! Document vault: classified file storage scoped to the signed-in user.
//!
//! Files are validated locally (size, type) before any bytes move, stored
//! under an owner-scoped path, and described by a `documents` row carrying
//! classification and retention fields. [`DocumentService`] is the only
//! entry point; it reads identity from the session and never caches rows.

pub mod error;
pub mod model;
pub mod service;

pub use error::DocumentError;
pub use model::{
    ALLOWED_FILE_TYPES, Classification, Document, DocumentCategory, DocumentFilter, DocumentSort,
    DocumentUpload, MAX_FILE_SIZE, SortOrder, sanitize_file_name,
};
pub use service::{DocumentService, STORAGE_QUOTA};
