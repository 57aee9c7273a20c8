//! Communication service errors.

use thiserror::Error;

use milvault_provider::ProviderError;

use crate::model::{CONTENT_MAX_LEN, TITLE_MAX_LEN};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommunicationError {
    /// The operation needs a signed-in user.
    #[error("sign in to read announcements")]
    NotAuthenticated,

    /// Creating, editing or deleting announcements is for administrators.
    #[error("administrator role required")]
    Forbidden,

    #[error("announcement not found")]
    NotFound,

    #[error("announcement title is empty")]
    EmptyTitle,

    #[error("title is {len} characters, over the {TITLE_MAX_LEN} character limit")]
    TitleTooLong { len: usize },

    #[error("announcement content is empty")]
    EmptyContent,

    #[error("content is {len} characters, over the {CONTENT_MAX_LEN} character limit")]
    ContentTooLong { len: usize },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
