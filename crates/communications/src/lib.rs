//! Internal communications: announcements with per-recipient read state.
//!
//! Everyone addressed on an announcement can read it, mark it read and
//! acknowledge it; creating, editing and deleting require the admin role,
//! checked against the cached session user. [`CommunicationService`] keeps
//! a snapshot of the last listing so boards and badges read synchronously.

pub mod error;
pub mod model;
pub mod service;

pub use error::CommunicationError;
pub use model::{
    Announcement, AnnouncementChanges, AnnouncementStats, AnnouncementWithReadState,
    CONTENT_MAX_LEN, NewAnnouncement, Priority, ReadFilter, TITLE_MAX_LEN, filter_by_priority,
    filter_by_read_state, sort_urgent_first,
};
pub use service::CommunicationService;
