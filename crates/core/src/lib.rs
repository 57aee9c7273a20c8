//! `milvault-core`: shared domain vocabulary for the vault client.
//!
//! This crate contains **pure domain** primitives (no network or storage
//! concerns): identifiers, the user/role model, the error taxonomy and the
//! environment configuration every other crate reads.

pub mod config;
pub mod error;
pub mod id;
pub mod token;
pub mod user;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use id::{AnnouncementId, CategoryId, DocumentId, UserId};
pub use token::TokenPair;
pub use user::{ProfileUpdate, Rank, Registration, Role, User};
