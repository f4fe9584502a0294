//! Clients for the backend endpoints that sit alongside chat. These
//! are plain request/response calls with no streaming.
pub mod client;
pub mod public;

pub use client::{BackendClient, Collection};
pub use public::{Article, ArticleList, ArticleQuery, SortField, SortOrder};
