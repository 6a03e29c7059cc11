//! Remote panel API: transport-agnostic client, typed records and endpoints

pub mod client;
pub mod error;
pub mod models;
pub mod panel;

pub use client::{ApiRequest, PagedApiClient, RetryPolicy};
pub use error::ApiError;
pub use models::{sort_by_age, Backup, Page, Pagination, Server};
pub use panel::PanelApi;
