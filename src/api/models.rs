//! Typed records decoded from the panel's JSON envelopes
//!
//! List endpoints return `{data: [{attributes: {...}}], meta: {pagination: {...}}}`,
//! single-object endpoints return `{attributes: {...}}`. Decoding fails fast
//! with [`ApiError::MalformedResponse`] on missing or mistyped fields.

use super::error::ApiError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// A server visible to the API key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    /// Panel short identifier, used in every per-server URL
    pub id: String,
    pub name: String,
    /// Maximum number of retained backups; 0 disables backups
    pub backup_limit: u32,
}

/// A backup belonging to one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub uuid: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub is_locked: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Backup {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// One decoded page of a list endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub total_pages: u32,
}

/// Pagination metadata as sent by the panel
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
}

impl Pagination {
    /// Extract `meta.pagination` from a list envelope, if present
    pub fn from_envelope(value: &Value) -> Option<Self> {
        let raw = value.get("meta")?.get("pagination")?;
        serde_json::from_value(raw.clone()).ok()
    }
}

#[derive(Deserialize)]
struct Item<A> {
    attributes: A,
}

#[derive(Deserialize)]
struct ListEnvelope<A> {
    data: Vec<Item<A>>,
}

#[derive(Deserialize)]
struct ServerAttributes {
    identifier: String,
    name: String,
    feature_limits: FeatureLimits,
}

#[derive(Deserialize)]
struct FeatureLimits {
    backups: u32,
}

#[derive(Deserialize)]
struct BackupAttributes {
    uuid: String,
    name: String,
    created_at: DateTime<Utc>,
    is_locked: bool,
    completed_at: Option<DateTime<Utc>>,
}

impl From<ServerAttributes> for Server {
    fn from(a: ServerAttributes) -> Self {
        Server {
            id: a.identifier,
            name: a.name,
            backup_limit: a.feature_limits.backups,
        }
    }
}

impl From<BackupAttributes> for Backup {
    fn from(a: BackupAttributes) -> Self {
        Backup {
            uuid: a.uuid,
            name: a.name,
            created_at: a.created_at,
            is_locked: a.is_locked,
            completed_at: a.completed_at,
        }
    }
}

fn decode_page<A, T>(value: &Value, what: &str) -> Result<Page<T>, ApiError>
where
    A: DeserializeOwned,
    T: From<A>,
{
    let envelope: ListEnvelope<A> = serde_json::from_value(value.clone())
        .map_err(|e| ApiError::MalformedResponse(format!("{} list: {}", what, e)))?;

    let (page_number, total_pages) = match Pagination::from_envelope(value) {
        // An empty listing reports zero pages; treat it as a single empty page
        Some(p) => (p.current_page.max(1), p.total_pages.max(1)),
        None => (1, 1),
    };

    if page_number > total_pages {
        return Err(ApiError::MalformedResponse(format!(
            "{} list: page {} exceeds total pages {}",
            what, page_number, total_pages
        )));
    }

    Ok(Page {
        items: envelope.data.into_iter().map(|i| T::from(i.attributes)).collect(),
        page_number,
        total_pages,
    })
}

fn decode_single<A, T>(value: &Value, what: &str) -> Result<T, ApiError>
where
    A: DeserializeOwned,
    T: From<A>,
{
    let item: Item<A> = serde_json::from_value(value.clone())
        .map_err(|e| ApiError::MalformedResponse(format!("{}: {}", what, e)))?;
    Ok(T::from(item.attributes))
}

impl Server {
    pub fn page_from_json(value: &Value) -> Result<Page<Server>, ApiError> {
        decode_page::<ServerAttributes, Server>(value, "server")
    }
}

impl Backup {
    pub fn page_from_json(value: &Value) -> Result<Page<Backup>, ApiError> {
        decode_page::<BackupAttributes, Backup>(value, "backup")
    }

    pub fn from_json(value: &Value) -> Result<Backup, ApiError> {
        decode_single::<BackupAttributes, Backup>(value, "backup")
    }
}

/// Sort backups oldest-first, keeping input order for equal timestamps
pub fn sort_by_age(backups: &mut [Backup]) {
    backups.sort_by_key(|b| b.created_at);
}
