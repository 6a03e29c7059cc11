//! Panel JSON fixtures
//!
//! Builders for the envelopes the panel returns. Timestamps are hours after
//! a fixed base so ordering in tests is explicit.

use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};

/// A server entry for a list envelope
pub fn server(id: &str, name: &str, backup_limit: u32) -> Value {
    json!({
        "object": "server",
        "attributes": {
            "server_owner": true,
            "identifier": id,
            "uuid": format!("{}-0000-0000-0000-000000000000", id),
            "name": name,
            "feature_limits": { "databases": 2, "allocations": 1, "backups": backup_limit }
        }
    })
}

fn timestamp(hour: i64) -> String {
    (Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)).to_rfc3339()
}

fn backup_attributes(uuid: &str, hour: i64, locked: bool, completed: bool) -> Value {
    json!({
        "uuid": uuid,
        "name": format!("Backup at {}", timestamp(hour)),
        "ignored_files": [],
        "checksum": Value::Null,
        "bytes": 0,
        "created_at": timestamp(hour),
        "completed_at": if completed { json!(timestamp(hour + 1)) } else { Value::Null },
        "is_successful": completed,
        "is_locked": locked
    })
}

/// A completed, unlocked backup entry created `hour` hours after the base
pub fn backup(uuid: &str, hour: i64) -> Value {
    json!({ "object": "backup", "attributes": backup_attributes(uuid, hour, false, true) })
}

/// A completed, locked backup entry
pub fn locked_backup(uuid: &str, hour: i64) -> Value {
    json!({ "object": "backup", "attributes": backup_attributes(uuid, hour, true, true) })
}

/// Single-object body for a backup still in progress
pub fn backup_in_progress(uuid: &str) -> Value {
    json!({ "object": "backup", "attributes": backup_attributes(uuid, 100, false, false) })
}

/// Single-object body for a completed backup
pub fn backup_completed(uuid: &str) -> Value {
    json!({ "object": "backup", "attributes": backup_attributes(uuid, 100, false, true) })
}

/// A list envelope for one page
pub fn list_page(items: Vec<Value>, current_page: u32, total_pages: u32) -> Value {
    let count = items.len();
    json!({
        "object": "list",
        "data": items,
        "meta": {
            "pagination": {
                "total": count,
                "count": count,
                "per_page": 50,
                "current_page": current_page,
                "total_pages": total_pages,
                "links": {}
            }
        }
    })
}

/// A complete single-page listing
pub fn list(items: Vec<Value>) -> Value {
    list_page(items, 1, 1)
}
