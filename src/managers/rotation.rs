//! Backup rotation policy
//!
//! Decides which backups to evict so that, after rotation, a server has room
//! for exactly one new backup under its quota. Locked backups are never
//! selected; when locks prevent reaching the target the remainder is reported
//! as a shortfall instead of failing.

use crate::api::Backup;

/// Outcome of [`decide`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetentionDecision {
    /// Backups to delete, oldest first
    pub to_delete: Vec<Backup>,
    /// Deletions that were needed but blocked by locked backups
    pub shortfall: u32,
}

impl RetentionDecision {
    pub fn is_noop(&self) -> bool {
        self.to_delete.is_empty() && self.shortfall == 0
    }
}

/// Compute the backups to delete.
///
/// `backups` must be sorted oldest-first with a stable sort. A quota of zero
/// means no backups are retained at all.
pub fn decide(backups: &[Backup], quota: u32) -> RetentionDecision {
    let count = backups.len();
    let quota = quota as usize;

    if count < quota {
        return RetentionDecision::default();
    }

    let mut remaining = if quota == 0 { count } else { count - quota + 1 };

    let mut to_delete = Vec::with_capacity(remaining);
    for backup in backups {
        if remaining == 0 {
            break;
        }
        if backup.is_locked {
            continue;
        }
        to_delete.push(backup.clone());
        remaining -= 1;
    }

    RetentionDecision {
        to_delete,
        shortfall: u32::try_from(remaining).unwrap_or(u32::MAX),
    }
}
