//! Ownership rules for progress rows.
//!
//! A caller may only read or write the row whose `user_id` is its own. There
//! is no delete rule: rows disappear only when the owning account is deleted.

use thiserror::Error;

use crate::model::UserId;

/// An operation on a progress row, with the owners it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressAccess {
    Select {
        row_owner: UserId,
    },
    Insert {
        new_owner: UserId,
    },
    Update {
        existing_owner: UserId,
        new_owner: UserId,
    },
}

impl ProgressAccess {
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            ProgressAccess::Select { .. } => "select",
            ProgressAccess::Insert { .. } => "insert",
            ProgressAccess::Update { .. } => "update",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{operation} on progress of {owner} denied for {requester}")]
pub struct PolicyViolation {
    pub operation: &'static str,
    pub requester: UserId,
    pub owner: UserId,
}

#[must_use]
pub fn can_select(requester: UserId, row_owner: UserId) -> bool {
    requester == row_owner
}

#[must_use]
pub fn can_insert(requester: UserId, new_owner: UserId) -> bool {
    requester == new_owner
}

/// Both the current and the post-update owner must be the requester, so a
/// row can never be handed to someone else.
#[must_use]
pub fn can_update(requester: UserId, existing_owner: UserId, new_owner: UserId) -> bool {
    requester == existing_owner && requester == new_owner
}

/// Checks `access` for `requester`.
///
/// # Errors
///
/// Returns `PolicyViolation` naming the first owner that does not match.
pub fn authorize(requester: UserId, access: ProgressAccess) -> Result<(), PolicyViolation> {
    let (allowed, owner) = match access {
        ProgressAccess::Select { row_owner } => (can_select(requester, row_owner), row_owner),
        ProgressAccess::Insert { new_owner } => (can_insert(requester, new_owner), new_owner),
        ProgressAccess::Update {
            existing_owner,
            new_owner,
        } => {
            let owner = if existing_owner == requester {
                new_owner
            } else {
                existing_owner
            };
            (can_update(requester, existing_owner, new_owner), owner)
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(PolicyViolation {
            operation: access.operation(),
            requester,
            owner,
        })
    }
}
