//! Authoritative DDL for the managed Postgres database.
//!
//! The remote backend relies on these row-level-security policies; the
//! `SQLite` backend mirrors the table and enforces the same rules in code
//! through `quiz_core::policy`.

/// `progress` table, RLS switch and the three ownership policies.
pub const POSTGRES_SCHEMA: &str = include_str!("../sql/progress.sql");

/// Policy names declared in `POSTGRES_SCHEMA`, in select/insert/update order.
pub const POLICY_NAMES: [&str; 3] = [
    "progress_select_own",
    "progress_insert_own",
    "progress_update_own",
];
