//! Shared constants used across tender-harvest crates.

/// Minimum number of valid ledger ids required before any reconciliation
/// mutation is allowed. A smaller set is treated as a bad snapshot of the
/// ledger (mid-update or empty read) and aborts the run.
pub const SAFETY_MIN_VALID_IDS: usize = 5;

/// Maximum length of a sanitized attachment description.
pub const MAX_DESCRIPTION_LEN: usize = 80;

/// Minimum sanitized description length for remote dedup matching.
/// Shorter descriptions are too generic to match against safely.
pub const DEDUP_MIN_DESCRIPTION_LEN: usize = 3;

/// Default number of records processed per batch within a shard.
pub const DEFAULT_BATCH_SIZE: usize = 25;
