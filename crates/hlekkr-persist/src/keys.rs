//! Key-schema helpers shared by the typed stores

use chrono::{DateTime, Utc};

/// Fixed-width timestamp segment so lexicographic key order matches
/// chronological order.
pub fn sort_key_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
}
