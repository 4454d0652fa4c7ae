//! Reconciliation of batched read results.
//!
//! A batched read answers with two sets: records that were served and keys
//! that were left unprocessed. Requested keys in neither set do not exist.
//! [`reconcile_batch`] folds the three categories into exactly one outcome per
//! distinct requested key.

use std::collections::{HashMap, HashSet};

/// What happened to one requested key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome<R> {
    /// The table returned a record for the key.
    Served { key: String, record: R },
    /// The table declined to serve the key in this round.
    Unprocessed { key: String },
    /// The table has no record for the key.
    NotFound { key: String },
}

impl<R> BatchOutcome<R> {
    pub fn key(&self) -> &str {
        match self {
            Self::Served { key, .. } | Self::Unprocessed { key } | Self::NotFound { key } => key,
        }
    }

    pub fn is_served(&self) -> bool {
        matches!(self, Self::Served { .. })
    }
}

/// Fold served records and unprocessed keys into one outcome per requested key.
///
/// Outcomes follow the first-occurrence order of `requested`; duplicates are
/// collapsed. Served records for keys that were never requested are dropped.
pub fn reconcile_batch<R>(
    requested: &[String],
    mut served: HashMap<String, R>,
    unprocessed: &HashSet<String>,
) -> Vec<BatchOutcome<R>> {
    let mut seen = HashSet::with_capacity(requested.len());
    let mut outcomes = Vec::with_capacity(requested.len());

    for key in requested {
        if !seen.insert(key.as_str()) {
            continue;
        }
        let outcome = match served.remove(key) {
            Some(record) => BatchOutcome::Served {
                key: key.clone(),
                record,
            },
            None if unprocessed.contains(key) => BatchOutcome::Unprocessed { key: key.clone() },
            None => BatchOutcome::NotFound { key: key.clone() },
        };
        outcomes.push(outcome);
    }

    outcomes
}
