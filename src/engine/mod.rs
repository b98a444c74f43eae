//! Contact reconciliation engine.
//!
//! Given an identity fragment (email and/or phone), decides whether it
//! belongs to a known contact cluster, records new identifiers as secondary
//! contacts, merges clusters the fragment bridges, and returns the
//! consolidated view of every identifier belonging to the person.
//!
//! The flow is four phases against the store: look up candidates, decide
//! what to write, write it, then re-read the whole cluster and fold it.
//! Callers are responsible for making one invocation atomic with respect to
//! others touching the same identifiers (the SQLite store does this by
//! running the whole sequence in one immediate transaction).

mod consolidate;
mod linking;
mod store;

pub use consolidate::consolidate;
pub use linking::{needs_new_secondary, plan_merge, MergePlan};
pub use store::{ContactStore, MemoryStore};

use anyhow::Result;
use thiserror::Error;

use crate::models::{ConsolidatedContact, Contact, NewContact};

/// Internal-consistency failures. These indicate an invariant was broken
/// elsewhere and must never be swallowed.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no contacts to consolidate")]
    EmptyCluster,
    #[error("cluster contains no primary contact")]
    MissingPrimary,
}

/// Run one reconciliation request. Input must be normalized (trimmed,
/// non-empty, at least one identifier present).
pub fn identify<S: ContactStore>(
    store: &S,
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<ConsolidatedContact> {
    // Lookup: every non-deleted contact sharing the email or the phone.
    let existing = store.find_by_email_or_phone(email, phone)?;

    if existing.is_empty() {
        // Nobody we know. Start a new cluster.
        let contact = store.insert_contact(&NewContact::primary(email, phone))?;
        return Ok(ConsolidatedContact::single(&contact));
    }

    // Decide + mutate: record new information against the matched cluster.
    if let Some(primary_id) = needs_new_secondary(&existing, email, phone) {
        store.insert_contact(&NewContact::secondary(email, phone, primary_id))?;
    }

    // Decide + mutate: collapse clusters the request bridges. Operates on
    // the pre-insert snapshot; the row created above is not a primary and
    // cannot affect the plan.
    if let Some(plan) = plan_merge(&existing, email, phone) {
        store.merge_clusters(plan.surviving_id, &plan.losing_ids)?;
    }

    // Refold: re-read the full cluster, since the writes above created or
    // re-linked rows the first snapshot does not show.
    let cluster = store.fetch_clusters(&cluster_primary_ids(&existing))?;
    consolidate(&cluster)
}

/// Primary ids reachable from a candidate set: the candidate itself when
/// primary, its link target when secondary.
fn cluster_primary_ids(existing: &[Contact]) -> Vec<i64> {
    let mut ids: Vec<i64> = Vec::new();
    for contact in existing {
        if let Some(primary_id) = contact.cluster_primary_id() {
            if !ids.contains(&primary_id) {
                ids.push(primary_id);
            }
        }
    }
    ids
}
