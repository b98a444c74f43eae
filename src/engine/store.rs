//! Storage interface required by the reconciliation engine.
//!
//! The engine only needs four operations; anything implementing them can
//! back it. `Database` implements this over SQLite, and `MemoryStore`
//! provides a standalone in-memory implementation for tests and embedding.

use std::cell::RefCell;

use anyhow::Result;
use chrono::Utc;

use crate::models::{Contact, LinkPrecedence, NewContact};

pub trait ContactStore {
    /// All non-deleted contacts whose email or phone equals the given
    /// values, oldest first (created_at ascending, id breaking ties).
    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>>;

    /// Insert a contact, assigning its id and timestamps.
    fn insert_contact(&self, new: &NewContact) -> Result<Contact>;

    /// Merge clusters: demote each losing primary to secondary under the
    /// survivor and re-point every contact linked to it, as one atomic unit.
    /// No secondary may be left pointing at a demoted primary.
    fn merge_clusters(&self, surviving_id: i64, losing_ids: &[i64]) -> Result<()>;

    /// All non-deleted contacts whose id or linked_id is among the given
    /// primary ids, oldest first.
    fn fetch_clusters(&self, primary_ids: &[i64]) -> Result<Vec<Contact>>;
}

/// In-memory contact store with the same ordering and tombstone semantics
/// as the SQLite store. Single-threaded; interior mutability so it can sit
/// behind the same `&self` interface.
#[derive(Debug, Default)]
pub struct MemoryStore {
    contacts: RefCell<Vec<Contact>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tombstone a contact so it no longer participates in matching.
    pub fn soft_delete(&self, id: i64) {
        let mut contacts = self.contacts.borrow_mut();
        if let Some(contact) = contacts.iter_mut().find(|c| c.id == id) {
            contact.deleted_at = Some(Utc::now());
        }
    }

    /// Number of rows, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.contacts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.borrow().is_empty()
    }

    fn sorted_oldest_first(mut contacts: Vec<Contact>) -> Vec<Contact> {
        contacts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        contacts
    }
}

impl ContactStore for MemoryStore {
    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>> {
        let matches: Vec<Contact> = self
            .contacts
            .borrow()
            .iter()
            .filter(|c| c.deleted_at.is_none())
            .filter(|c| {
                email.is_some() && c.email.as_deref() == email
                    || phone.is_some() && c.phone.as_deref() == phone
            })
            .cloned()
            .collect();
        Ok(Self::sorted_oldest_first(matches))
    }

    fn insert_contact(&self, new: &NewContact) -> Result<Contact> {
        let mut contacts = self.contacts.borrow_mut();
        let now = Utc::now();
        let contact = Contact {
            id: contacts.iter().map(|c| c.id).max().unwrap_or(0) + 1,
            email: new.email.clone(),
            phone: new.phone.clone(),
            link_precedence: new.link_precedence,
            linked_id: new.linked_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        contacts.push(contact.clone());
        Ok(contact)
    }

    fn merge_clusters(&self, surviving_id: i64, losing_ids: &[i64]) -> Result<()> {
        let mut contacts = self.contacts.borrow_mut();
        let now = Utc::now();
        for &losing_id in losing_ids {
            for contact in contacts.iter_mut() {
                if contact.id == losing_id {
                    contact.link_precedence = LinkPrecedence::Secondary;
                    contact.linked_id = Some(surviving_id);
                    contact.updated_at = now;
                } else if contact.linked_id == Some(losing_id) {
                    contact.linked_id = Some(surviving_id);
                    contact.updated_at = now;
                }
            }
        }
        Ok(())
    }

    fn fetch_clusters(&self, primary_ids: &[i64]) -> Result<Vec<Contact>> {
        let matches: Vec<Contact> = self
            .contacts
            .borrow()
            .iter()
            .filter(|c| c.deleted_at.is_none())
            .filter(|c| {
                primary_ids.contains(&c.id)
                    || c.linked_id.map_or(false, |id| primary_ids.contains(&id))
            })
            .cloned()
            .collect();
        Ok(Self::sorted_oldest_first(matches))
    }
}
