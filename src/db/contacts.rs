use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Row};

use super::Database;
use crate::engine::{self, ContactStore};
use crate::models::{ConsolidatedContact, Contact, IdentifyRequest, LinkPrecedence, NewContact};

/// Store-wide row counts, split by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactStats {
    pub total: i64,
    pub primaries: i64,
    pub secondaries: i64,
}

impl Database {
    // ==================== RECONCILIATION ====================

    /// Run one reconciliation request in a single write transaction.
    ///
    /// BEGIN IMMEDIATE takes the write lock before the candidate lookup, so
    /// concurrent requests carrying the same email or phone serialize
    /// instead of racing the lookup-then-insert sequence.
    pub fn identify(&self, request: &IdentifyRequest) -> Result<ConsolidatedContact> {
        self.conn.execute("BEGIN IMMEDIATE", [])?;

        match engine::identify(self, request.email.as_deref(), request.phone.as_deref()) {
            Ok(view) => {
                self.conn.execute("COMMIT", [])?;
                Ok(view)
            }
            Err(e) => {
                let _ = self.conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    // ==================== CONTACT CREATE ====================

    pub fn insert_contact(&self, new: &NewContact) -> Result<Contact> {
        let now = Utc::now();
        self.conn.execute(
            r#"INSERT INTO contacts (
                email, phone, linked_id, link_precedence, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)"#,
            params![
                new.email,
                new.phone,
                new.linked_id,
                new.link_precedence.as_str(),
                format_timestamp(now),
                format_timestamp(now),
            ],
        )?;

        Ok(Contact {
            id: self.conn.last_insert_rowid(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            link_precedence: new.link_precedence,
            linked_id: new.linked_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    // ==================== CONTACT READ ====================

    pub fn get_contact(&self, id: i64) -> Result<Option<Contact>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM contacts WHERE id = ? AND deleted_at IS NULL",
        )?;

        let mut rows = stmt.query_map([id], Self::row_to_contact)?;
        match rows.next() {
            Some(contact) => Ok(Some(contact?)),
            None => Ok(None),
        }
    }

    pub fn list_contacts(&self, limit: u32, offset: u32) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM contacts WHERE deleted_at IS NULL
             ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
        )?;

        let contacts = stmt
            .query_map([limit, offset], Self::row_to_contact)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contacts)
    }

    pub fn find_contacts_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>> {
        let (sql, values): (&str, Vec<&str>) = match (email, phone) {
            (Some(e), Some(p)) => (
                "SELECT * FROM contacts WHERE (email = ? OR phone = ?) AND deleted_at IS NULL
                 ORDER BY created_at ASC, id ASC",
                vec![e, p],
            ),
            (Some(e), None) => (
                "SELECT * FROM contacts WHERE email = ? AND deleted_at IS NULL
                 ORDER BY created_at ASC, id ASC",
                vec![e],
            ),
            (None, Some(p)) => (
                "SELECT * FROM contacts WHERE phone = ? AND deleted_at IS NULL
                 ORDER BY created_at ASC, id ASC",
                vec![p],
            ),
            (None, None) => return Ok(Vec::new()),
        };

        let mut stmt = self.conn.prepare(sql)?;
        let contacts = stmt
            .query_map(params_from_iter(values), Self::row_to_contact)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contacts)
    }

    pub fn fetch_clusters(&self, primary_ids: &[i64]) -> Result<Vec<Contact>> {
        if primary_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; primary_ids.len()].join(", ");
        let sql = format!(
            "SELECT * FROM contacts
             WHERE (id IN ({placeholders}) OR linked_id IN ({placeholders}))
               AND deleted_at IS NULL
             ORDER BY created_at ASC, id ASC"
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let contacts = stmt
            .query_map(
                params_from_iter(primary_ids.iter().chain(primary_ids.iter())),
                Self::row_to_contact,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contacts)
    }

    pub fn contact_stats(&self) -> Result<ContactStats> {
        let (total, primaries) = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN link_precedence = 'primary' THEN 1 ELSE 0 END), 0)
             FROM contacts WHERE deleted_at IS NULL",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;

        Ok(ContactStats {
            total,
            primaries,
            secondaries: total - primaries,
        })
    }

    // ==================== CONTACT UPDATE ====================

    /// Demote each losing primary under the survivor and re-point every
    /// contact linked to it. The savepoint keeps the pair of updates atomic
    /// whether or not an outer transaction is open.
    pub fn merge_clusters(&self, surviving_id: i64, losing_ids: &[i64]) -> Result<()> {
        if losing_ids.is_empty() {
            return Ok(());
        }

        let now = format_timestamp(Utc::now());
        self.conn.execute("SAVEPOINT merge_clusters", [])?;

        for &losing_id in losing_ids {
            let demote = self.conn.execute(
                "UPDATE contacts
                 SET link_precedence = 'secondary', linked_id = ?, updated_at = ?
                 WHERE id = ?",
                params![surviving_id, now, losing_id],
            );
            let repoint = demote.and_then(|_| {
                self.conn.execute(
                    "UPDATE contacts SET linked_id = ?, updated_at = ? WHERE linked_id = ?",
                    params![surviving_id, now, losing_id],
                )
            });

            if let Err(e) = repoint {
                let _ = self.conn.execute("ROLLBACK TO merge_clusters", []);
                let _ = self.conn.execute("RELEASE merge_clusters", []);
                return Err(e.into());
            }
        }

        self.conn.execute("RELEASE merge_clusters", [])?;
        Ok(())
    }

    /// Tombstone a contact so it no longer participates in matching or
    /// consolidation. Returns false if the contact was unknown or already
    /// deleted.
    pub fn soft_delete_contact(&self, id: i64) -> Result<bool> {
        let now = format_timestamp(Utc::now());
        let rows = self.conn.execute(
            "UPDATE contacts SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
            params![now, now, id],
        )?;
        Ok(rows > 0)
    }

    // ==================== ROW MAPPERS ====================

    fn row_to_contact(row: &Row) -> rusqlite::Result<Contact> {
        let link_precedence: String = row.get("link_precedence")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;
        let deleted_at: Option<String> = row.get("deleted_at")?;

        Ok(Contact {
            id: row.get("id")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            link_precedence: LinkPrecedence::parse(&link_precedence),
            linked_id: row.get("linked_id")?,
            created_at: parse_timestamp(&created_at),
            updated_at: parse_timestamp(&updated_at),
            deleted_at: deleted_at.as_deref().and_then(|s| {
                chrono::DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
            }),
        })
    }
}

/// Fixed-width RFC 3339 so lexical ordering in SQL matches time ordering.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl ContactStore for Database {
    fn find_by_email_or_phone(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Vec<Contact>> {
        self.find_contacts_by_email_or_phone(email, phone)
    }

    fn insert_contact(&self, new: &NewContact) -> Result<Contact> {
        Database::insert_contact(self, new)
    }

    fn merge_clusters(&self, surviving_id: i64, losing_ids: &[i64]) -> Result<()> {
        Database::merge_clusters(self, surviving_id, losing_ids)
    }

    fn fetch_clusters(&self, primary_ids: &[i64]) -> Result<Vec<Contact>> {
        Database::fetch_clusters(self, primary_ids)
    }
}
