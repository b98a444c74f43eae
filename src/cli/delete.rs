use anyhow::{anyhow, Result};

use crate::db::Database;

/// Execute the delete command: tombstone a contact. The reconciliation
/// engine never deletes anything itself; this is the only path that does.
pub fn run_delete(db: &Database, id: i64) -> Result<()> {
    if db.soft_delete_contact(id)? {
        println!("Deleted contact {}", id);
        Ok(())
    } else {
        Err(anyhow!("No contact with id {}", id))
    }
}
