use anyhow::Result;

use crate::db::Database;
use crate::models::IdentifyRequest;

/// Execute the identify command: reconcile one identity fragment against
/// the local database and print the consolidated view as JSON.
pub fn run_identify(db: &Database, email: Option<String>, phone: Option<String>) -> Result<()> {
    let mut request = IdentifyRequest::new(email, phone);
    request.normalize_and_validate()?;

    let view = db.identify(&request)?;
    println!("{}", serde_json::to_string_pretty(&view)?);

    Ok(())
}
