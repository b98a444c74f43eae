use anyhow::{anyhow, Result};

use crate::db::Database;
use crate::engine::consolidate;
use crate::models::Contact;

/// Execute the show command: print the consolidated view of the cluster a
/// contact belongs to, plus its member rows.
pub fn run_show(db: &Database, id: i64) -> Result<()> {
    let contact = db
        .get_contact(id)?
        .ok_or_else(|| anyhow!("No contact with id {}", id))?;

    let primary_id = contact
        .cluster_primary_id()
        .ok_or_else(|| anyhow!("Contact {} has no cluster primary", id))?;

    let cluster = db.fetch_clusters(&[primary_id])?;
    let view = consolidate(&cluster)?;

    println!("Cluster of contact {}", id);
    println!("─────────────────────");
    println!("Primary:     {}", view.primary_id);
    println!("Emails:      {}", join_or_dash(&view.emails));
    println!("Phones:      {}", join_or_dash(&view.phones));
    println!(
        "Secondaries: {}",
        join_or_dash(
            &view
                .secondary_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
        )
    );

    println!("\nMembers:");
    for member in &cluster {
        println!("  {}", describe(member));
    }

    Ok(())
}

fn join_or_dash(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(", ")
    }
}

fn describe(contact: &Contact) -> String {
    format!(
        "#{} {} email={} phone={} created={}",
        contact.id,
        contact.link_precedence.as_str(),
        contact.email.as_deref().unwrap_or("-"),
        contact.phone.as_deref().unwrap_or("-"),
        contact.created_at.format("%Y-%m-%d %H:%M"),
    )
}
