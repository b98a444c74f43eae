use anyhow::Result;

use crate::db::Database;
use crate::models::Contact;

/// Execute the list command: print one page of contact rows.
pub fn run_list(db: &Database, page: u32, limit: u32) -> Result<()> {
    let page = page.max(1);
    let offset = (page - 1) * limit;
    let contacts = db.list_contacts(limit, offset)?;

    if contacts.is_empty() {
        if page == 1 {
            println!("No contacts stored.");
        } else {
            println!("No contacts on page {}.", page);
        }
        return Ok(());
    }

    let stats = db.contact_stats()?;
    println!(
        "{:>6}  {:<30}  {:<16}  {:<16}  CREATED",
        "ID", "EMAIL", "PHONE", "LINK"
    );
    for contact in &contacts {
        println!(
            "{:>6}  {:<30}  {:<16}  {:<16}  {}",
            contact.id,
            contact.email.as_deref().unwrap_or("-"),
            contact.phone.as_deref().unwrap_or("-"),
            link_label(contact),
            contact.created_at.format("%Y-%m-%d %H:%M"),
        );
    }
    println!(
        "\npage {} ({} shown, {} total: {} primary, {} secondary)",
        page,
        contacts.len(),
        stats.total,
        stats.primaries,
        stats.secondaries
    );

    Ok(())
}

fn link_label(contact: &Contact) -> String {
    match contact.linked_id {
        Some(primary_id) => format!("-> {}", primary_id),
        None => contact.link_precedence.as_str().to_string(),
    }
}
