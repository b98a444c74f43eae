//! Linking decisions: whether a request adds new information to a cluster,
//! and whether it bridges two clusters that must merge.

use crate::models::Contact;

/// A merge the current request forces: every losing primary is demoted
/// under the survivor and its secondaries re-pointed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub surviving_id: i64,
    pub losing_ids: Vec<i64>,
}

/// Decide whether the request carries information not yet recorded in any
/// candidate. Returns the primary id the new secondary should link to, or
/// None when nothing new needs to be stored.
pub fn needs_new_secondary(
    existing: &[Contact],
    email: Option<&str>,
    phone: Option<&str>,
) -> Option<i64> {
    if existing.is_empty() {
        return None;
    }

    // The exact pair is already on file.
    let exact_match = existing
        .iter()
        .any(|c| matches_email(c, email) && matches_phone(c, phone));
    if exact_match {
        return None;
    }

    // Candidate lookup guarantees at least one field matches; a miss here
    // means the snapshot is inconsistent, so store nothing.
    let partial_match = existing
        .iter()
        .find(|c| matches_email(c, email) || matches_phone(c, phone))?;

    let has_new_email =
        email.is_some() && !existing.iter().any(|c| matches_email(c, email));
    let has_new_phone =
        phone.is_some() && !existing.iter().any(|c| matches_phone(c, phone));

    if has_new_email || has_new_phone {
        Some(find_primary_contact_id(existing, partial_match))
    } else {
        None
    }
}

/// Resolve the cluster primary for a matched candidate: the candidate
/// itself if primary, its link target if secondary, otherwise any primary
/// among the candidates.
fn find_primary_contact_id(existing: &[Contact], reference: &Contact) -> i64 {
    if reference.is_primary() {
        return reference.id;
    }

    if let Some(linked_id) = reference.linked_id {
        if let Some(primary) = existing.iter().find(|c| c.id == linked_id) {
            return primary.id;
        }
    }

    existing
        .iter()
        .find(|c| c.is_primary())
        .map(|c| c.id)
        .unwrap_or(reference.id)
}

/// Decide whether the request bridges two separate primaries. The survivor
/// is the oldest of all primary candidates; a cluster's identity never
/// changes hands once established.
pub fn plan_merge(
    existing: &[Contact],
    email: Option<&str>,
    phone: Option<&str>,
) -> Option<MergePlan> {
    let primaries: Vec<&Contact> = existing.iter().filter(|c| c.is_primary()).collect();
    if primaries.len() < 2 {
        return None;
    }

    let email_match = primaries.iter().find(|c| matches_email(c, email))?;
    let phone_match = primaries.iter().find(|c| matches_phone(c, phone))?;
    if email_match.id == phone_match.id {
        return None;
    }

    let survivor = primaries
        .iter()
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))?;

    let losing_ids: Vec<i64> = primaries
        .iter()
        .filter(|c| c.id != survivor.id)
        .map(|c| c.id)
        .collect();

    Some(MergePlan {
        surviving_id: survivor.id,
        losing_ids,
    })
}

fn matches_email(contact: &Contact, email: Option<&str>) -> bool {
    email.is_some() && contact.email.as_deref() == email
}

fn matches_phone(contact: &Contact, phone: Option<&str>) -> bool {
    phone.is_some() && contact.phone.as_deref() == phone
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::models::LinkPrecedence;

    fn contact(
        id: i64,
        email: Option<&str>,
        phone: Option<&str>,
        precedence: LinkPrecedence,
        linked_id: Option<i64>,
        age_mins: i64,
    ) -> Contact {
        let created = Utc::now() - Duration::minutes(age_mins);
        Contact {
            id,
            email: email.map(String::from),
            phone: phone.map(String::from),
            link_precedence: precedence,
            linked_id,
            created_at: created,
            updated_at: created,
            deleted_at: None,
        }
    }

    #[test]
    fn test_no_candidates_no_secondary() {
        assert_eq!(needs_new_secondary(&[], Some("a@b.co"), None), None);
    }

    #[test]
    fn test_exact_match_is_noop() {
        let existing = vec![contact(
            1,
            Some("a@b.co"),
            Some("111"),
            LinkPrecedence::Primary,
            None,
            10,
        )];
        assert_eq!(
            needs_new_secondary(&existing, Some("a@b.co"), Some("111")),
            None
        );
    }

    #[test]
    fn test_known_single_field_is_noop() {
        // Request repeats a known email without adding a phone.
        let existing = vec![contact(
            1,
            Some("a@b.co"),
            Some("111"),
            LinkPrecedence::Primary,
            None,
            10,
        )];
        assert_eq!(needs_new_secondary(&existing, Some("a@b.co"), None), None);
    }

    #[test]
    fn test_new_email_links_to_matching_primary() {
        let existing = vec![contact(
            1,
            Some("a@b.co"),
            Some("111"),
            LinkPrecedence::Primary,
            None,
            10,
        )];
        assert_eq!(
            needs_new_secondary(&existing, Some("new@b.co"), Some("111")),
            Some(1)
        );
    }

    #[test]
    fn test_new_phone_links_via_secondary_candidate() {
        // The only candidate is a secondary; the new row must link to the
        // secondary's primary, not to the secondary itself.
        let existing = vec![contact(
            5,
            Some("a@b.co"),
            Some("111"),
            LinkPrecedence::Secondary,
            Some(2),
            10,
        )];
        assert_eq!(
            needs_new_secondary(&existing, Some("a@b.co"), Some("222")),
            Some(2)
        );
    }

    #[test]
    fn test_primary_resolution_falls_back_to_any_primary() {
        // Secondary candidate with a link target outside the candidate set,
        // but another candidate is primary.
        let existing = vec![
            contact(
                5,
                Some("a@b.co"),
                None,
                LinkPrecedence::Secondary,
                Some(99),
                10,
            ),
            contact(3, None, Some("111"), LinkPrecedence::Primary, None, 20),
        ];
        assert_eq!(
            needs_new_secondary(&existing, Some("a@b.co"), Some("333")),
            Some(3)
        );
    }

    #[test]
    fn test_single_primary_never_merges() {
        let existing = vec![
            contact(
                1,
                Some("a@b.co"),
                Some("111"),
                LinkPrecedence::Primary,
                None,
                10,
            ),
            contact(
                2,
                Some("b@b.co"),
                Some("111"),
                LinkPrecedence::Secondary,
                Some(1),
                5,
            ),
        ];
        assert_eq!(plan_merge(&existing, Some("b@b.co"), Some("111")), None);
    }

    #[test]
    fn test_bridge_merges_under_oldest() {
        let existing = vec![
            contact(
                1,
                Some("a@b.co"),
                Some("111"),
                LinkPrecedence::Primary,
                None,
                60,
            ),
            contact(
                2,
                Some("b@b.co"),
                Some("222"),
                LinkPrecedence::Primary,
                None,
                30,
            ),
        ];
        let plan = plan_merge(&existing, Some("a@b.co"), Some("222")).unwrap();
        assert_eq!(plan.surviving_id, 1);
        assert_eq!(plan.losing_ids, vec![2]);
    }

    #[test]
    fn test_same_primary_on_both_fields_no_merge() {
        let existing = vec![
            contact(
                1,
                Some("a@b.co"),
                Some("111"),
                LinkPrecedence::Primary,
                None,
                60,
            ),
            contact(
                2,
                Some("b@b.co"),
                Some("222"),
                LinkPrecedence::Primary,
                None,
                30,
            ),
        ];
        // Both the email and the phone point at contact 1.
        assert_eq!(plan_merge(&existing, Some("a@b.co"), Some("111")), None);
    }

    #[test]
    fn test_three_primaries_all_demoted() {
        let existing = vec![
            contact(
                3,
                Some("c@b.co"),
                Some("111"),
                LinkPrecedence::Primary,
                None,
                10,
            ),
            contact(
                1,
                Some("a@b.co"),
                Some("333"),
                LinkPrecedence::Primary,
                None,
                90,
            ),
            contact(
                2,
                Some("b@b.co"),
                Some("222"),
                LinkPrecedence::Primary,
                None,
                40,
            ),
        ];
        let plan = plan_merge(&existing, Some("c@b.co"), Some("222")).unwrap();
        assert_eq!(plan.surviving_id, 1);
        let mut losing = plan.losing_ids.clone();
        losing.sort_unstable();
        assert_eq!(losing, vec![2, 3]);
    }

    #[test]
    fn test_tied_created_at_survivor_is_lowest_id() {
        let created = Utc::now();
        let mut a = contact(
            2,
            Some("a@b.co"),
            Some("111"),
            LinkPrecedence::Primary,
            None,
            0,
        );
        let mut b = contact(
            1,
            Some("b@b.co"),
            Some("222"),
            LinkPrecedence::Primary,
            None,
            0,
        );
        a.created_at = created;
        b.created_at = created;
        let plan = plan_merge(&[a, b], Some("a@b.co"), Some("222")).unwrap();
        assert_eq!(plan.surviving_id, 1);
        assert_eq!(plan.losing_ids, vec![2]);
    }
}
