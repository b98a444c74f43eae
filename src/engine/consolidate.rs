//! Folding a cluster's rows into the externally-visible consolidated view.

use anyhow::Result;

use super::EngineError;
use crate::models::{ConsolidatedContact, Contact};

/// Fold a freshly-fetched cluster into its consolidated view.
///
/// The primary's identifiers come first; secondaries contribute theirs in
/// creation order, first occurrence wins, exact string comparison. An empty
/// cluster or one without a primary means an invariant was violated
/// upstream, never a user error.
pub fn consolidate(contacts: &[Contact]) -> Result<ConsolidatedContact> {
    if contacts.is_empty() {
        return Err(EngineError::EmptyCluster.into());
    }

    // The merge step guarantees at most one primary; pick the oldest in
    // case a lagging snapshot still shows more than one.
    let primary = contacts
        .iter()
        .filter(|c| c.is_primary())
        .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        .ok_or(EngineError::MissingPrimary)?;

    let mut secondaries: Vec<&Contact> = contacts
        .iter()
        .filter(|c| !c.is_primary() && c.linked_id == Some(primary.id))
        .collect();
    secondaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let mut emails: Vec<String> = Vec::new();
    let mut phones: Vec<String> = Vec::new();
    for contact in std::iter::once(primary).chain(secondaries.iter().copied()) {
        if let Some(ref email) = contact.email {
            if !emails.contains(email) {
                emails.push(email.clone());
            }
        }
        if let Some(ref phone) = contact.phone {
            if !phones.contains(phone) {
                phones.push(phone.clone());
            }
        }
    }

    Ok(ConsolidatedContact {
        primary_id: primary.id,
        emails,
        phones,
        secondary_ids: secondaries.iter().map(|c| c.id).collect(),
    })
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
    fn test_primary_identifiers_come_first() {
        let cluster = vec![
            contact(
                2,
                Some("b@b.co"),
                Some("222"),
                LinkPrecedence::Secondary,
                Some(1),
                30,
            ),
            contact(
                1,
                Some("a@b.co"),
                Some("111"),
                LinkPrecedence::Primary,
                None,
                60,
            ),
        ];
        let view = consolidate(&cluster).unwrap();
        assert_eq!(view.primary_id, 1);
        assert_eq!(view.emails, vec!["a@b.co", "b@b.co"]);
        assert_eq!(view.phones, vec!["111", "222"]);
        assert_eq!(view.secondary_ids, vec![2]);
    }

    #[test]
    fn test_duplicate_identifiers_folded() {
        let cluster = vec![
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
                Some("a@b.co"),
                Some("222"),
                LinkPrecedence::Secondary,
                Some(1),
                30,
            ),
            contact(
                3,
                Some("b@b.co"),
                Some("111"),
                LinkPrecedence::Secondary,
                Some(1),
                10,
            ),
        ];
        let view = consolidate(&cluster).unwrap();
        assert_eq!(view.emails, vec!["a@b.co", "b@b.co"]);
        assert_eq!(view.phones, vec!["111", "222"]);
        assert_eq!(view.secondary_ids, vec![2, 3]);
    }

    #[test]
    fn test_secondaries_ordered_by_creation_with_id_tiebreak() {
        let created = Utc::now();
        let mut first = contact(
            9,
            Some("x@b.co"),
            None,
            LinkPrecedence::Secondary,
            Some(1),
            0,
        );
        let mut second = contact(
            4,
            Some("y@b.co"),
            None,
            LinkPrecedence::Secondary,
            Some(1),
            0,
        );
        first.created_at = created;
        second.created_at = created;
        let cluster = vec![
            first,
            second,
            contact(1, Some("a@b.co"), None, LinkPrecedence::Primary, None, 60),
        ];
        let view = consolidate(&cluster).unwrap();
        // Equal timestamps fall back to id order.
        assert_eq!(view.secondary_ids, vec![4, 9]);
        assert_eq!(view.emails, vec!["a@b.co", "y@b.co", "x@b.co"]);
    }

    #[test]
    fn test_missing_fields_produce_empty_lists() {
        let cluster = vec![contact(
            1,
            None,
            Some("111"),
            LinkPrecedence::Primary,
            None,
            0,
        )];
        let view = consolidate(&cluster).unwrap();
        assert!(view.emails.is_empty());
        assert_eq!(view.phones, vec!["111"]);
    }

    #[test]
    fn test_empty_cluster_is_fatal() {
        let err = consolidate(&[]).unwrap_err();
        assert!(err.downcast_ref::<EngineError>() == Some(&EngineError::EmptyCluster));
    }

    #[test]
    fn test_cluster_without_primary_is_fatal() {
        let cluster = vec![contact(
            2,
            Some("a@b.co"),
            None,
            LinkPrecedence::Secondary,
            Some(1),
            0,
        )];
        let err = consolidate(&cluster).unwrap_err();
        assert!(err.downcast_ref::<EngineError>() == Some(&EngineError::MissingPrimary));
    }
}
