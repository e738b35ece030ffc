use chrono::{DateTime, Utc};

use super::domain::{normalize_email, NewSubmission, StudentDetails, Submission, SubmissionId};
use super::eligibility::{CompanyKey, EligibilityEntry};
use super::identity::IdentityId;

/// Equality filters supported by the submission collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionFilter {
    All,
    Owner(IdentityId),
    /// Matched case-insensitively after trimming.
    Email(String),
}

impl SubmissionFilter {
    pub fn matches(&self, submission: &Submission) -> bool {
        match self {
            SubmissionFilter::All => true,
            SubmissionFilter::Owner(owner) => submission.owner == *owner,
            SubmissionFilter::Email(email) => {
                submission.details.email_key() == normalize_email(email)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmissionOrder {
    #[default]
    Unordered,
    NewestFirst,
}

impl SubmissionOrder {
    pub fn apply(self, submissions: &mut [Submission]) {
        if self == SubmissionOrder::NewestFirst {
            submissions.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        }
    }
}

/// Partial update applied atomically by the store. `Eligibility` touches a
/// single key of the map and leaves every other entry alone.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionPatch {
    Details {
        details: StudentDetails,
        timestamp: DateTime<Utc>,
    },
    Eligibility {
        company: CompanyKey,
        entry: EligibilityEntry,
    },
}

impl SubmissionPatch {
    pub fn apply(self, submission: &mut Submission) {
        match self {
            SubmissionPatch::Details { details, timestamp } => {
                submission.details = details;
                submission.timestamp = timestamp;
            }
            SubmissionPatch::Eligibility { company, entry } => {
                submission.eligibility.insert(company, entry);
            }
        }
    }
}

/// Document store collaborator holding the submissions collection.
///
/// Implementations must keep the owning identity and the normalized email
/// unique across documents, answering with [`StoreError::Conflict`] on
/// inserts or detail updates that would break either.
pub trait SubmissionStore: Send + Sync {
    fn query(
        &self,
        filter: &SubmissionFilter,
        order: SubmissionOrder,
    ) -> Result<Vec<Submission>, StoreError>;
    fn get_all(&self) -> Result<Vec<Submission>, StoreError>;
    fn fetch(&self, id: &SubmissionId) -> Result<Option<Submission>, StoreError>;
    fn insert(&self, submission: NewSubmission) -> Result<Submission, StoreError>;
    fn update(&self, id: &SubmissionId, patch: SubmissionPatch) -> Result<(), StoreError>;
    fn delete(&self, id: &SubmissionId) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("submission already exists")]
    Conflict,
    #[error("submission not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// True when a document for `owner` or `email_key` would collide with
/// `existing`.
pub fn violates_uniqueness(existing: &Submission, owner: &IdentityId, email_key: &str) -> bool {
    existing.owner == *owner || existing.details.email_key() == email_key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::domain::Stream;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn submission(id: &str, email: &str, hour: u32) -> Submission {
        Submission {
            id: SubmissionId(id.to_string()),
            owner: IdentityId(format!("uid-{id}")),
            details: StudentDetails {
                name: id.to_string(),
                email: email.to_string(),
                sr_number: "SR".to_string(),
                university_number: "U".to_string(),
                cgpa: 8.0,
                stream: Stream::Cse,
            },
            timestamp: Utc.with_ymd_and_hms(2025, 1, 2, hour, 0, 0).unwrap(),
            eligibility: BTreeMap::new(),
        }
    }

    #[test]
    fn email_filter_is_case_insensitive() {
        let record = submission("a", "Asha@Example.edu", 9);
        assert!(SubmissionFilter::Email(" asha@example.EDU ".to_string()).matches(&record));
        assert!(!SubmissionFilter::Email("ravi@example.edu".to_string()).matches(&record));
        assert!(SubmissionFilter::Owner(IdentityId("uid-a".to_string())).matches(&record));
    }

    #[test]
    fn newest_first_sorts_by_timestamp_descending() {
        let mut records = vec![
            submission("old", "a@x", 8),
            submission("new", "b@x", 11),
            submission("mid", "c@x", 9),
        ];
        SubmissionOrder::NewestFirst.apply(&mut records);
        let ids: Vec<_> = records.iter().map(|s| s.id.0.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn eligibility_patch_leaves_other_keys() {
        let mut record = submission("a", "a@x", 9);
        let acme = CompanyKey::from_display_name("Acme").expect("key");
        let globex = CompanyKey::from_display_name("Globex").expect("key");
        record
            .eligibility
            .insert(acme.clone(), EligibilityEntry::eligible_on(Some("2025-02-01")));

        SubmissionPatch::Eligibility {
            company: globex,
            entry: EligibilityEntry::eligible_on(None),
        }
        .apply(&mut record);

        assert_eq!(record.eligibility.len(), 2);
        assert_eq!(
            record.entry(&acme).map(|entry| entry.date.as_str()),
            Some("2025-02-01")
        );
    }

    #[test]
    fn details_patch_preserves_eligibility() {
        let mut record = submission("a", "a@x", 9);
        let acme = CompanyKey::from_display_name("Acme").expect("key");
        record
            .eligibility
            .insert(acme.clone(), EligibilityEntry::eligible_on(None));
        let mut details = record.details.clone();
        details.cgpa = 9.4;
        let timestamp = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();

        SubmissionPatch::Details { details, timestamp }.apply(&mut record);

        assert_eq!(record.details.cgpa, 9.4);
        assert_eq!(record.timestamp, timestamp);
        assert!(record.is_eligible_for(&acme));
    }
}
