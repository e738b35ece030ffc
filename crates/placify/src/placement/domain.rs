use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::eligibility::{CompanyKey, EligibilityEntry};
use super::error::ValidationError;
use super::identity::IdentityId;

/// Store-assigned document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Academic streams offered for placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stream {
    Cse,
    Ece,
    Eee,
    Mech,
    Civil,
}

impl Stream {
    pub const ALL: [Stream; 5] = [
        Stream::Cse,
        Stream::Ece,
        Stream::Eee,
        Stream::Mech,
        Stream::Civil,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Stream::Cse => "CSE",
            Stream::Ece => "ECE",
            Stream::Eee => "EEE",
            Stream::Mech => "MECH",
            Stream::Civil => "CIVIL",
        }
    }

    /// Parse an optional filter value; an empty string means "any stream".
    pub fn parse_filter(raw: &str) -> Result<Option<Stream>, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed.parse().map(Some)
    }
}

impl FromStr for Stream {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Stream::ALL
            .into_iter()
            .find(|stream| stream.label() == trimmed)
            .ok_or_else(|| ValidationError::UnknownStream {
                value: trimmed.to_string(),
            })
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Validated academic details a student provides on the submission form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDetails {
    pub name: String,
    pub email: String,
    pub sr_number: String,
    pub university_number: String,
    pub cgpa: f64,
    pub stream: Stream,
}

impl StudentDetails {
    /// Email in the form used for equality lookups.
    pub fn email_key(&self) -> String {
        normalize_email(&self.email)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Raw form payload checked by [`StudentDetails::try_from`]. Fields arrive
/// as text; `cgpa` also accepts a JSON number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub sr_number: String,
    #[serde(default)]
    pub university_number: String,
    #[serde(default, deserialize_with = "cgpa_text")]
    pub cgpa: String,
    #[serde(default)]
    pub stream: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CgpaInput {
    Number(f64),
    Text(String),
}

fn cgpa_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match CgpaInput::deserialize(deserializer)? {
        CgpaInput::Number(value) => value.to_string(),
        CgpaInput::Text(value) => value,
    })
}

fn required(value: &str, field: &'static str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parse a CGPA value typed by a user. Non-finite values are rejected along
/// with anything that is not a number.
pub fn parse_cgpa(raw: &str) -> Result<f64, ValidationError> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::InvalidCgpa {
            value: trimmed.to_string(),
        }),
    }
}

impl TryFrom<SubmissionForm> for StudentDetails {
    type Error = ValidationError;

    fn try_from(form: SubmissionForm) -> Result<Self, Self::Error> {
        let name = required(&form.name, "name")?;
        let email = required(&form.email, "email")?;
        let sr_number = required(&form.sr_number, "srNumber")?;
        let university_number = required(&form.university_number, "universityNumber")?;
        let cgpa = parse_cgpa(&required(&form.cgpa, "cgpa")?)?;
        let stream = required(&form.stream, "stream")?.parse()?;

        Ok(Self {
            name,
            email,
            sr_number,
            university_number,
            cgpa,
            stream,
        })
    }
}

/// One student's placement record as held by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub owner: IdentityId,
    #[serde(flatten)]
    pub details: StudentDetails,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub eligibility: BTreeMap<CompanyKey, EligibilityEntry>,
}

impl Submission {
    pub fn entry(&self, company: &CompanyKey) -> Option<&EligibilityEntry> {
        self.eligibility.get(company)
    }

    pub fn is_eligible_for(&self, company: &CompanyKey) -> bool {
        self.entry(company).is_some_and(|entry| entry.eligible)
    }
}

/// Document handed to [`SubmissionStore::insert`](super::store::SubmissionStore::insert);
/// the store assigns the identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub owner: IdentityId,
    pub details: StudentDetails,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> SubmissionForm {
        SubmissionForm {
            name: " Asha Rao ".to_string(),
            email: "asha@example.edu".to_string(),
            sr_number: "SR-1042".to_string(),
            university_number: "U-77881".to_string(),
            cgpa: "8.25".to_string(),
            stream: "CSE".to_string(),
        }
    }

    #[test]
    fn form_converts_into_trimmed_details() {
        let details = StudentDetails::try_from(form()).expect("valid form");
        assert_eq!(details.name, "Asha Rao");
        assert_eq!(details.cgpa, 8.25);
        assert_eq!(details.stream, Stream::Cse);
    }

    #[test]
    fn form_rejects_blank_required_fields() {
        let mut missing = form();
        missing.university_number = "   ".to_string();
        assert_eq!(
            StudentDetails::try_from(missing),
            Err(ValidationError::MissingField("universityNumber"))
        );
    }

    #[test]
    fn form_rejects_non_numeric_cgpa() {
        let mut bad = form();
        bad.cgpa = "eight".to_string();
        assert_eq!(
            StudentDetails::try_from(bad),
            Err(ValidationError::InvalidCgpa {
                value: "eight".to_string()
            })
        );
        assert!(parse_cgpa("NaN").is_err());
        assert!(parse_cgpa("inf").is_err());
    }

    #[test]
    fn form_accepts_cgpa_as_number_or_text() {
        let numeric: SubmissionForm = serde_json::from_value(serde_json::json!({
            "name": "Asha Rao",
            "email": "asha@example.edu",
            "srNumber": "SR-1042",
            "universityNumber": "U-77881",
            "cgpa": 8.4,
            "stream": "CSE"
        }))
        .expect("numeric cgpa decodes");
        assert_eq!(numeric.cgpa, "8.4");
        assert_eq!(StudentDetails::try_from(numeric).map(|d| d.cgpa), Ok(8.4));

        let whole: SubmissionForm =
            serde_json::from_value(serde_json::json!({ "cgpa": 9 })).expect("integer cgpa");
        assert_eq!(parse_cgpa(&whole.cgpa), Ok(9.0));

        let text: SubmissionForm =
            serde_json::from_value(serde_json::json!({ "cgpa": " 7.25 " })).expect("text cgpa");
        assert_eq!(text.cgpa, " 7.25 ");
    }

    #[test]
    fn stream_parsing_is_exact() {
        assert_eq!("MECH".parse::<Stream>(), Ok(Stream::Mech));
        assert!("mech".parse::<Stream>().is_err());
        assert_eq!(Stream::parse_filter(""), Ok(None));
        assert_eq!(Stream::parse_filter(" ECE "), Ok(Some(Stream::Ece)));
    }

    #[test]
    fn submission_uses_document_field_names() {
        let json = serde_json::json!({
            "id": "sub-1",
            "owner": "uid-1",
            "name": "Asha Rao",
            "email": "asha@example.edu",
            "srNumber": "SR-1042",
            "universityNumber": "U-77881",
            "cgpa": 7.5,
            "stream": "CSE",
            "timestamp": "2025-01-02T10:00:00Z",
            "eligibility": {
                "Acme Corp": { "eligible": true, "date": "2025-01-10" },
                "globex": { "eligible": false }
            }
        });

        let submission: Submission = serde_json::from_value(json).expect("decodes");
        assert_eq!(submission.details.sr_number, "SR-1042");
        assert_eq!(submission.eligibility.len(), 2);
        let acme = CompanyKey::from_display_name("acme corp").expect("key");
        assert!(submission.is_eligible_for(&acme));
        let globex = CompanyKey::from_display_name("Globex").expect("key");
        assert_eq!(submission.entry(&globex).map(|e| e.date.as_str()), Some(""));

        let encoded = serde_json::to_value(&submission).expect("encodes");
        assert_eq!(encoded["universityNumber"], "U-77881");
        assert!(encoded["eligibility"].get("acme_corp").is_some());
    }
}
