//! Company-keyed eligibility: key normalization, marking and unmarking, and
//! the filters the admin and company views are built from.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{Stream, Submission};
use super::error::ValidationError;

/// Normalized company identifier: lowercase, whitespace runs collapsed to a
/// single underscore. Only constructible through normalization, so every
/// spelling of a display name lands on the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompanyKey(String);

impl CompanyKey {
    pub fn from_display_name(display_name: &str) -> Result<Self, ValidationError> {
        let cleaned = display_name.replace(['\u{feff}', '\u{200b}'], "");
        let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
        if joined.is_empty() {
            return Err(ValidationError::MissingCompanyName);
        }
        Ok(Self(joined.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key with underscores restored to spaces, still lowercase.
    pub fn display_name(&self) -> String {
        self.0.replace('_', " ")
    }

    /// Upper-cased name shown to students.
    pub fn student_label(&self) -> String {
        self.display_name().to_uppercase()
    }

    /// Title-cased heading used on the company overview.
    pub fn heading(&self) -> String {
        self.0
            .split('_')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TryFrom<String> for CompanyKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_display_name(&value)
    }
}

impl From<CompanyKey> for String {
    fn from(value: CompanyKey) -> Self {
        value.0
    }
}

impl fmt::Display for CompanyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Eligibility of one submission for one company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityEntry {
    pub eligible: bool,
    /// Interview date as entered by the administrator; empty when unset.
    #[serde(default)]
    pub date: String,
}

impl EligibilityEntry {
    pub fn eligible_on(date: Option<&str>) -> Self {
        Self {
            eligible: true,
            date: date.map(str::trim).unwrap_or_default().to_string(),
        }
    }

    pub fn revoked() -> Self {
        Self {
            eligible: false,
            date: String::new(),
        }
    }

    pub fn interview_date(&self) -> Option<&str> {
        if self.date.is_empty() {
            None
        } else {
            Some(&self.date)
        }
    }
}

/// A company a student currently qualifies for, as shown on the student view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibleCompany {
    pub name: String,
    pub date: String,
}

/// Admin filter controls.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EligibilityCriteria {
    pub min_cgpa: f64,
    pub stream: Option<Stream>,
}

impl EligibilityCriteria {
    pub fn new(min_cgpa: f64, stream: Option<Stream>) -> Self {
        Self { min_cgpa, stream }
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        let meets_cgpa = submission.details.cgpa >= self.min_cgpa;
        let matches_stream = self
            .stream
            .map_or(true, |stream| submission.details.stream == stream);
        meets_cgpa && matches_stream
    }
}

/// Key and entry written when granting eligibility.
pub fn grant(
    company_display_name: &str,
    interview_date: Option<&str>,
) -> Result<(CompanyKey, EligibilityEntry), ValidationError> {
    let key = CompanyKey::from_display_name(company_display_name)?;
    Ok((key, EligibilityEntry::eligible_on(interview_date)))
}

/// Key and entry written when revoking eligibility.
pub fn revoke(
    company_display_name: &str,
) -> Result<(CompanyKey, EligibilityEntry), ValidationError> {
    let key = CompanyKey::from_display_name(company_display_name)?;
    Ok((key, EligibilityEntry::revoked()))
}

pub fn mark_eligible(
    submission: &mut Submission,
    company_display_name: &str,
    interview_date: Option<&str>,
) -> Result<CompanyKey, ValidationError> {
    let (key, entry) = grant(company_display_name, interview_date)?;
    submission.eligibility.insert(key.clone(), entry);
    Ok(key)
}

/// Revoke eligibility while keeping the entry as a record of the change.
pub fn remove_eligibility(
    submission: &mut Submission,
    company_display_name: &str,
) -> Result<CompanyKey, ValidationError> {
    let (key, entry) = revoke(company_display_name)?;
    submission.eligibility.insert(key.clone(), entry);
    Ok(key)
}

pub fn list_eligible_companies(submission: &Submission) -> Vec<EligibleCompany> {
    submission
        .eligibility
        .iter()
        .filter(|(_, entry)| entry.eligible)
        .map(|(key, entry)| EligibleCompany {
            name: key.student_label(),
            date: entry.date.clone(),
        })
        .collect()
}

pub fn filter_by_criteria<'a>(
    submissions: &'a [Submission],
    criteria: &EligibilityCriteria,
) -> Vec<&'a Submission> {
    submissions
        .iter()
        .filter(|submission| criteria.matches(submission))
        .collect()
}

pub fn filter_eligible_for_company<'a, I>(
    submissions: I,
    company: &CompanyKey,
) -> Vec<&'a Submission>
where
    I: IntoIterator<Item = &'a Submission>,
{
    submissions
        .into_iter()
        .filter(|submission| submission.is_eligible_for(company))
        .collect()
}

/// Student row on the company overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyCandidate {
    pub name: String,
    pub email: String,
    pub cgpa: f64,
    pub stream: Stream,
    pub interview_date: String,
}

/// Every company that appears in any eligibility map with the students
/// currently eligible for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyEligibilityView {
    pub company_key: CompanyKey,
    pub heading: String,
    pub candidates: Vec<CompanyCandidate>,
}

pub fn company_overview(submissions: &[Submission]) -> Vec<CompanyEligibilityView> {
    let companies: BTreeSet<&CompanyKey> = submissions
        .iter()
        .flat_map(|submission| submission.eligibility.keys())
        .collect();

    companies
        .into_iter()
        .map(|company| {
            let candidates = filter_eligible_for_company(submissions, company)
                .into_iter()
                .map(|submission| CompanyCandidate {
                    name: submission.details.name.clone(),
                    email: submission.details.email.clone(),
                    cgpa: submission.details.cgpa,
                    stream: submission.details.stream,
                    interview_date: submission
                        .entry(company)
                        .map(|entry| entry.date.clone())
                        .unwrap_or_default(),
                })
                .collect();

            CompanyEligibilityView {
                company_key: company.clone(),
                heading: company.heading(),
                candidates,
            }
        })
        .collect()
}
