use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::domain::{
    normalize_email, NewSubmission, StudentDetails, Submission, SubmissionForm, SubmissionId,
};
use super::eligibility::{
    self, company_overview, filter_by_criteria, list_eligible_companies, CompanyEligibilityView,
    CompanyKey, EligibilityCriteria, EligibleCompany,
};
use super::error::{PlacementError, ValidationError};
use super::export::{eligible_export, ExportDocument};
use super::identity::{
    Identity, IdentityEvent, IdentityId, IdentityProvider, Session, SessionToken, SignInRequest,
};
use super::store::{StoreError, SubmissionFilter, SubmissionOrder, SubmissionPatch, SubmissionStore};

/// The two ways a page can look a submission up. The owning identity is the
/// canonical key; email is a unique secondary attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionLocator {
    Owner(IdentityId),
    Email(String),
}

impl SubmissionLocator {
    fn filter(&self) -> SubmissionFilter {
        match self {
            SubmissionLocator::Owner(owner) => SubmissionFilter::Owner(owner.clone()),
            SubmissionLocator::Email(email) => SubmissionFilter::Email(email.clone()),
        }
    }
}

/// Result of a student form submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub created: bool,
    pub submission: Submission,
}

/// Eligibility state of one submission for the company selected on the admin
/// dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyStatus {
    pub company_key: CompanyKey,
    pub eligible: bool,
    pub interview_date: String,
}

/// Admin dashboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSubmissionView {
    #[serde(flatten)]
    pub submission: Submission,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_status: Option<CompanyStatus>,
}

/// Service composing the identity provider and the submission store.
pub struct PlacementService<S, I> {
    store: Arc<S>,
    identity: Arc<I>,
}

impl<S, I> PlacementService<S, I>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    pub fn new(store: Arc<S>, identity: Arc<I>) -> Self {
        Self { store, identity }
    }

    pub fn sign_in(&self, request: SignInRequest) -> Result<Session, PlacementError> {
        if request.email.trim().is_empty() {
            return Err(ValidationError::MissingField("email").into());
        }
        let session = self.identity.sign_in(request)?;
        info!(uid = %session.identity.uid, "signed in");
        Ok(session)
    }

    pub fn current_user(&self, token: &SessionToken) -> Result<Option<Identity>, PlacementError> {
        Ok(self.identity.current_user(token)?)
    }

    pub fn sign_out(&self, token: &SessionToken) -> Result<(), PlacementError> {
        Ok(self.identity.sign_out(token)?)
    }

    pub fn subscribe_identity(&self) -> broadcast::Receiver<IdentityEvent> {
        self.identity.subscribe()
    }

    /// Locate at most one submission. More than one match means the store's
    /// uniqueness guarantee was broken and is reported as a conflict.
    pub fn resolve(
        &self,
        locator: &SubmissionLocator,
    ) -> Result<Option<Submission>, PlacementError> {
        let mut matches = self
            .store
            .query(&locator.filter(), SubmissionOrder::Unordered)?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            count => {
                warn!(?locator, count, "duplicate submissions for one key");
                Err(StoreError::Conflict.into())
            }
        }
    }

    /// Create the caller's submission or update it in place. Eligibility
    /// recorded by administrators survives resubmission. The form's email
    /// must be the caller's own.
    pub fn submit(
        &self,
        identity: &Identity,
        form: SubmissionForm,
    ) -> Result<SubmissionReceipt, PlacementError> {
        let details = StudentDetails::try_from(form)?;
        if details.email_key() != normalize_email(&identity.email) {
            return Err(ValidationError::EmailMismatch {
                expected: identity.email.clone(),
            }
            .into());
        }
        let timestamp = Utc::now();

        match self.resolve(&SubmissionLocator::Owner(identity.uid.clone()))? {
            Some(existing) => {
                self.store
                    .update(&existing.id, SubmissionPatch::Details { details, timestamp })?;
                let submission = self.refetch(&existing.id)?;
                info!(submission_id = %submission.id, uid = %identity.uid, "submission updated");
                Ok(SubmissionReceipt {
                    created: false,
                    submission,
                })
            }
            None => {
                let submission = self.store.insert(NewSubmission {
                    owner: identity.uid.clone(),
                    details,
                    timestamp,
                })?;
                info!(submission_id = %submission.id, uid = %identity.uid, "submission created");
                Ok(SubmissionReceipt {
                    created: true,
                    submission,
                })
            }
        }
    }

    pub fn my_submission(&self, identity: &Identity) -> Result<Option<Submission>, PlacementError> {
        self.resolve(&SubmissionLocator::Owner(identity.uid.clone()))
    }

    /// Companies the caller is eligible for; empty when nothing was submitted.
    pub fn student_eligibility(
        &self,
        identity: &Identity,
    ) -> Result<Vec<EligibleCompany>, PlacementError> {
        Ok(self
            .my_submission(identity)?
            .map(|submission| list_eligible_companies(&submission))
            .unwrap_or_default())
    }

    /// Newest-first submissions matching `criteria`, annotated with the
    /// selected company's status when one is given.
    pub fn list_submissions(
        &self,
        criteria: &EligibilityCriteria,
        company: Option<&str>,
    ) -> Result<Vec<AdminSubmissionView>, PlacementError> {
        let company = match company.map(str::trim) {
            Some(name) if !name.is_empty() => Some(CompanyKey::from_display_name(name)?),
            _ => None,
        };

        let submissions = self.newest_first()?;
        Ok(filter_by_criteria(&submissions, criteria)
            .into_iter()
            .map(|submission| AdminSubmissionView {
                company_status: company.as_ref().map(|key| {
                    let entry = submission.entry(key).cloned().unwrap_or_default();
                    CompanyStatus {
                        company_key: key.clone(),
                        eligible: entry.eligible,
                        interview_date: entry.date,
                    }
                }),
                submission: submission.clone(),
            })
            .collect())
    }

    pub fn mark_eligible(
        &self,
        id: &SubmissionId,
        company: &str,
        interview_date: Option<&str>,
    ) -> Result<Submission, PlacementError> {
        let (company, entry) = eligibility::grant(company, interview_date)?;
        self.store.update(
            id,
            SubmissionPatch::Eligibility {
                company: company.clone(),
                entry,
            },
        )?;
        info!(submission_id = %id, company = %company, "marked eligible");
        self.refetch(id)
    }

    pub fn remove_eligibility(
        &self,
        id: &SubmissionId,
        company: &str,
    ) -> Result<Submission, PlacementError> {
        let (company, entry) = eligibility::revoke(company)?;
        self.store.update(
            id,
            SubmissionPatch::Eligibility {
                company: company.clone(),
                entry,
            },
        )?;
        info!(submission_id = %id, company = %company, "eligibility removed");
        self.refetch(id)
    }

    pub fn delete_submission(&self, id: &SubmissionId) -> Result<(), PlacementError> {
        self.store.delete(id)?;
        info!(submission_id = %id, "submission deleted");
        Ok(())
    }

    /// Export the students matching `criteria` who are eligible for `company`.
    pub fn export_eligible(
        &self,
        criteria: &EligibilityCriteria,
        company: &str,
    ) -> Result<ExportDocument, PlacementError> {
        let company = CompanyKey::from_display_name(company)?;
        let submissions = self.newest_first()?;
        let selected = filter_by_criteria(&submissions, criteria);
        let document = eligible_export(selected, &company)?;
        info!(company = %company, filename = %document.filename, "export generated");
        Ok(document)
    }

    pub fn company_overview(&self) -> Result<Vec<CompanyEligibilityView>, PlacementError> {
        let submissions = self.newest_first()?;
        Ok(company_overview(&submissions))
    }

    fn newest_first(&self) -> Result<Vec<Submission>, PlacementError> {
        Ok(self
            .store
            .query(&SubmissionFilter::All, SubmissionOrder::NewestFirst)?)
    }

    fn refetch(&self, id: &SubmissionId) -> Result<Submission, PlacementError> {
        self.store
            .fetch(id)?
            .ok_or_else(|| StoreError::NotFound.into())
    }
}
