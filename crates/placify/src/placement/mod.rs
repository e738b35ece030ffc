//! Student placement submissions and company-keyed eligibility.
//!
//! Identity and persistence are collaborators behind [`IdentityProvider`] and
//! [`SubmissionStore`]; [`PlacementService`] composes them and
//! [`placement_router`] exposes the service over HTTP.

pub mod domain;
pub mod eligibility;
pub mod error;
pub mod export;
pub mod identity;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    NewSubmission, Stream, StudentDetails, Submission, SubmissionForm, SubmissionId,
};
pub use eligibility::{
    company_overview, filter_by_criteria, filter_eligible_for_company, list_eligible_companies,
    mark_eligible, remove_eligibility, CompanyCandidate, CompanyEligibilityView, CompanyKey,
    EligibilityCriteria, EligibilityEntry, EligibleCompany,
};
pub use error::{CollaboratorError, EmptyInputError, PlacementError, ValidationError};
pub use export::{
    eligible_export, eligible_export_rows, export_filename, to_delimited_text, ExportDocument,
    ExportError, ExportRow, ExportValue,
};
pub use identity::{
    Identity, IdentityError, IdentityEvent, IdentityId, IdentityProvider, Session, SessionToken,
    SignInRequest,
};
pub use router::placement_router;
pub use service::{
    AdminSubmissionView, CompanyStatus, PlacementService, SubmissionLocator, SubmissionReceipt,
};
pub use store::{
    violates_uniqueness, StoreError, SubmissionFilter, SubmissionOrder, SubmissionPatch,
    SubmissionStore,
};
