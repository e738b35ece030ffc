use super::export::ExportError;
use super::identity::IdentityError;
use super::store::StoreError;

/// Input rejected before any collaborator is contacted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("enter a company name first")]
    MissingCompanyName,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("cgpa must be a number, got '{value}'")]
    InvalidCgpa { value: String },
    #[error("unknown stream '{value}', expected one of CSE, ECE, EEE, MECH, CIVIL")]
    UnknownStream { value: String },
    #[error("email must match the signed-in account {expected}")]
    EmailMismatch { expected: String },
}

/// Export requested for a selection that produced no rows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no eligible students found for export")]
pub struct EmptyInputError;

/// Opaque failure reported by the identity provider or the submission store.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Error raised by the placement service for every mutation and export path.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    EmptyInput(#[from] EmptyInputError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error("failed to encode export: {0}")]
    Encoding(csv::Error),
}

impl From<ExportError> for PlacementError {
    fn from(value: ExportError) -> Self {
        match value {
            ExportError::Empty(err) => Self::EmptyInput(err),
            ExportError::Encoding(err) => Self::Encoding(err),
        }
    }
}

impl From<StoreError> for PlacementError {
    fn from(value: StoreError) -> Self {
        Self::Collaborator(CollaboratorError::Store(value))
    }
}

impl From<IdentityError> for PlacementError {
    fn from(value: IdentityError) -> Self {
        Self::Collaborator(CollaboratorError::Identity(value))
    }
}
