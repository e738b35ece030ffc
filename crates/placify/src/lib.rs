//! Placement eligibility tracking.
//!
//! Students submit academic details, administrators mark per-company
//! eligibility, and students or companies read the results back. Identity and
//! persistence are collaborators reached through the traits in
//! [`placement::identity`] and [`placement::store`].

pub mod config;
pub mod error;
pub mod placement;
pub mod telemetry;
