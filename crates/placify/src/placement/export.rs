//! Delimited-text export of eligible students.
//!
//! Formatting is a pure text transform. Getting the bytes to the user (HTTP
//! attachment, file on disk) is left to the caller.

use std::fmt;

use serde::Serialize;

use super::domain::Submission;
use super::eligibility::{filter_eligible_for_company, CompanyKey};
use super::error::EmptyInputError;

/// Scalar cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportValue {
    Text(String),
    Number(f64),
    Absent,
}

impl fmt::Display for ExportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportValue::Text(value) => f.write_str(value),
            ExportValue::Number(value) => write!(f, "{value}"),
            ExportValue::Absent => Ok(()),
        }
    }
}

impl From<&str> for ExportValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ExportValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for ExportValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl<T: Into<ExportValue>> From<Option<T>> for ExportValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ExportValue::Absent, Into::into)
    }
}

/// Ordered column label to value mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportRow {
    cells: Vec<(String, ExportValue)>,
}

impl ExportRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, or replace the value if the label is already present.
    pub fn with(mut self, label: impl Into<String>, value: impl Into<ExportValue>) -> Self {
        let label = label.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, slot)) => *slot = value,
            None => self.cells.push((label, value)),
        }
        self
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(label, _)| label.as_str())
    }

    pub fn get(&self, label: &str) -> Option<&ExportValue> {
        self.cells
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Empty(#[from] EmptyInputError),
    #[error("failed to encode export: {0}")]
    Encoding(#[from] csv::Error),
}

/// Export payload ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportDocument {
    pub filename: String,
    pub body: String,
}

/// Render rows as comma-separated text: a header taken from the first row's
/// labels, then one line per row with every value double-quoted.
pub fn to_delimited_text(rows: &[ExportRow]) -> Result<String, ExportError> {
    let first = rows.first().ok_or(EmptyInputError)?;
    let labels: Vec<&str> = first.labels().collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(encode_line(&labels, csv::QuoteStyle::Necessary)?);

    for row in rows {
        let values: Vec<String> = labels
            .iter()
            .map(|label| row.get(label).map(ToString::to_string).unwrap_or_default())
            .collect();
        lines.push(encode_line(&values, csv::QuoteStyle::Always)?);
    }

    Ok(lines.join("\n"))
}

fn encode_line<T: AsRef<[u8]>>(
    fields: &[T],
    style: csv::QuoteStyle,
) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(style)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))?;
    let line = String::from_utf8_lossy(&bytes);
    Ok(line.trim_end_matches('\n').to_string())
}

pub fn export_filename(company: &CompanyKey) -> String {
    format!("{company}_eligible.csv")
}

/// Admin export columns for every submission eligible for `company`.
pub fn eligible_export_rows<'a, I>(submissions: I, company: &CompanyKey) -> Vec<ExportRow>
where
    I: IntoIterator<Item = &'a Submission>,
{
    filter_eligible_for_company(submissions, company)
        .into_iter()
        .map(|submission| {
            let details = &submission.details;
            let interview_date = submission
                .entry(company)
                .and_then(|entry| entry.interview_date())
                .unwrap_or_default();
            ExportRow::new()
                .with("Name", details.name.as_str())
                .with("Email", details.email.as_str())
                .with("SR Number", details.sr_number.as_str())
                .with("University Number", details.university_number.as_str())
                .with("CGPA", details.cgpa)
                .with("Stream", details.stream.label())
                .with("Interview Date", interview_date)
        })
        .collect()
}

pub fn eligible_export<'a, I>(
    submissions: I,
    company: &CompanyKey,
) -> Result<ExportDocument, ExportError>
where
    I: IntoIterator<Item = &'a Submission>,
{
    let rows = eligible_export_rows(submissions, company);
    let body = to_delimited_text(&rows)?;
    Ok(ExportDocument {
        filename: export_filename(company),
        body,
    })
}
