use crate::infra::{load_submissions, InMemoryIdentityProvider, InMemorySubmissionStore};
use chrono::SecondsFormat;
use clap::Args;
use placify::error::AppError;
use placify::placement::domain::parse_cgpa;
use placify::placement::{
    EligibilityCriteria, EligibleCompany, ExportDocument, Identity, IdentityEvent,
    PlacementError, PlacementService, SignInRequest, Stream, SubmissionForm, SubmissionId,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// JSON array of submission documents
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Company whose eligible students are exported
    #[arg(long)]
    pub(crate) company: String,
    /// Only include students with at least this CGPA
    #[arg(long, value_parser = parse_cgpa)]
    pub(crate) min_cgpa: Option<f64>,
    /// Only include one stream (CSE, ECE, EEE, MECH, CIVIL)
    #[arg(long)]
    pub(crate) stream: Option<Stream>,
    /// Destination file. Defaults to `<company_key>_eligible.csv`.
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Company the demo administrator marks students eligible for
    #[arg(long, default_value = "Acme Corp")]
    pub(crate) company: String,
    /// Interview date recorded with each eligibility
    #[arg(long, default_value = "2025-01-10")]
    pub(crate) interview_date: String,
    /// Minimum CGPA applied by the demo administrator
    #[arg(long, default_value_t = 7.0, value_parser = parse_cgpa)]
    pub(crate) min_cgpa: f64,
    /// Directory to write the demo export into
    #[arg(long)]
    pub(crate) output_dir: Option<PathBuf>,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            company: "Acme Corp".to_string(),
            interview_date: "2025-01-10".to_string(),
            min_cgpa: 7.0,
            output_dir: None,
        }
    }
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let ExportArgs {
        input,
        company,
        min_cgpa,
        stream,
        output,
    } = args;

    let submissions = load_submissions(&input)?;
    let store = InMemorySubmissionStore::seeded(submissions).map_err(PlacementError::from)?;
    let service = PlacementService::new(
        Arc::new(store),
        Arc::new(InMemoryIdentityProvider::default()),
    );

    let criteria = EligibilityCriteria::new(min_cgpa.unwrap_or(0.0), stream);
    let document = service.export_eligible(&criteria, &company)?;
    let path = output.unwrap_or_else(|| PathBuf::from(&document.filename));
    write_document(&document, &path)?;

    println!("Wrote {} to {}", document.filename, path.display());
    Ok(())
}

fn write_document(document: &ExportDocument, path: &Path) -> Result<(), AppError> {
    std::fs::write(path, document.body.as_bytes())?;
    Ok(())
}

struct DemoStudent {
    name: &'static str,
    email: &'static str,
    sr_number: &'static str,
    university_number: &'static str,
    cgpa: &'static str,
    stream: &'static str,
}

const STUDENTS: [DemoStudent; 3] = [
    DemoStudent {
        name: "Asha Rao",
        email: "asha.rao@example.edu",
        sr_number: "SR-101",
        university_number: "U-9001",
        cgpa: "8.4",
        stream: "CSE",
    },
    DemoStudent {
        name: "Bala Iyer",
        email: "bala.iyer@example.edu",
        sr_number: "SR-102",
        university_number: "U-9002",
        cgpa: "6.0",
        stream: "ECE",
    },
    DemoStudent {
        name: "Chitra Nair",
        email: "chitra.nair@example.edu",
        sr_number: "SR-103",
        university_number: "U-9003",
        cgpa: "9.1",
        stream: "CSE",
    },
];

pub(crate) struct DemoOutcome {
    pub(crate) export: ExportDocument,
    pub(crate) first_student_companies: Vec<EligibleCompany>,
    pub(crate) identity_events: usize,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let outcome = demo_scenario(&args)?;

    if let Some(dir) = args.output_dir {
        let path = dir.join(&outcome.export.filename);
        write_document(&outcome.export, &path)?;
        println!("\nExport written to {}", path.display());
    }
    Ok(())
}

pub(crate) fn demo_scenario(args: &DemoArgs) -> Result<DemoOutcome, AppError> {
    let service = PlacementService::new(
        Arc::new(InMemorySubmissionStore::default()),
        Arc::new(InMemoryIdentityProvider::default()),
    );
    let mut events = service.subscribe_identity();

    println!("Placement eligibility demo");
    println!("\nStudent submissions");
    let mut students: Vec<(Identity, SubmissionId)> = Vec::new();
    for student in &STUDENTS {
        let session = service.sign_in(SignInRequest {
            email: student.email.to_string(),
            display_name: Some(student.name.to_string()),
        })?;
        let receipt = service.submit(
            &session.identity,
            SubmissionForm {
                name: student.name.to_string(),
                email: student.email.to_string(),
                sr_number: student.sr_number.to_string(),
                university_number: student.university_number.to_string(),
                cgpa: student.cgpa.to_string(),
                stream: student.stream.to_string(),
            },
        )?;
        println!(
            "- {} ({}, CGPA {}) submitted at {}",
            student.name,
            student.stream,
            student.cgpa,
            receipt
                .submission
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        service.sign_out(&session.token)?;
        students.push((session.identity, receipt.submission.id));
    }

    let mut identity_events = 0;
    while let Ok(event) = events.try_recv() {
        identity_events += 1;
        if let IdentityEvent::SignedOut(uid) = event {
            tracing::debug!(%uid, "demo session closed");
        }
    }
    println!("{identity_events} sign-in/sign-out notifications observed");

    let criteria = EligibilityCriteria::new(args.min_cgpa, None);
    let shortlisted = service.list_submissions(&criteria, Some(&args.company))?;
    println!(
        "\nAdmin shortlist for {} (CGPA >= {:.1})",
        args.company, args.min_cgpa
    );
    for row in &shortlisted {
        let details = &row.submission.details;
        service.mark_eligible(
            &row.submission.id,
            &args.company,
            Some(&args.interview_date),
        )?;
        println!(
            "- marked {} ({:.1}, {}) eligible, interview {}",
            details.name, details.cgpa, details.stream, args.interview_date
        );
    }

    let (first_identity, _) = &students[0];
    let first_student_companies = service.student_eligibility(first_identity)?;
    println!("\n{} sees:", first_identity.email);
    for company in &first_student_companies {
        println!("- {} on {}", company.name, company.date);
    }

    let export = service.export_eligible(&criteria, &args.company)?;
    println!("\n{}", export.filename);
    println!("{}", export.body);

    println!("\nCompanies");
    for view in service.company_overview()? {
        println!("- {}: {} eligible", view.heading, view.candidates.len());
    }

    if let Some((identity, id)) = students.last() {
        service.remove_eligibility(id, &args.company)?;
        let remaining = service.student_eligibility(identity)?;
        println!(
            "\nRemoved {} from {}; {} company listings remain for them",
            identity.email,
            args.company,
            remaining.len()
        );
    }

    Ok(DemoOutcome {
        export,
        first_student_companies,
        identity_events,
    })
}
