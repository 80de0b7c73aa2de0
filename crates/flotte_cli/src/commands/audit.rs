use crate::cli::AuditArgs;
use crate::error::Result;
use flotte_core::config::Settings;
use flotte_core::jobs::{audit_outputs, AuditCounts, AuditStatus};

pub fn run(args: AuditArgs, settings: &Settings) -> Result<()> {
    let records = audit_outputs(
        &args.dir,
        !args.no_recursive,
        &settings.runner,
        &settings.audit,
    )?;

    for record in &records {
        let status = match record.status {
            AuditStatus::Verified => "ok",
            AuditStatus::Unverified => "UNVERIFIED",
            AuditStatus::Unreadable => "UNREADABLE",
        };
        let geometry = if record.has_result { "" } else { " (no result geometry)" };
        if record.missing_markers.is_empty() {
            println!("{:<11} {}{}", status, record.output_path.display(), geometry);
        } else {
            println!(
                "{:<11} {}{} missing: {}",
                status,
                record.output_path.display(),
                geometry,
                record.missing_markers.join(", ")
            );
        }
    }

    let counts = AuditCounts::tally(&records);
    println!(
        "{} outputs: {} verified, {} unverified, {} unreadable.",
        records.len(),
        counts.verified,
        counts.unverified,
        counts.unreadable
    );
    Ok(())
}
