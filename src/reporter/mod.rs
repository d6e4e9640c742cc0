// ==========================================
// Planilha Import Engine - Run Reporter
// ==========================================
// Renders the aggregated run outcome: per-file log
// lines, every reject with file/row/reason, and one
// machine-readable JSON summary line on stdout. The
// process exit code is derived from the run status.
// ==========================================

use crate::domain::record::RunOutcome;
use crate::domain::types::RunStatus;
use serde_json::json;
use tracing::{info, warn};

/// Machine-readable summary of one run. The JSON shape is a stable
/// contract: the CI caller may parse it in addition to the exit code.
pub fn summary_value(outcome: &RunOutcome) -> serde_json::Value {
    let (read, validated, rejected, inserted, updated, skipped, failed) = outcome.totals();

    json!({
        "run_id": outcome.run_id,
        "status": outcome.status,
        "started_at": outcome.started_at,
        "finished_at": outcome.finished_at,
        "fatal_error": outcome.fatal_error,
        "totals": {
            "files": outcome.files.len(),
            "read": read,
            "validated": validated,
            "rejected": rejected,
            "inserted": inserted,
            "updated": updated,
            "skipped": skipped,
            "failed": failed,
        },
        "files": outcome.files,
        "rejects": outcome.rejects,
    })
}

/// Emit the run summary. Log lines carry the human-readable view; the
/// final stdout line is the structured summary.
pub fn emit(outcome: &RunOutcome) {
    for file in &outcome.files {
        info!(
            file = %file.file,
            read = file.read,
            validated = file.validated,
            rejected = file.rejected,
            inserted = file.inserted,
            updated = file.updated,
            skipped = file.skipped,
            failed = file.failed,
            error = file.error.as_deref().unwrap_or("-"),
            "file summary"
        );
    }

    for reject in &outcome.rejects {
        warn!(
            file = %reject.file,
            sheet = %reject.sheet,
            row = reject.row_number,
            reason = %reject.reason,
            "reject"
        );
    }

    match outcome.status {
        RunStatus::Success => info!(run_id = %outcome.run_id, "run finished: SUCCESS"),
        RunStatus::PartialFailure => {
            warn!(run_id = %outcome.run_id, "run finished: PARTIAL_FAILURE")
        }
        RunStatus::Fatal => warn!(
            run_id = %outcome.run_id,
            error = outcome.fatal_error.as_deref().unwrap_or("-"),
            "run finished: FATAL (zero files processed)"
        ),
    }

    // The one line the caller can parse
    println!("{}", summary_value(outcome));
}
