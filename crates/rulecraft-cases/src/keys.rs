use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use rulecraft_core::{TestCaseRecords, load_test_cases, replace_with_backup};

use crate::errors::CasesError;

/// Summary of a key assignment run.
#[derive(Debug, Clone, Serialize)]
pub struct KeyReport {
    pub groups: usize,
    pub records: usize,
    /// Previous output moved aside before writing, if one existed.
    pub backup: Option<PathBuf>,
}

/// Give every record a fresh random UUID `key`, replacing any previous one.
///
/// Keys do not depend on record content. Returns the number of keyed records.
pub fn assign_keys(records: &mut TestCaseRecords) -> usize {
    let mut assigned = 0;
    for case in records.iter_records_mut() {
        case.set_key(uuid::Uuid::new_v4().to_string());
        assigned += 1;
    }
    assigned
}

/// Read test cases, key them and write them with a backup of the previous output.
///
/// Errors are logged with the offending path and returned; a keyless output is
/// never written.
pub fn add_unique_keys(input: &Path, output: &Path) -> Result<KeyReport, CasesError> {
    let mut records = load_test_cases(input).inspect_err(|err| {
        error!(event = "test_cases_load_failed", path = %input.display(), error = %err);
    })?;

    let replaced = records.keys().len();
    if replaced > 0 {
        warn!(event = "keys_replaced", path = %input.display(), count = replaced);
    }

    let assigned = assign_keys(&mut records);

    let backup = replace_with_backup(output, &records).inspect_err(|err| {
        error!(event = "keyed_test_cases_write_failed", path = %output.display(), error = %err);
    })?;

    info!(
        event = "keyed_test_cases_written",
        path = %output.display(),
        records = assigned,
        backup = ?backup
    );

    Ok(KeyReport {
        groups: records.group_count(),
        records: assigned,
        backup,
    })
}
