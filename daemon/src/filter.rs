//! Candidate selection: which enumerated processes look like an FL Studio instance.
use crate::process::ProcessRecord;

/// Executable / app names that identify FL Studio, matched as case-sensitive substrings
/// of the process name.
pub const FL_PROCESS_NAMES: &[&str] = &[
    "FL64.exe",     // Windows 64-bit
    "FL.exe",       // Windows 32-bit
    "FL Studio 21", // macOS
    "FL Studio 20", // macOS
    "FL Studio",    // macOS, generic
    "fl64.exe",     // Wine, lowercased
    "fl.exe",       // Wine, lowercased
    WINE_PROCESS_NAME,
];

/// Display name searched for in window titles.
pub const FL_DISPLAY_NAME: &str = "FL Studio";

/// Generic compatibility-layer process name; on its own it proves nothing.
const WINE_PROCESS_NAME: &str = "wine";

/// Lowercase hint a Wine process's executable path must contain to count.
const WINE_PATH_HINT: &str = "fl";

/// Returns every record that looks like FL Studio, in enumeration order.
///
/// The first element is the canonical instance; several concurrent instances get no
/// further tie-break.
pub fn find_target_processes(records: &[ProcessRecord]) -> Vec<ProcessRecord> {
    records.iter().filter(|r| is_candidate(r)).cloned().collect()
}

/// Whether a single record passes the allowlist.
pub fn is_candidate(record: &ProcessRecord) -> bool {
    matches_name(record) || record.window_title.contains(FL_DISPLAY_NAME)
}

fn matches_name(record: &ProcessRecord) -> bool {
    let Some(entry) = FL_PROCESS_NAMES
        .iter()
        .find(|entry| record.name.contains(*entry))
    else {
        return false;
    };

    if *entry == WINE_PROCESS_NAME {
        record.executable_path.to_lowercase().contains(WINE_PATH_HINT)
    } else {
        true
    }
}
