//! Cross-platform process enumeration.
//!
//! Produces a flat list of [`ProcessRecord`]s with pid, name, executable path and a
//! best-effort window title.  Enumeration never fails from the caller's point of view:
//! anything that cannot be resolved is left empty, and a process that vanishes mid-scan
//! is simply absent from the result.
use std::sync::{Mutex, PoisonError};

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

use crate::window_title;

/// Linux truncates `/proc/<pid>/comm` to 15 bytes; longer names come from the command line.
const COMM_MAX_LEN: usize = 15;

/// One running process as seen during a single enumeration pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    /// Empty when the process owns no visible titled window (or the lookup failed).
    pub window_title: String,
    pub executable_path: String,
}

/// Capability interface over the OS process table.
///
/// One implementation is selected per target at build time; tests substitute an
/// in-memory source.
pub trait ProcessSource: Send + Sync {
    /// Lists every process currently visible to this user.
    fn list_processes(&self) -> Vec<ProcessRecord>;
}

/// [`ProcessSource`] backed by `sysinfo` plus the platform window-title lookup.
pub struct SystemProcessSource {
    sys: Mutex<System>,
}

impl SystemProcessSource {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SystemProcessSource {
    fn list_processes(&self) -> Vec<ProcessRecord> {
        let mut titles = window_title::titles_by_pid();

        let mut sys = self.sys.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new()
                .with_cmd(UpdateKind::OnlyIfNotSet)
                .with_exe(UpdateKind::OnlyIfNotSet),
        );

        let mut records: Vec<ProcessRecord> = sys
            .processes()
            .iter()
            .map(|(pid, process)| {
                let cmd: Vec<String> = process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect();
                let exe = process
                    .exe()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let pid = pid.as_u32();
                record_from_parts(
                    pid,
                    process.name().to_string_lossy().into_owned(),
                    cmd.first().map(String::as_str).unwrap_or(""),
                    &exe,
                    titles.remove(&pid).unwrap_or_default(),
                )
            })
            .collect();

        // sysinfo hands processes back in hash order; pid order keeps candidate
        // selection stable between polls.
        records.sort_by_key(|r| r.pid);
        tracing::trace!(count = records.len(), "enumerated processes");
        records
    }
}

/// Assembles a record from raw OS fields.
///
/// On Linux the first command-line argument wins over the resolved executable: Wine
/// processes resolve to the loader binary while argv[0] carries the Windows path.
fn record_from_parts(
    pid: u32,
    name: String,
    argv0: &str,
    exe: &str,
    window_title: String,
) -> ProcessRecord {
    let executable_path = if cfg!(target_os = "linux") {
        if argv0.is_empty() { exe } else { argv0 }
    } else if exe.is_empty() {
        argv0
    } else {
        exe
    };

    let name = if cfg!(target_os = "linux") && name.len() >= COMM_MAX_LEN {
        full_name_from_path(argv0).unwrap_or(name)
    } else {
        name
    };

    ProcessRecord {
        pid,
        name,
        window_title,
        executable_path: executable_path.to_string(),
    }
}

/// Returns the final component of a `/`- or `\`-separated path, if non-empty.
fn full_name_from_path(path: &str) -> Option<String> {
    let last = path.rsplit(['/', '\\']).next()?;
    if last.is_empty() {
        None
    } else {
        Some(last.to_string())
    }
}
