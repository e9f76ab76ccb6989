//! Best-effort window title lookup, keyed by owning process id.
//!
//! Each platform builds the whole pid → title map in one pass so the enumerator never
//! issues a query per process:
//!   - Windows  `EnumWindows` over visible, titled top-level windows.
//!   - macOS    `NSWorkspace.runningApplications` localized names.
//!   - others   `wmctrl -l -p` (EWMH window managers, including Wine windows).
//!
//! Any failure yields an empty map; callers treat a missing entry as "no title".
use std::collections::HashMap;

/// Returns the first known title for every pid that owns one.
pub fn titles_by_pid() -> HashMap<u32, String> {
    imp::titles_by_pid()
}

/// Parses `wmctrl -l -p` output.
///
/// Each line reads `<window id> <desktop> <pid> <host> <title…>`; the title may contain
/// any amount of whitespace.  Lines with pid 0 (no `_NET_WM_PID`) or an empty title are
/// skipped, and only the first window per pid is kept.
#[cfg_attr(any(windows, target_os = "macos"), allow(dead_code))]
fn parse_wmctrl_listing(output: &str) -> HashMap<u32, String> {
    let mut titles = HashMap::new();
    for line in output.lines() {
        let mut rest = line.trim_start();
        let mut fields = [""; 4];
        let mut complete = true;
        for field in fields.iter_mut() {
            let Some((head, tail)) = rest.split_once(char::is_whitespace) else {
                complete = false;
                break;
            };
            *field = head;
            rest = tail.trim_start();
        }
        if !complete {
            continue;
        }

        let Ok(pid) = fields[2].parse::<u32>() else {
            continue;
        };
        let title = rest.trim_end();
        if pid == 0 || title.is_empty() {
            continue;
        }
        titles.entry(pid).or_insert_with(|| title.to_string());
    }
    titles
}

// ── Windows implementation ────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use std::collections::HashMap;

    use windows::Win32::Foundation::{BOOL, HWND, LPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowTextW, GetWindowThreadProcessId, IsWindowVisible,
    };

    const TITLE_BUF_LEN: usize = 512;

    pub fn titles_by_pid() -> HashMap<u32, String> {
        let mut titles: HashMap<u32, String> = HashMap::new();
        // SAFETY: `collect_title` only runs for the duration of this EnumWindows call,
        // while `titles` is alive and exclusively borrowed through `lparam`.
        let result = unsafe {
            EnumWindows(
                Some(collect_title),
                LPARAM(&mut titles as *mut HashMap<u32, String> as isize),
            )
        };
        if let Err(e) = result {
            tracing::debug!("EnumWindows failed: {e}");
        }
        titles
    }

    unsafe extern "system" fn collect_title(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let titles = &mut *(lparam.0 as *mut HashMap<u32, String>);

        if !IsWindowVisible(hwnd).as_bool() {
            return true.into();
        }

        let mut pid = 0u32;
        GetWindowThreadProcessId(hwnd, Some(&mut pid));
        if pid == 0 || titles.contains_key(&pid) {
            return true.into();
        }

        let mut buf = [0u16; TITLE_BUF_LEN];
        let len = GetWindowTextW(hwnd, &mut buf);
        if len > 0 {
            titles.insert(pid, String::from_utf16_lossy(&buf[..len as usize]));
        }
        true.into()
    }
}

// ── macOS implementation ──────────────────────────────────────────────────────

#[cfg(target_os = "macos")]
mod imp {
    use std::collections::HashMap;

    use objc::runtime::{Class, Object};
    use objc::{msg_send, sel, sel_impl};

    pub fn titles_by_pid() -> HashMap<u32, String> {
        objc::rc::autoreleasepool(|| {
            let mut titles = HashMap::new();
            // SAFETY: plain message sends to NSWorkspace / NSRunningApplication; every
            // returned pointer is null-checked before use.
            unsafe {
                let Some(workspace_class) = Class::get("NSWorkspace") else {
                    return titles;
                };
                let workspace: *mut Object = msg_send![workspace_class, sharedWorkspace];
                if workspace.is_null() {
                    return titles;
                }
                let apps: *mut Object = msg_send![workspace, runningApplications];
                if apps.is_null() {
                    return titles;
                }

                let count: usize = msg_send![apps, count];
                for i in 0..count {
                    let app: *mut Object = msg_send![apps, objectAtIndex: i];
                    if app.is_null() {
                        continue;
                    }
                    let pid: i32 = msg_send![app, processIdentifier];
                    let name: *mut Object = msg_send![app, localizedName];
                    if let (true, Some(name)) = (pid > 0, nsstring_to_string(name)) {
                        titles.insert(pid as u32, name);
                    }
                }
            }
            titles
        })
    }

    unsafe fn nsstring_to_string(nsstring: *mut Object) -> Option<String> {
        if nsstring.is_null() {
            return None;
        }
        let c_str: *const std::os::raw::c_char = msg_send![nsstring, UTF8String];
        if c_str.is_null() {
            return None;
        }
        let s = std::ffi::CStr::from_ptr(c_str).to_string_lossy().into_owned();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }
}

// ── Linux / other Unix implementation ─────────────────────────────────────────

#[cfg(not(any(windows, target_os = "macos")))]
mod imp {
    use std::collections::HashMap;
    use std::process::Command;

    pub fn titles_by_pid() -> HashMap<u32, String> {
        match Command::new("wmctrl").args(["-l", "-p"]).output() {
            Ok(output) if output.status.success() => {
                super::parse_wmctrl_listing(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                tracing::trace!(status = %output.status, "wmctrl returned an error");
                HashMap::new()
            }
            Err(e) => {
                tracing::trace!("wmctrl unavailable: {e}");
                HashMap::new()
            }
        }
    }
}
