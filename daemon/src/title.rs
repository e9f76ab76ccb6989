//! Window-title heuristics: project name, unsaved marker and FL Studio version.
//!
//! Known title shapes:
//!   Windows  `FL Studio 21 - MyProject.flp`
//!   macOS    `MyProject.flp — FL Studio 21`
//!   unsaved  `FL Studio 21 - MyProject.flp *`
//!
//! Anything else falls through to a bare `*.flp` token search and, failing that, to
//! "no project".  An unrecognised title is a normal outcome, not an error.
use std::sync::LazyLock;

use regex::Regex;

/// Windows-style separator; the project follows it.
const DASH_SEPARATOR: &str = " - ";
/// macOS-style separator; the project precedes it.
const EM_DASH_SEPARATOR: &str = " — ";
const PROJECT_EXTENSION: &str = ".flp";
const UNSAVED_MARKER: char = '*';
const UNTITLED: &str = "Untitled";

pub const DEFAULT_VERSION: &str = "FL Studio";

/// Most specific first: "FL Studio 2024" also contains "FL Studio 20".
const TITLE_VERSIONS: &[&str] = &[
    "FL Studio 2025",
    "FL Studio 2024",
    "FL Studio 21",
    "FL Studio 20",
    "FL Studio 12",
    "FL Studio",
];

/// Process-name markers consulted when the title names no version.
const BUILD_MARKERS: &[(&str, &str)] = &[
    ("FL64", "FL Studio (64-bit)"),
    ("FL.exe", "FL Studio (32-bit)"),
];

/// Group 1 is the bare `<name>.flp` token; a trailing unsaved marker is outside it.
static PROJECT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^-—]+\.flp)\s*\*?").expect("static regex"));

/// Fields recovered from a single window title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTitle {
    /// `None` when no project could be identified or it is the `Untitled` placeholder.
    pub project_name: Option<String>,
    pub has_unsaved_changes: bool,
    /// Version named in the title itself; see [`resolve_version`] for the fallback.
    pub version: Option<&'static str>,
}

/// Parses a raw window title.  An empty title yields all defaults.
pub fn parse_title(title: &str) -> ParsedTitle {
    if title.is_empty() {
        return ParsedTitle::default();
    }

    let mut parsed = ParsedTitle {
        version: version_from_title(title),
        ..ParsedTitle::default()
    };

    if let Some(segment) = project_segment(title) {
        parsed.has_unsaved_changes = segment.contains(UNSAVED_MARKER);
        parsed.project_name = clean_project_name(segment);
    }
    parsed
}

/// Picks the project part of the title; the first rule that applies wins.
fn project_segment(title: &str) -> Option<&str> {
    if let Some((_, after)) = title.split_once(DASH_SEPARATOR) {
        return Some(after);
    }
    if let Some((before, _)) = title.split_once(EM_DASH_SEPARATOR) {
        return Some(before);
    }
    PROJECT_TOKEN
        .captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Strips extension, unsaved markers and whitespace; rejects the placeholder name.
fn clean_project_name(segment: &str) -> Option<String> {
    let name = segment.strip_suffix(PROJECT_EXTENSION).unwrap_or(segment);
    let name = name.trim_end_matches(|c: char| c == UNSAVED_MARKER || c.is_whitespace());
    // An unsaved marker written after the extension hides it from the first strip.
    let name = name.strip_suffix(PROJECT_EXTENSION).unwrap_or(name);
    let name = name.trim();

    let placeholder = name == UNTITLED
        || name
            .strip_suffix(PROJECT_EXTENSION)
            .is_some_and(|stem| stem == UNTITLED);
    if name.is_empty() || placeholder {
        None
    } else {
        Some(name.to_string())
    }
}

fn version_from_title(title: &str) -> Option<&'static str> {
    TITLE_VERSIONS
        .iter()
        .copied()
        .find(|version| title.contains(version))
}

/// Final version label: the title's version if any, else a build marker from the
/// process name, else [`DEFAULT_VERSION`].
pub fn resolve_version(from_title: Option<&'static str>, process_name: &str) -> &'static str {
    from_title
        .or_else(|| {
            BUILD_MARKERS
                .iter()
                .find(|(marker, _)| process_name.contains(marker))
                .map(|(_, label)| *label)
        })
        .unwrap_or(DEFAULT_VERSION)
}
