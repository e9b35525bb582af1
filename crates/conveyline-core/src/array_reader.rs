//! Reading array-framed JSON files written incrementally.
//!
//! Files produced by [`StreamingArrayWriter`](crate::StreamingArrayWriter) may
//! carry `// ERROR:` annotation lines between elements, and a run killed
//! between two appends leaves the array without its closing bracket. Both are
//! tolerated here.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

/// How the array text was terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Ends with a closing bracket
    Closed,
    /// Closing bracket missing (interrupted run)
    Unclosed,
}

/// State of a previous output file found on disk
#[derive(Debug)]
pub enum PriorOutput {
    /// No file yet
    Missing,
    /// Parsed successfully
    Parsed { entries: Vec<Value>, framing: Framing },
    /// Present but not an array we can read
    Corrupt { reason: String },
}

impl PriorOutput {
    /// Inspect `path`. Never fails: unreadable files are reported as corrupt.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match parse_array_text(&text) {
                Ok((entries, framing)) => Self::Parsed { entries, framing },
                Err(e) => Self::Corrupt {
                    reason: e.to_string(),
                },
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::Missing,
            Err(e) => Self::Corrupt {
                reason: e.to_string(),
            },
        }
    }
}

/// Remove `//` annotation lines. JSON never puts `//` at the start of a line.
fn strip_annotations(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse array text, recovering from a missing closing bracket.
pub fn parse_array_text(text: &str) -> Result<(Vec<Value>, Framing), serde_json::Error> {
    let cleaned = strip_annotations(text);
    let first_err = match serde_json::from_str::<Vec<Value>>(&cleaned) {
        Ok(entries) => return Ok((entries, Framing::Closed)),
        Err(e) => e,
    };

    // Interrupted run: body is intact up to the last complete element
    let body = cleaned.trim_end();
    let body = body.strip_suffix(',').unwrap_or(body);
    if body.trim_start().starts_with('[') && !body.ends_with(']') {
        if let Ok(entries) = serde_json::from_str::<Vec<Value>>(&format!("{body}\n]")) {
            return Ok((entries, Framing::Unclosed));
        }
    }
    Err(first_err)
}

/// Read an input array file. Missing or unparsable input is an error.
pub fn read_array(path: &Path) -> anyhow::Result<Vec<Value>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let (entries, framing) = parse_array_text(&text)
        .with_context(|| format!("Invalid JSON array in {}", path.display()))?;
    if framing == Framing::Unclosed {
        log::warn!(
            "{} is missing its closing bracket (interrupted run?), read {} entries",
            path.display(),
            entries.len()
        );
    }
    Ok(entries)
}

/// Rename an unusable file out of the way so a fresh one can take its place.
pub fn move_aside(path: &Path) -> io::Result<PathBuf> {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".corrupt-{stamp}"));
    let target = PathBuf::from(name);
    fs::rename(path, &target)?;
    Ok(target)
}
