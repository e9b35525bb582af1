//! Append-only writer for array-framed JSON output files.
//!
//! The file is reopened in append mode for every write; no handle is held
//! between appends. Layout:
//!
//! ```text
//! [
//! {element}
//! ,
//! {element}
//! ]
//! ```
//!
//! Elements are prefixed with a separator instead of followed by one, so the
//! body is a valid open array after every completed append and a single
//! closing bracket finishes it.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

const OPEN: &[u8] = b"[\n";
const SEPARATOR: &[u8] = b",\n";
const CLOSE: &[u8] = b"\n]\n";

/// How the writer takes over its file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayStart {
    /// Truncate and write a new skeleton
    Fresh,
    /// Continue an existing array holding `existing` elements
    Resume { existing: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramingState {
    Pending,
    Open,
    Closed,
}

/// Writer for one array-framed output file
#[derive(Debug)]
pub struct StreamingArrayWriter {
    path: PathBuf,
    start: ArrayStart,
    first_entry: bool,
    state: FramingState,
    appended: usize,
}

impl StreamingArrayWriter {
    pub fn new(path: impl Into<PathBuf>, start: ArrayStart) -> Self {
        let first_entry = match start {
            ArrayStart::Fresh => true,
            ArrayStart::Resume { existing } => existing == 0,
        };
        Self {
            path: path.into(),
            start,
            first_entry,
            state: FramingState::Pending,
            appended: 0,
        }
    }

    /// Open the framing: write the opening bracket for a fresh file, or
    /// reopen the tail of an existing array so appends continue its body.
    pub fn initialize(&mut self) -> anyhow::Result<()> {
        if self.state != FramingState::Pending {
            anyhow::bail!("{} already initialized", self.path.display());
        }
        match self.start {
            ArrayStart::Fresh => {
                let mut file = File::create(&self.path)
                    .with_context(|| format!("Cannot create {}", self.path.display()))?;
                file.write_all(OPEN)
                    .with_context(|| format!("Cannot write {}", self.path.display()))?;
            }
            ArrayStart::Resume { existing } => {
                let trimmed = reopen_tail(&self.path)
                    .with_context(|| format!("Cannot reopen {}", self.path.display()))?;
                log::debug!(
                    "{}: resuming after {existing} entries ({trimmed} tail bytes trimmed)",
                    self.path.display()
                );
            }
        }
        self.state = FramingState::Open;
        Ok(())
    }

    /// Serialize and append one element.
    pub fn append<T: Serialize>(&mut self, record: &T) -> anyhow::Result<()> {
        self.ensure_open()?;
        let json = serde_json::to_string_pretty(record).context("Cannot serialize record")?;

        let mut buf = Vec::with_capacity(json.len() + SEPARATOR.len());
        if !self.first_entry {
            buf.extend_from_slice(SEPARATOR);
        }
        buf.extend_from_slice(json.as_bytes());
        self.write_raw(&buf)?;

        self.first_entry = false;
        self.appended += 1;
        Ok(())
    }

    /// Write a `// ERROR:` annotation line between elements.
    ///
    /// Readers in this crate skip such lines; strict JSON parsers do not.
    pub fn annotate(&mut self, message: &str) -> anyhow::Result<()> {
        self.ensure_open()?;
        let line = format!("\n// ERROR: {}\n", single_line(message));
        self.write_raw(line.as_bytes())
    }

    /// Write the closing bracket. Safe to call more than once.
    pub fn finalize(&mut self) -> anyhow::Result<()> {
        match self.state {
            FramingState::Closed => Ok(()),
            FramingState::Pending => {
                // Never opened: nothing on disk belongs to us
                self.state = FramingState::Closed;
                Ok(())
            }
            FramingState::Open => {
                self.state = FramingState::Closed;
                self.write_raw(CLOSE)
            }
        }
    }

    /// Elements appended by this writer
    pub fn appended(&self) -> usize {
        self.appended
    }

    pub fn is_first_overall_entry(&self) -> bool {
        self.first_entry
    }

    fn ensure_open(&self) -> anyhow::Result<()> {
        match self.state {
            FramingState::Open => Ok(()),
            FramingState::Pending => {
                anyhow::bail!("{} not initialized", self.path.display())
            }
            FramingState::Closed => anyhow::bail!("{} already finalized", self.path.display()),
        }
    }

    fn write_raw(&self, bytes: &[u8]) -> anyhow::Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Cannot open {} for append", self.path.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("Cannot append to {}", self.path.display()))?;
        Ok(())
    }
}

impl Drop for StreamingArrayWriter {
    fn drop(&mut self) {
        if self.state == FramingState::Open {
            log::warn!(
                "{}: closing array on drop after {} appends",
                self.path.display(),
                self.appended
            );
            if let Err(e) = self.finalize() {
                log::error!("{}: failed to close array: {e:#}", self.path.display());
            }
        }
    }
}

/// Annotations occupy exactly one line.
fn single_line(message: &str) -> String {
    message
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Largest tail we expect to trim (closing bracket plus whitespace).
const TAIL_WINDOW: u64 = 4096;

/// Cut the closing bracket (and a dangling separator) off an existing array
/// so the next append continues its body. Returns the number of bytes removed.
fn reopen_tail(path: &Path) -> io::Result<u64> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();
    let window_start = len.saturating_sub(TAIL_WINDOW);
    file.seek(SeekFrom::Start(window_start))?;
    let mut tail = Vec::with_capacity((len - window_start) as usize);
    file.read_to_end(&mut tail)?;

    let mut end = tail.len();
    let skip_ws = |end: &mut usize| {
        while *end > 0 && tail[*end - 1].is_ascii_whitespace() {
            *end -= 1;
        }
    };
    skip_ws(&mut end);
    if end > 0 && tail[end - 1] == b']' {
        end -= 1;
        skip_ws(&mut end);
    }
    if end > 0 && tail[end - 1] == b',' {
        end -= 1;
        skip_ws(&mut end);
    }
    // keep the newline after a bare opening bracket
    if end > 0 && tail[end - 1] == b'[' && tail.get(end) == Some(&b'\n') {
        end += 1;
    }

    let new_len = window_start + end as u64;
    file.set_len(new_len)?;
    file.sync_all()?;
    Ok(len - new_len)
}
