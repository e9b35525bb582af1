//! Set of transfers already persisted in the output file

use std::path::Path;

use anyhow::Context;
use conveyline_core::{ArrayStart, Framing, PriorOutput, move_aside};
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::key::RecordKey;

/// Keys of every record in the output, loaded at startup and extended as
/// new records are appended.
#[derive(Debug, Default)]
pub struct DedupIndex {
    keys: FxHashSet<RecordKey>,
    /// Records found in the prior output, duplicates included
    loaded: usize,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the records of an already-parsed output array
    pub fn from_records(records: &[Value]) -> Self {
        Self {
            keys: records.iter().map(RecordKey::from_persisted).collect(),
            loaded: records.len(),
        }
    }

    /// Load the index from a prior output file and decide how the writer
    /// should open it.
    ///
    /// A missing file starts fresh. A file that cannot be parsed is renamed
    /// aside and also starts fresh; it is never truncated in place.
    pub fn load(output: &Path) -> anyhow::Result<(Self, ArrayStart)> {
        match PriorOutput::load(output) {
            PriorOutput::Missing => {
                log::info!("No existing output at {}, starting fresh", output.display());
                Ok((Self::new(), ArrayStart::Fresh))
            }
            PriorOutput::Parsed { entries, framing } => {
                if framing == Framing::Unclosed {
                    log::warn!(
                        "{} was not closed by the previous run, resuming after its last complete record",
                        output.display()
                    );
                }
                let index = Self::from_records(&entries);
                log::info!(
                    "Loaded {} existing transfers ({} unique) from {}",
                    index.loaded,
                    index.len(),
                    output.display()
                );
                Ok((index, ArrayStart::Resume { existing: entries.len() }))
            }
            PriorOutput::Corrupt { reason } => {
                let moved = move_aside(output).with_context(|| {
                    format!("Cannot move unreadable output {} aside", output.display())
                })?;
                log::warn!(
                    "Existing output {} is unreadable ({reason}), moved to {} and starting fresh",
                    output.display(),
                    moved.display()
                );
                Ok((Self::new(), ArrayStart::Fresh))
            }
        }
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.keys.contains(key)
    }

    /// Record `key`. Returns `false` when it was already present.
    pub fn insert(&mut self, key: RecordKey) -> bool {
        self.keys.insert(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Records read from the prior output
    pub fn loaded(&self) -> usize {
        self.loaded
    }
}
