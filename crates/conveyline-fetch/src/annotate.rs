//! Where batch failure annotations go

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use conveyline_core::StreamingArrayWriter;

/// Annotation target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnnotationMode {
    /// `// ERROR:` lines inside the output array
    #[default]
    Inline,
    /// Plain lines in `<output>.errors.log`, keeping the array strict JSON
    Sidecar,
}

impl AnnotationMode {
    /// Parse config string into enum
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "inline" => Some(Self::Inline),
            "sidecar" => Some(Self::Sidecar),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Sidecar => "sidecar",
        }
    }
}

/// Sidecar file next to an output file
pub fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".errors.log");
    PathBuf::from(name)
}

/// Records annotation lines in the configured place
#[derive(Debug, Clone)]
pub enum ErrorAnnotator {
    Inline,
    Sidecar(PathBuf),
}

impl ErrorAnnotator {
    pub fn new(mode: AnnotationMode, output: &Path) -> Self {
        match mode {
            AnnotationMode::Inline => Self::Inline,
            AnnotationMode::Sidecar => Self::Sidecar(sidecar_path(output)),
        }
    }

    pub fn record(&self, writer: &mut StreamingArrayWriter, line: &str) -> anyhow::Result<()> {
        match self {
            Self::Inline => writer.annotate(line),
            Self::Sidecar(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Cannot open {}", path.display()))?;
                writeln!(file, "ERROR: {}", line.replace(['\n', '\r'], " "))
                    .with_context(|| format!("Cannot append to {}", path.display()))
            }
        }
    }
}
