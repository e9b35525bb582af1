//! Tax extraction by downloading the recorded document and running OCR on
//! its first page.
//!
//! Rasterization and recognition are delegated to the `pdftoppm` (poppler)
//! and `tesseract` executables.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, bail};
use conveyline_core::{FetchError, SHARED_RUNTIME, http_client};

use crate::tax::{TaxExtractor, TaxOutcome, outcome_from_text};

/// External tools used for OCR
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub pdftoppm: PathBuf,
    pub tesseract: PathBuf,
    /// Rasterization resolution
    pub dpi: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            pdftoppm: PathBuf::from("pdftoppm"),
            tesseract: PathBuf::from("tesseract"),
            dpi: 100,
        }
    }
}

/// Reads the conveyance tax off the first page of a recorded document
#[derive(Debug, Clone, Default)]
pub struct OcrExtractor {
    config: OcrConfig,
}

impl OcrExtractor {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    fn try_extract(&self, document_url: &str) -> Result<TaxOutcome> {
        let pdf = download(document_url)?;
        let workdir = tempfile::tempdir().context("Cannot create OCR work directory")?;

        let pdf_path = workdir.path().join("document.pdf");
        fs::write(&pdf_path, &pdf)
            .with_context(|| format!("Cannot write {}", pdf_path.display()))?;

        let image = self.rasterize(&pdf_path, &workdir.path().join("page"))?;
        let text = self.recognize(&image)?;
        log::debug!("OCR produced {} chars for {document_url}", text.len());
        Ok(outcome_from_text(&text))
    }

    /// First page as JPEG at `<prefix>.jpg`
    fn rasterize(&self, pdf: &Path, prefix: &Path) -> Result<PathBuf> {
        let mut cmd = Command::new(&self.config.pdftoppm);
        cmd.arg("-r")
            .arg(self.config.dpi.to_string())
            .args(["-f", "1", "-l", "1", "-jpeg", "-singlefile"])
            .arg(pdf)
            .arg(prefix);
        run_tool(&mut cmd, "pdftoppm")?;

        let image = prefix.with_extension("jpg");
        if !image.exists() {
            bail!("pdftoppm produced no image (empty document?)");
        }
        Ok(image)
    }

    fn recognize(&self, image: &Path) -> Result<String> {
        let mut cmd = Command::new(&self.config.tesseract);
        cmd.arg(image).arg("stdout");
        let output = run_tool(&mut cmd, "tesseract")?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TaxExtractor for OcrExtractor {
    fn extract(&self, document_url: &str) -> TaxOutcome {
        match self.try_extract(document_url) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Tax lookup failed for {document_url}: {e:#}");
                TaxOutcome::Failed(format!("{e:#}"))
            }
        }
    }
}

fn download(url: &str) -> Result<Vec<u8>> {
    let bytes = SHARED_RUNTIME.handle().block_on(async {
        let response = http_client().get(url).send().await.map_err(FetchError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: Some(status.as_u16()),
                message: status.canonical_reason().unwrap_or("request failed").to_string(),
                body: None,
            });
        }
        response.bytes().await.map_err(FetchError::from_reqwest)
    })?;
    Ok(bytes.to_vec())
}

/// Run an external tool, failing on spawn errors and nonzero exit
fn run_tool(cmd: &mut Command, name: &str) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("Cannot run {name}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{name} failed ({}): {}", output.status, stderr.trim());
    }
    Ok(output)
}
