// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optical character recognition of rendered pages.
//!
//! The default engine shells out to poppler's `pdftoppm` to render each
//! page to PNG and to `tesseract` to read it back as text.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

use crate::config::OcrConfig;

/// Recognized text of one page (1-based page number).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// Pluggable OCR backend.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with a description of what is missing when the engine cannot run.
    fn check_available(&self) -> Result<()>;

    /// OCR output of every page, in page order. Pages whose recognition
    /// fails are left out.
    fn recognize(&self, path: &Path) -> Result<Vec<PageText>>;
}

/// `pdftoppm` + `tesseract` engine.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    pdftoppm: String,
    tesseract: String,
    language: String,
    dpi: u32,
}

impl TesseractOcr {
    pub fn new(
        pdftoppm: impl Into<String>,
        tesseract: impl Into<String>,
        language: impl Into<String>,
        dpi: u32,
    ) -> Self {
        Self {
            pdftoppm: pdftoppm.into(),
            tesseract: tesseract.into(),
            language: language.into(),
            dpi,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(
            config.pdftoppm(),
            config.tesseract(),
            config.language(),
            config.dpi(),
        )
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn locate(binary: &str) -> Result<PathBuf> {
        which::which(binary).with_context(|| format!("'{}' not found on PATH", binary))
    }

    fn rasterize(&self, path: &Path, out_dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
        let prefix = out_dir.join("page");
        let output = Command::new(Self::locate(&self.pdftoppm)?)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(path)
            .arg(&prefix)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to spawn {}", self.pdftoppm))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} failed (status {}): {}",
                self.pdftoppm,
                output.status,
                stderr.trim()
            );
        }

        let mut images = Vec::new();
        for entry in std::fs::read_dir(out_dir)? {
            let image = entry?.path();
            if let Some(page) = page_number(&image) {
                images.push((page, image));
            }
        }
        images.sort();
        Ok(images)
    }

    fn read_image(&self, tesseract: &Path, image: &Path) -> Result<String> {
        let output = Command::new(tesseract)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to spawn {}", self.tesseract))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} failed (status {}): {}",
                self.tesseract,
                output.status,
                stderr.trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn check_available(&self) -> Result<()> {
        Self::locate(&self.pdftoppm)?;
        Self::locate(&self.tesseract)?;
        Ok(())
    }

    fn recognize(&self, path: &Path) -> Result<Vec<PageText>> {
        let tesseract = Self::locate(&self.tesseract)?;
        let scratch = tempfile::tempdir().context("Failed to create OCR scratch directory")?;
        let images = self.rasterize(path, scratch.path())?;
        tracing::debug!("rendered {} pages of {}", images.len(), path.display());

        let mut pages = Vec::with_capacity(images.len());
        for (page, image) in images {
            match self.read_image(&tesseract, &image) {
                Ok(text) => pages.push(PageText { page, text }),
                Err(e) => tracing::warn!("OCR failed on page {}: {:#}", page, e),
            }
        }
        Ok(pages)
    }
}

/// Page number from a `pdftoppm` output name such as `page-07.png`.
fn page_number(image: &Path) -> Option<u32> {
    if image.extension()? != "png" {
        return None;
    }
    let stem = image.file_stem()?.to_str()?;
    stem.rsplit('-').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_from_rendered_names() {
        assert_eq!(page_number(Path::new("/tmp/x/page-1.png")), Some(1));
        assert_eq!(page_number(Path::new("/tmp/x/page-012.png")), Some(12));
        assert_eq!(page_number(Path::new("/tmp/x/page-3.ppm")), None);
        assert_eq!(page_number(Path::new("/tmp/x/notes.png")), None);
    }

    #[test]
    fn missing_binaries_are_reported() {
        let engine = TesseractOcr::new(
            "aria-no-such-rasterizer",
            "aria-no-such-ocr",
            "eng",
            200,
        );
        let err = engine.check_available().unwrap_err();
        assert!(err.to_string().contains("aria-no-such-rasterizer"));
    }

    #[test]
    fn config_values_flow_into_engine() {
        let config = OcrConfig {
            language: Some("deu".to_string()),
            ..Default::default()
        };
        let engine = TesseractOcr::from_config(&config);
        assert_eq!(engine.language(), "deu");
        assert_eq!(engine.name(), "tesseract");
    }
}
