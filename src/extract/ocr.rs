// OCR fallback: rasterize with pdftoppm, recognize with tesseract
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

use crate::config::OcrConfig;

use super::quality::clean_text;
use super::{DocumentProbe, EngineError, EngineOutput, ExtractionEngine};

/// Prior output shorter than this (trimmed) still counts as "nothing" and
/// keeps the OCR fallback in play.
const NEAR_EMPTY_CHARS: usize = 32;

/// Last engine in the chain and by far the most expensive one. Rasterizes
/// each page into the session workspace and runs Tesseract over the images.
/// Bounded by a page-count cap and a per-page raster pixel ceiling; requires
/// the `pdftoppm` and `tesseract` binaries on PATH. Intermediate images stay
/// in the workspace for the session store's purge to reclaim.
pub struct OcrEngine {
    dpi: u32,
    max_pages: usize,
    max_raster_pixels: u64,
    lang: String,
}

impl OcrEngine {
    pub fn new(cfg: &OcrConfig) -> Self {
        Self {
            dpi: cfg.dpi,
            max_pages: cfg.max_pages,
            max_raster_pixels: cfg.max_raster_pixels,
            lang: cfg.lang.clone(),
        }
    }

    fn check_available() -> Result<(), EngineError> {
        for tool in ["pdftoppm", "tesseract"] {
            Command::new(tool)
                .arg("--version")
                .output()
                .map_err(|_| EngineError::Unavailable(format!("{tool} not found on PATH")))?;
        }
        Ok(())
    }

    fn rasterize(&self, doc: &[u8], dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
        std::fs::create_dir_all(dir)?;
        let input = dir.join("input.pdf");
        std::fs::write(&input, doc)?;

        let prefix = dir.join("page");
        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg(self.max_pages.to_string())
            .arg(&input)
            .arg(&prefix)
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Corrupt(format!(
                "rasterization failed: {}",
                stderr.trim()
            )));
        }

        let mut pages = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with("page") && name.ends_with(".png") {
                pages.push(path);
            }
        }
        // pdftoppm zero-pads page numbers per document, so length-then-name
        // ordering recovers the page sequence.
        pages.sort_by(|a, b| {
            let ka = (a.as_os_str().len(), a.clone());
            let kb = (b.as_os_str().len(), b.clone());
            ka.cmp(&kb)
        });
        Ok(pages)
    }

    fn recognize(&self, image_path: &Path) -> Result<String, EngineError> {
        let (w, h) = image::image_dimensions(image_path)
            .map_err(|e| EngineError::Corrupt(format!("unreadable raster page: {e}")))?;
        let pixels = u64::from(w) * u64::from(h);
        if pixels > self.max_raster_pixels {
            return Err(EngineError::ResourceExceeded(format!(
                "rasterized page has {pixels} pixels, limit is {}",
                self.max_raster_pixels
            )));
        }

        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .arg("--psm")
            .arg("4")
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Unsupported(format!(
                "recognition failed: {}",
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ExtractionEngine for OcrEngine {
    fn name(&self) -> &'static str {
        "ocr"
    }

    /// OCR only runs when everything before it produced nothing usable.
    fn applies(&self, probe: &DocumentProbe, best_so_far: Option<&EngineOutput>) -> bool {
        if probe.parsed && probe.pages > self.max_pages {
            return false;
        }
        match best_so_far {
            Some(out) => out.text.trim().chars().count() < NEAR_EMPTY_CHARS,
            None => true,
        }
    }

    fn extract(&self, doc: &[u8], workspace: &Path) -> Result<EngineOutput, EngineError> {
        Self::check_available()?;
        info!(dpi = self.dpi, "rasterizing for OCR");

        let raster_dir = workspace.join("ocr");
        let pages = self.rasterize(doc, &raster_dir)?;
        if pages.is_empty() {
            return Err(EngineError::Corrupt(
                "rasterization produced no pages".to_string(),
            ));
        }

        let mut page_texts = Vec::with_capacity(pages.len());
        for page in &pages {
            match self.recognize(page) {
                Ok(text) => page_texts.push(clean_text(&text)),
                Err(EngineError::ResourceExceeded(msg)) => {
                    return Err(EngineError::ResourceExceeded(msg))
                }
                Err(e) => {
                    warn!(page = %page.display(), "page recognition failed: {e}");
                    page_texts.push(String::new());
                }
            }
        }

        Ok(EngineOutput {
            text: page_texts.join("\n\n").trim().to_string(),
            pages: pages.len(),
        })
    }
}
