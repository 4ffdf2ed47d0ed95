// Service configuration loaded from TOML with built-in defaults
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP listener binds to.
    pub bind_addr: String,
    /// Root directory for session workspaces. When absent a process-scoped
    /// temporary directory is used and removed on shutdown.
    pub storage_root: Option<PathBuf>,
    /// Upload ceiling in bytes. Requests above this are rejected before a
    /// workspace is allocated.
    pub max_upload_bytes: usize,
    /// Session time-to-live in minutes.
    pub session_ttl_minutes: i64,
    /// Shortened deadline applied after a completed download, in minutes.
    pub download_grace_minutes: i64,
    /// How often the reaper scans for expired sessions, in seconds.
    pub reap_interval_secs: u64,
    /// Wall-clock ceiling for a single engine invocation, in seconds.
    pub engine_timeout_secs: u64,
    /// Overall deadline for one upload request, in seconds.
    pub request_timeout_secs: u64,
    /// Extracted text shorter than this is judged insufficient.
    pub min_text_length: usize,
    /// Minimum quality score (0.0-1.0) for a result to end the chain.
    pub quality_floor: f32,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Rasterization resolution passed to pdftoppm.
    pub dpi: u32,
    /// Maximum number of pages the OCR engine will rasterize.
    pub max_pages: usize,
    /// Per-page raster pixel ceiling (width * height).
    pub max_raster_pixels: u64,
    /// Tesseract language pack.
    pub lang: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            storage_root: None,
            max_upload_bytes: 16 * 1024 * 1024,
            session_ttl_minutes: 24 * 60,
            download_grace_minutes: 5,
            reap_interval_secs: 300,
            engine_timeout_secs: 60,
            request_timeout_secs: 180,
            min_text_length: 50,
            quality_floor: 0.4,
            ocr: OcrConfig::default(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_pages: 20,
            max_raster_pixels: 16_000_000,
            lang: "eng".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, or defaults when no path given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read config file {}", p.display()))?;
                let cfg: AppConfig = toml::from_str(&raw)
                    .with_context(|| format!("failed to parse config file {}", p.display()))?;
                Ok(cfg)
            }
            None => Ok(AppConfig::default()),
        }
    }
}
