// Direct text-layer extraction via pdf-extract
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use tracing::info;

use super::quality::clean_text;
use super::{DocumentProbe, EngineError, EngineOutput, ExtractionEngine};

/// First engine in the chain: pulls the embedded text layer straight out of
/// the document. Fast, but useless for scanned pages and prone to garbled
/// output on exotic encodings, which the sufficiency check catches.
pub struct StructuralTextEngine;

impl ExtractionEngine for StructuralTextEngine {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn applies(&self, probe: &DocumentProbe, _best_so_far: Option<&EngineOutput>) -> bool {
        probe.has_text_layer() && !probe.encrypted
    }

    fn extract(&self, doc: &[u8], _workspace: &Path) -> Result<EngineOutput, EngineError> {
        info!("extracting text layer");
        // pdf-extract panics on some malformed documents; contain that to
        // this invocation so the chain can fall through.
        let extracted = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(doc)))
            .map_err(|_| EngineError::Corrupt("text-layer parser panicked".to_string()))?
            .map_err(|e| EngineError::Corrupt(e.to_string()))?;

        // Pages arrive separated by form feeds.
        let pages = extracted.split('\u{0C}').filter(|p| !p.trim().is_empty()).count();
        Ok(EngineOutput {
            text: clean_text(&extracted),
            pages: pages.max(1),
        })
    }
}
