// Prioritized engine iteration with fallback
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

use crate::config::AppConfig;

use super::layout::LayoutAwareEngine;
use super::ocr::OcrEngine;
use super::quality::is_sufficient;
use super::structural::StructuralTextEngine;
use super::{DocumentProbe, EngineDescriptor, EngineOutput, ExtractionEngine, ExtractionResult};

/// Tries engines in ascending rank order and stops at the first sufficient
/// result. Engine failures and timeouts are recovered locally; only
/// total-chain failure is reported to the caller, and as a failed
/// ExtractionResult rather than an error. No engine is retried within one
/// invocation.
pub struct EngineChain {
    engines: Vec<(EngineDescriptor, Arc<dyn ExtractionEngine>)>,
    min_text_length: usize,
    quality_floor: f32,
    engine_timeout: Duration,
}

impl EngineChain {
    pub fn new(
        engines: Vec<Arc<dyn ExtractionEngine>>,
        min_text_length: usize,
        quality_floor: f32,
        engine_timeout: Duration,
    ) -> Self {
        let engines = engines
            .into_iter()
            .enumerate()
            .map(|(rank, engine)| {
                (
                    EngineDescriptor {
                        name: engine.name(),
                        rank,
                    },
                    engine,
                )
            })
            .collect();
        Self {
            engines,
            min_text_length,
            quality_floor,
            engine_timeout,
        }
    }

    /// The production chain: structural, then layout-aware, then OCR.
    pub fn with_default_engines(cfg: &AppConfig) -> Self {
        Self::new(
            vec![
                Arc::new(StructuralTextEngine) as Arc<dyn ExtractionEngine>,
                Arc::new(LayoutAwareEngine),
                Arc::new(OcrEngine::new(&cfg.ocr)),
            ],
            cfg.min_text_length,
            cfg.quality_floor,
            Duration::from_secs(cfg.engine_timeout_secs),
        )
    }

    pub fn descriptors(&self) -> Vec<EngineDescriptor> {
        self.engines.iter().map(|(d, _)| d.clone()).collect()
    }

    /// Run the chain over one document inside the given session workspace.
    /// Engine work runs on blocking workers under a per-invocation timeout;
    /// timed-out work is abandoned and its partial output discarded.
    pub async fn run(&self, doc: Arc<Vec<u8>>, workspace: std::path::PathBuf) -> ExtractionResult {
        let started = Instant::now();

        let probe = {
            let doc = doc.clone();
            spawn_blocking(move || DocumentProbe::from_bytes(&doc))
                .await
                .unwrap_or_default()
        };
        debug!(
            pages = probe.pages,
            text_chars = probe.text_chars,
            encrypted = probe.encrypted,
            "document probed"
        );

        let mut best: Option<(&'static str, EngineOutput)> = None;
        let mut last_error: Option<String> = None;

        for (descriptor, engine) in &self.engines {
            let name = descriptor.name;
            if !engine.applies(&probe, best.as_ref().map(|(_, out)| out)) {
                debug!(engine = name, "engine not applicable, skipping");
                continue;
            }

            let task = {
                let engine = engine.clone();
                let doc = doc.clone();
                let workspace = workspace.clone();
                spawn_blocking(move || engine.extract(doc.as_slice(), &workspace))
            };

            let output = match tokio::time::timeout(self.engine_timeout, task).await {
                Err(_) => {
                    warn!(engine = name, "engine timed out, falling through");
                    last_error = Some(format!("{name}: resource limit exceeded: wall-clock timeout"));
                    continue;
                }
                Ok(Err(join_err)) => {
                    warn!(engine = name, "engine task aborted: {join_err}");
                    last_error = Some(format!("{name}: task aborted"));
                    continue;
                }
                Ok(Ok(Err(e))) => {
                    warn!(engine = name, "engine failed: {e}");
                    last_error = Some(format!("{name}: {e}"));
                    continue;
                }
                Ok(Ok(Ok(output))) => output,
            };

            if is_sufficient(&output.text, self.min_text_length, self.quality_floor) {
                info!(
                    engine = name,
                    pages = output.pages,
                    chars = output.text.len(),
                    "extraction succeeded"
                );
                return ExtractionResult {
                    text: output.text,
                    engine: Some(name),
                    success: true,
                    error: None,
                    pages: output.pages,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                };
            }

            debug!(
                engine = name,
                chars = output.text.trim().len(),
                "output judged insufficient, falling through"
            );
            let better = best
                .as_ref()
                .map(|(_, b)| output.text.trim().len() > b.text.trim().len())
                .unwrap_or(true);
            if better {
                best = Some((name, output));
            }
        }

        // Chain exhausted. The best insufficient candidate rides along for
        // diagnostics, but the result is a failure.
        let error = last_error.unwrap_or_else(|| "no engine produced sufficient text".to_string());
        warn!("extraction chain exhausted: {error}");
        let (engine, text, pages) = match best {
            Some((name, out)) => (Some(name), out.text, out.pages),
            None => (None, String::new(), 0),
        };
        ExtractionResult {
            text,
            engine,
            success: false,
            error: Some(error),
            pages,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}
