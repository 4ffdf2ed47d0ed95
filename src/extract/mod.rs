// Text extraction engines and the fallback chain
pub mod chain;
pub mod layout;
pub mod ocr;
pub mod probe;
pub mod quality;
pub mod structural;
#[cfg(test)]
pub(crate) mod testutil;

pub use chain::EngineChain;
pub use probe::DocumentProbe;

use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Internal failure of a single engine. Recovered by the chain, never
/// surfaced directly to a client.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("corrupt or unreadable document: {0}")]
    Corrupt(String),
    #[error("unsupported document feature: {0}")]
    Unsupported(String),
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("resource limit exceeded: {0}")]
    ResourceExceeded(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw output of one engine invocation, before sufficiency judgment.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub text: String,
    pub pages: usize,
}

/// Static description of one chain entry.
#[derive(Debug, Clone, Serialize)]
pub struct EngineDescriptor {
    pub name: &'static str,
    /// Ascending priority: rank 0 runs first.
    pub rank: usize,
}

/// The single result a chain invocation produces for a session.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub engine: Option<&'static str>,
    pub success: bool,
    pub error: Option<String>,
    pub pages: usize,
    pub elapsed_ms: u64,
}

/// One concrete text-extraction strategy. Engines run synchronously on a
/// blocking worker; the chain owns the wall-clock timeout around them.
/// Engines may write intermediates into the session workspace but never
/// clean it up (the session store's purge owns that).
pub trait ExtractionEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cheap applicability check against the structural probe and the best
    /// output any earlier engine produced.
    fn applies(&self, probe: &DocumentProbe, best_so_far: Option<&EngineOutput>) -> bool;

    fn extract(&self, doc: &[u8], workspace: &Path) -> Result<EngineOutput, EngineError>;
}
