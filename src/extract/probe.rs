// Cheap structural probe used for engine routing decisions
use lopdf::content::Content;
use lopdf::{Document, Object};
use tracing::debug;

/// What the routing logic needs to know about a document before any engine
/// runs: page count, whether a text layer exists at all, and roughly how
/// much of one. Computed once per chain invocation.
#[derive(Debug, Clone, Default)]
pub struct DocumentProbe {
    pub pages: usize,
    pub encrypted: bool,
    /// Characters found in text-showing operators across all pages.
    pub text_chars: usize,
    /// False when the document could not be parsed at all.
    pub parsed: bool,
}

impl DocumentProbe {
    /// Probe a document. Never fails: an unparseable document yields an
    /// empty probe, and the chain falls through to OCR.
    pub fn from_bytes(data: &[u8]) -> Self {
        let doc = match Document::load_mem(data) {
            Ok(doc) => doc,
            Err(e) => {
                debug!("probe could not parse document: {e}");
                return DocumentProbe::default();
            }
        };

        let pages = doc.get_pages();
        let mut text_chars = 0usize;
        for (_page_no, page_id) in pages.iter() {
            if let Ok(content_data) = doc.get_page_content(*page_id) {
                text_chars += count_text_bytes(&content_data);
            }
        }

        DocumentProbe {
            pages: pages.len(),
            encrypted: doc.is_encrypted(),
            text_chars,
            parsed: true,
        }
    }

    pub fn has_text_layer(&self) -> bool {
        self.text_chars > 0
    }
}

/// Count the bytes carried by text-showing operators (Tj, TJ, ', ") in one
/// decoded content stream. A rough measure, but routing only needs to know
/// "nothing", "almost nothing", or "plenty".
fn count_text_bytes(content_data: &[u8]) -> usize {
    let content = match Content::decode(content_data) {
        Ok(c) => c,
        Err(_) => return 0,
    };

    let mut count = 0usize;
    for op in &content.operations {
        match op.operator.as_str() {
            "Tj" | "'" | "\"" => {
                for operand in &op.operands {
                    if let Object::String(bytes, _) = operand {
                        count += bytes.len();
                    }
                }
            }
            "TJ" => {
                for operand in &op.operands {
                    if let Object::Array(items) = operand {
                        for item in items {
                            if let Object::String(bytes, _) = item {
                                count += bytes.len();
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::testutil::{blank_pdf, text_pdf};

    #[test]
    fn probe_finds_text_layer_in_born_digital_pdf() {
        let data = text_pdf(&["Hello world, this is page one."]);
        let probe = DocumentProbe::from_bytes(&data);
        assert!(probe.parsed);
        assert_eq!(probe.pages, 1);
        assert!(probe.has_text_layer());
        assert!(probe.text_chars >= 20);
    }

    #[test]
    fn probe_sees_no_text_layer_in_blank_pdf() {
        let data = blank_pdf(2);
        let probe = DocumentProbe::from_bytes(&data);
        assert!(probe.parsed);
        assert_eq!(probe.pages, 2);
        assert!(!probe.has_text_layer());
    }

    #[test]
    fn probe_never_fails_on_garbage() {
        let probe = DocumentProbe::from_bytes(b"not a pdf at all");
        assert!(!probe.parsed);
        assert_eq!(probe.pages, 0);
        assert!(!probe.has_text_layer());
    }
}
