// Layout-aware extraction: content-stream walk with reading-order rebuild
use lopdf::content::Content;
use lopdf::{Document, Object};
use std::path::Path;
use tracing::info;

use super::quality::clean_text;
use super::{DocumentProbe, EngineError, EngineOutput, ExtractionEngine};

/// Runs further apart than this on the x axis start a new column.
const COLUMN_GAP: f32 = 100.0;
/// Runs within this vertical distance belong to the same line.
const LINE_TOL: f32 = 3.0;

/// Second engine in the chain: walks the content streams itself, tracking
/// text-positioning operators, and reassembles multi-column pages column by
/// column, top to bottom, so reading order survives. No font decoding is
/// attempted: string bytes are taken as 8-bit text, which is wrong for CID
/// fonts; the sufficiency check downstream rejects garbled output.
pub struct LayoutAwareEngine;

#[derive(Debug, Clone)]
struct TextRun {
    x: f32,
    y: f32,
    text: String,
}

impl ExtractionEngine for LayoutAwareEngine {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn applies(&self, probe: &DocumentProbe, _best_so_far: Option<&EngineOutput>) -> bool {
        probe.has_text_layer() && !probe.encrypted
    }

    fn extract(&self, doc: &[u8], _workspace: &Path) -> Result<EngineOutput, EngineError> {
        info!("extracting with layout reconstruction");
        let document =
            Document::load_mem(doc).map_err(|e| EngineError::Corrupt(e.to_string()))?;

        let pages = document.get_pages();
        let mut page_texts = Vec::with_capacity(pages.len());
        for (_page_no, page_id) in pages.iter() {
            let content_data = match document.get_page_content(*page_id) {
                Ok(data) => data,
                Err(_) => continue,
            };
            let runs = collect_runs(&content_data);
            if runs.is_empty() {
                continue;
            }
            page_texts.push(assemble_page(runs));
        }

        if page_texts.is_empty() {
            return Err(EngineError::Unsupported(
                "no text runs found in any content stream".to_string(),
            ));
        }

        let pages_done = page_texts.len();
        Ok(EngineOutput {
            text: clean_text(&page_texts.join("\n\n")),
            pages: pages_done,
        })
    }
}

/// Walk one decoded content stream and collect positioned text runs. Only
/// the translation part of the text matrix is tracked; that is enough to
/// order runs on the page.
fn collect_runs(content_data: &[u8]) -> Vec<TextRun> {
    let content = match Content::decode(content_data) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let mut runs = Vec::new();
    let mut x = 0.0f32;
    let mut y = 0.0f32;
    let mut leading = 0.0f32;

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => {
                x = 0.0;
                y = 0.0;
            }
            "Tm" => {
                if op.operands.len() == 6 {
                    x = number(&op.operands[4]).unwrap_or(x);
                    y = number(&op.operands[5]).unwrap_or(y);
                }
            }
            "Td" => {
                if op.operands.len() == 2 {
                    x += number(&op.operands[0]).unwrap_or(0.0);
                    y += number(&op.operands[1]).unwrap_or(0.0);
                }
            }
            "TD" => {
                if op.operands.len() == 2 {
                    let ty = number(&op.operands[1]).unwrap_or(0.0);
                    leading = -ty;
                    x += number(&op.operands[0]).unwrap_or(0.0);
                    y += ty;
                }
            }
            "TL" => {
                if let Some(l) = op.operands.first().and_then(number) {
                    leading = l;
                }
            }
            "T*" => y -= leading,
            "Tj" => {
                if let Some(text) = op.operands.first().and_then(string_bytes) {
                    push_run(&mut runs, x, y, text);
                }
            }
            "'" => {
                y -= leading;
                if let Some(text) = op.operands.first().and_then(string_bytes) {
                    push_run(&mut runs, x, y, text);
                }
            }
            "\"" => {
                y -= leading;
                if let Some(text) = op.operands.get(2).and_then(string_bytes) {
                    push_run(&mut runs, x, y, text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let mut combined = String::new();
                    for item in items {
                        if let Some(text) = string_bytes(item) {
                            combined.push_str(&text);
                        }
                    }
                    push_run(&mut runs, x, y, combined);
                }
            }
            _ => {}
        }
    }
    runs
}

fn push_run(runs: &mut Vec<TextRun>, x: f32, y: f32, text: String) {
    if !text.trim().is_empty() {
        runs.push(TextRun { x, y, text });
    }
}

/// Rebuild one page: split runs into columns on large x gaps, then order
/// each column top-to-bottom with same-line runs joined left-to-right.
fn assemble_page(runs: Vec<TextRun>) -> String {
    let mut starts: Vec<f32> = runs.iter().map(|r| r.x).collect();
    starts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    // Column boundaries sit in the gaps between sorted x positions.
    let mut boundaries = Vec::new();
    for pair in starts.windows(2) {
        if pair[1] - pair[0] > COLUMN_GAP {
            boundaries.push((pair[0] + pair[1]) / 2.0);
        }
    }

    let mut columns: Vec<Vec<TextRun>> = vec![Vec::new(); boundaries.len() + 1];
    for run in runs {
        let idx = boundaries.iter().filter(|b| run.x > **b).count();
        columns[idx].push(run);
    }

    let mut column_texts = Vec::new();
    for mut column in columns {
        if column.is_empty() {
            continue;
        }
        // Top of the page has the largest y.
        column.sort_by(|a, b| {
            b.y.partial_cmp(&a.y)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
        });

        let mut lines: Vec<String> = Vec::new();
        let mut line_y = f32::INFINITY;
        for run in column {
            if (line_y - run.y).abs() <= LINE_TOL && !lines.is_empty() {
                let last = lines.last_mut().expect("non-empty lines");
                last.push(' ');
                last.push_str(&run.text);
            } else {
                line_y = run.y;
                lines.push(run.text);
            }
        }
        column_texts.push(lines.join("\n"));
    }

    column_texts.join("\n\n")
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

fn string_bytes(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) => {
            if bytes.starts_with(&[0xFE, 0xFF]) {
                // UTF-16BE with BOM
                let units: Vec<u16> = bytes[2..]
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                Some(String::from_utf16_lossy(&units))
            } else {
                Some(String::from_utf8_lossy(bytes).into_owned())
            }
        }
        _ => None,
    }
}
