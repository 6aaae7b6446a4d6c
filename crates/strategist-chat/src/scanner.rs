//! Directive scanner.
//!
//! Finds an action envelope embedded in model output. Candidates are tried
//! in marker order: ```` ```json ```` fences, bare ```` ``` ```` fences, label
//! phrases ("Here's the action:"), then every `{` in the text. The first
//! candidate that validates as an envelope wins.
//!
//! Object ends are found with a bracket-depth state machine, so braces
//! inside JSON strings never end an object early and an unterminated
//! object yields no candidate.

use std::ops::Range;

use regex::Regex;
use tracing::{debug, warn};

use strategist_action::envelope::parse_envelope;
use strategist_action::ActionEnvelope;
use strategist_core::config::EngineConfig;

const FENCE: &str = "```";

/// Which marker produced an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    JsonFence,
    BareFence,
    Label,
    Brace,
}

/// A validated envelope and where it sits in the text.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub envelope: ActionEnvelope,
    /// Byte range to remove from the display text (fences and label
    /// included).
    pub span: Range<usize>,
    /// Byte range of the JSON object itself.
    pub object: Range<usize>,
    pub marker: MarkerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InString,
    Escaped,
}

/// Exclusive end of the JSON object opening at byte `start`.
///
/// Returns `None` when `text[start]` is not `{` or the object never closes.
pub fn object_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }

    let mut state = ScanState::Outside;
    let mut depth = 0usize;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        state = match (state, byte) {
            (ScanState::Outside, b'"') => ScanState::InString,
            (ScanState::Outside, b'{') => {
                depth += 1;
                ScanState::Outside
            }
            (ScanState::Outside, b'}') => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
                ScanState::Outside
            }
            (ScanState::InString, b'\\') => ScanState::Escaped,
            (ScanState::InString, b'"') => ScanState::Outside,
            (ScanState::Escaped, _) => ScanState::InString,
            (current, _) => current,
        };
    }
    None
}

struct FenceBlock<'a> {
    start: usize,
    content: Range<usize>,
    end: usize,
    tag: &'a str,
}

pub struct Scanner {
    labels: Option<Regex>,
}

impl Scanner {
    /// Build a scanner recognising the given label phrases (case-insensitive).
    pub fn new(label_markers: &[String]) -> Self {
        let alternatives: Vec<String> = label_markers
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(regex::escape)
            .collect();

        let labels = if alternatives.is_empty() {
            None
        } else {
            match Regex::new(&format!("(?i)(?:{})", alternatives.join("|"))) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(error = %e, "Could not compile label markers, ignoring them");
                    None
                }
            }
        };
        Self { labels }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.label_markers)
    }

    /// Find the first candidate that validates as an action envelope.
    pub fn scan(&self, text: &str) -> Option<Extraction> {
        if !text.contains('{') {
            return None;
        }

        let fences = fence_blocks(text);
        let extraction = self
            .scan_fences(text, &fences, MarkerKind::JsonFence)
            .or_else(|| self.scan_fences(text, &fences, MarkerKind::BareFence))
            .or_else(|| self.scan_labels(text))
            .or_else(|| scan_braces(text));

        match &extraction {
            Some(found) => debug!(
                action = %found.envelope.action_type,
                marker = ?found.marker,
                start = found.span.start,
                end = found.span.end,
                "Directive found"
            ),
            None => debug!("No directive found"),
        }
        extraction
    }

    fn scan_fences(
        &self,
        text: &str,
        fences: &[FenceBlock<'_>],
        kind: MarkerKind,
    ) -> Option<Extraction> {
        fences
            .iter()
            .filter(|fence| match kind {
                MarkerKind::JsonFence => fence.tag.eq_ignore_ascii_case("json"),
                _ => fence.tag.is_empty(),
            })
            .find_map(|fence| {
                let open = text[fence.content.clone()].find('{')? + fence.content.start;
                let end = object_end(text, open).filter(|&end| end <= fence.content.end)?;
                let envelope = parse_envelope(&text[open..end]).ok()?;
                Some(Extraction {
                    envelope,
                    span: self.label_before(text, fence.start)..fence.end,
                    object: open..end,
                    marker: kind,
                })
            })
    }

    fn scan_labels(&self, text: &str) -> Option<Extraction> {
        let labels = self.labels.as_ref()?;
        labels.find_iter(text).find_map(|label| {
            let open = text[label.end()..].find('{')? + label.end();
            let end = object_end(text, open)?;
            let envelope = parse_envelope(&text[open..end]).ok()?;
            Some(Extraction {
                envelope,
                span: label.start()..end,
                object: open..end,
                marker: MarkerKind::Label,
            })
        })
    }

    /// Start of a label phrase separated from `pos` only by whitespace, so
    /// "Here's the action:" above a fence is removed with it.
    fn label_before(&self, text: &str, pos: usize) -> usize {
        let Some(labels) = &self.labels else {
            return pos;
        };
        let head = &text[..pos];
        labels
            .find_iter(head)
            .filter(|m| head[m.end()..].trim().is_empty())
            .last()
            .map_or(pos, |m| m.start())
    }
}

fn scan_braces(text: &str) -> Option<Extraction> {
    text.match_indices('{').find_map(|(open, _)| {
        let end = object_end(text, open)?;
        let envelope = parse_envelope(&text[open..end]).ok()?;
        Some(Extraction {
            envelope,
            span: open..end,
            object: open..end,
            marker: MarkerKind::Brace,
        })
    })
}

/// Pair up fence markers in order. A trailing unmatched fence is ignored.
fn fence_blocks(text: &str) -> Vec<FenceBlock<'_>> {
    let positions: Vec<usize> = text.match_indices(FENCE).map(|(i, _)| i).collect();
    positions
        .chunks_exact(2)
        .map(|pair| {
            let (open, close) = (pair[0], pair[1]);
            let after_open = open + FENCE.len();
            let tag_len = text[after_open..close]
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
                .unwrap_or(close - after_open);
            FenceBlock {
                start: open,
                content: after_open + tag_len..close,
                end: close + FENCE.len(),
                tag: &text[after_open..after_open + tag_len],
            }
        })
        .collect()
}
