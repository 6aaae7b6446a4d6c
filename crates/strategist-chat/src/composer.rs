//! Builds the text shown to the user once a directive has been handled.

use std::ops::Range;

use strategist_core::config::EngineConfig;

/// Everything the composer needs to pick the display text.
#[derive(Debug, Clone, Default)]
pub struct Composition<'a> {
    pub original: &'a str,
    /// Directive span to remove from `original`.
    pub span: Option<Range<usize>>,
    /// The directive's own JSON text. Any further copies are removed too.
    pub directive: Option<&'a str>,
    pub display_message: Option<&'a str>,
    pub acknowledgment: Option<&'a str>,
}

impl<'a> Composition<'a> {
    pub fn passthrough(original: &'a str) -> Self {
        Self {
            original,
            ..Self::default()
        }
    }
}

pub struct ResponseComposer {
    fallback_message: String,
}

impl ResponseComposer {
    pub fn new(fallback_message: impl Into<String>) -> Self {
        Self {
            fallback_message: fallback_message.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.fallback_message.clone())
    }

    /// Pick the display text: the envelope's `display_message`, then the
    /// handler acknowledgment, then the original with the directive
    /// removed. Without a span the original comes back untouched.
    pub fn compose(&self, input: &Composition<'_>) -> String {
        let non_blank = |s: &&str| !s.trim().is_empty();

        if let Some(message) = input.display_message.filter(non_blank) {
            return normalize_whitespace(message);
        }
        if let Some(ack) = input.acknowledgment.filter(non_blank) {
            return normalize_whitespace(ack);
        }
        let Some(span) = input.span.clone() else {
            return input.original.to_string();
        };

        let mut stripped = strip_span(input.original, span);
        if let Some(directive) = input.directive.filter(non_blank) {
            stripped = stripped.replace(directive, "");
        }
        let text = normalize_whitespace(&stripped);
        if text.is_empty() {
            self.fallback_message.clone()
        } else {
            text
        }
    }
}

/// Remove `span` from `text`. A space on each side of the hole collapses
/// to one.
pub fn strip_span(text: &str, span: Range<usize>) -> String {
    let (Some(before), Some(after)) = (text.get(..span.start), text.get(span.end..)) else {
        return text.to_string();
    };
    let after = if before.ends_with(' ') {
        after.trim_start_matches(' ')
    } else {
        after
    };
    format!("{}{}", before, after)
}

/// Trim trailing whitespace on every line, collapse runs of blank lines to
/// one, and trim the whole text.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}
