//! Heuristic recognition of printed stack traces.
//!
//! # Responsibilities
//! - Classify single lines as trace headers, cause headers, frames, or plain text
//! - Merge a header and its frames into one captured error
//!
//! # Design Decisions
//! - Classification is a trait so hosts can swap the heuristic
//! - A header is held until the next line proves whether frames follow
//! - A header that never gets a frame is released as an ordinary line

use std::sync::LazyLock;

use regex::Regex;

use crate::lines::captured::CapturedError;

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<class>(?:[A-Za-z_$][\w$]*(?:\.|::))*[A-Za-z_$][\w$]*(?:Exception|Error|Throwable|Panic))(?::\s?(?P<message>.*))?$",
    )
    .expect("header pattern is valid")
});

static FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(?:at\s|\.\.\.\s\d+\s|Suppressed:\s|\d+:\s)").expect("frame pattern is valid")
});

const CAUSE_PREFIX: &str = "Caused by: ";

/// What a single completed line looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// First line of a printed error.
    Header {
        class_name: String,
        message: Option<String>,
    },
    /// Start of a nested cause inside a trace.
    Cause {
        class_name: String,
        message: Option<String>,
    },
    /// An indented frame line.
    Frame,
    Plain,
}

/// Decides how each line participates in trace merging.
pub trait LineClassifier: Send + Sync {
    fn classify(&self, line: &str) -> LineKind;
}

/// Recognizes `path.to.SomeException: message` / `crate::SomeError` headers
/// followed by indented `at ...`, `... N more`, or numbered backtrace frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceClassifier;

impl TraceClassifier {
    fn parse_header(text: &str) -> Option<(String, Option<String>)> {
        let caps = HEADER.captures(text)?;
        let class_name = caps.name("class")?.as_str().to_string();
        let message = caps.name("message").map(|m| m.as_str().to_string());
        Some((class_name, message))
    }
}

impl LineClassifier for TraceClassifier {
    fn classify(&self, line: &str) -> LineKind {
        if FRAME.is_match(line) {
            return LineKind::Frame;
        }
        if let Some(rest) = line.strip_prefix(CAUSE_PREFIX) {
            let (class_name, message) =
                Self::parse_header(rest).unwrap_or_else(|| (rest.to_string(), None));
            return LineKind::Cause { class_name, message };
        }
        match Self::parse_header(line) {
            Some((class_name, message)) => LineKind::Header { class_name, message },
            None => LineKind::Plain,
        }
    }
}

/// Treats every line as plain text, disabling trace merging.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainClassifier;

impl LineClassifier for PlainClassifier {
    fn classify(&self, _line: &str) -> LineKind {
        LineKind::Plain
    }
}

/// Output of the assembler: an ordinary line, or a merged trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembled {
    Line(String),
    Block { header: String, error: CapturedError },
}

#[derive(Debug)]
struct PendingBlock {
    raw: Vec<String>,
    // Outermost error first.
    chain: Vec<CapturedError>,
}

impl PendingBlock {
    fn add_frame(&mut self, line: String) {
        if let Some(innermost) = self.chain.last_mut() {
            innermost.frames.push(line.trim_start().to_string());
        }
        self.raw.push(line);
    }

    fn add_cause(&mut self, line: String, class_name: String, message: Option<String>) {
        self.chain.push(CapturedError::new(class_name, message));
        self.raw.push(line);
    }

    fn has_frames(&self) -> bool {
        self.chain.iter().any(|e| !e.frames.is_empty())
    }

    fn into_error(self) -> Option<CapturedError> {
        let mut errors = self.chain.into_iter().rev();
        let mut error = errors.next()?;
        for mut outer in errors {
            outer.cause = Some(Box::new(error));
            error = outer;
        }
        Some(error)
    }
}

/// Rolling window over completed lines that merges traces into one record.
#[derive(Debug, Default)]
pub struct BlockAssembler {
    pending: Option<PendingBlock>,
}

impl BlockAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one completed line; finished output is appended to `out`.
    pub fn push(&mut self, line: String, classifier: &dyn LineClassifier, out: &mut Vec<Assembled>) {
        let kind = classifier.classify(&line);

        if let Some(pending) = self.pending.as_mut() {
            match kind {
                LineKind::Frame => {
                    pending.add_frame(line);
                    return;
                }
                LineKind::Cause { class_name, message } => {
                    pending.add_cause(line, class_name, message);
                    return;
                }
                _ => self.flush(out),
            }
        }

        match kind {
            LineKind::Header { class_name, message } => {
                self.pending = Some(PendingBlock {
                    chain: vec![CapturedError::new(class_name, message)],
                    raw: vec![line],
                });
            }
            _ => out.push(Assembled::Line(line)),
        }
    }

    /// Release whatever is being held.
    pub fn flush(&mut self, out: &mut Vec<Assembled>) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if !pending.has_frames() {
            out.extend(pending.raw.into_iter().map(Assembled::Line));
            return;
        }
        let header = pending.raw.first().cloned().unwrap_or_default();
        if let Some(error) = pending.into_error() {
            out.push(Assembled::Block { header, error });
        }
    }

    /// True when no lines are held.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }
}
