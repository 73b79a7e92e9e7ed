//! Synthetic error reconstructed from printed stack traces.

use std::error::Error;
use std::fmt;

use serde::Serialize;

/// An error rebuilt from a printed trace: header, frames, and cause chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedError {
    pub class_name: String,
    pub message: Option<String>,
    /// Frame lines as printed, trimmed of leading whitespace.
    pub frames: Vec<String>,
    pub cause: Option<Box<CapturedError>>,
}

impl CapturedError {
    pub fn new(class_name: impl Into<String>, message: Option<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message,
            frames: Vec::new(),
            cause: None,
        }
    }

    /// The innermost error of the cause chain.
    pub fn root_cause(&self) -> &CapturedError {
        let mut current = self;
        while let Some(cause) = current.cause.as_deref() {
            current = cause;
        }
        current
    }

    /// Frames across the whole cause chain.
    pub fn total_frames(&self) -> usize {
        self.frames.len() + self.cause.as_ref().map_or(0, |c| c.total_frames())
    }

    /// Multi-line text in the printed trace layout.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut current = Some(self);
        let mut first = true;
        while let Some(err) = current {
            if !first {
                out.push_str("Caused by: ");
            }
            out.push_str(&err.to_string());
            out.push('\n');
            for frame in &err.frames {
                out.push('\t');
                out.push_str(frame);
                out.push('\n');
            }
            first = false;
            current = err.cause.as_deref();
        }
        out
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.class_name, message),
            None => f.write_str(&self.class_name),
        }
    }
}

impl Error for CapturedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> CapturedError {
        let mut outer = CapturedError::new("app.Failure", Some("outer".into()));
        outer.frames.push("at app.Main.run(Main.java:10)".into());
        let mut inner = CapturedError::new("io.Timeout", None);
        inner.frames.push("at io.Socket.read(Socket.java:3)".into());
        inner.frames.push("... 1 more".into());
        outer.cause = Some(Box::new(inner));
        outer
    }

    #[test]
    fn test_display_and_source_chain() {
        let err = chain();
        assert_eq!(err.to_string(), "app.Failure: outer");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("io.Timeout"));
        assert_eq!(err.root_cause().class_name, "io.Timeout");
        assert_eq!(err.total_frames(), 3);
    }

    #[test]
    fn test_render_layout() {
        let rendered = chain().render();
        assert_eq!(
            rendered,
            "app.Failure: outer\n\tat app.Main.run(Main.java:10)\n\
             Caused by: io.Timeout\n\tat io.Socket.read(Socket.java:3)\n\t... 1 more\n"
        );
    }
}
