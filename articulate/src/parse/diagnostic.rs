//! Positioned parser messages
use std::fmt;

/// How serious a [`Diagnostic`] is
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// The input was accepted, possibly after a correction
    Warning,
    /// The enclosing block was discarded
    Error,
}

/// A message tied to a position in a definition file
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Line number, starting at 1
    pub line: usize,
    /// Column number, starting at 1
    pub col: usize,
    /// Name of the file (empty until attached)
    pub file: String,
    /// Text of the offending line (empty until attached)
    pub text: String,
}

impl Diagnostic {
    /// Builds an error at the given position
    pub fn error<S: Into<String>>(line: usize, col: usize, message: S) -> Self {
        Self::new(Severity::Error, line, col, message)
    }

    /// Builds a warning at the given position
    pub fn warning<S: Into<String>>(
        line: usize,
        col: usize,
        message: S,
    ) -> Self {
        Self::new(Severity::Warning, line, col, message)
    }

    fn new<S: Into<String>>(
        severity: Severity,
        line: usize,
        col: usize,
        message: S,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            line,
            col,
            file: String::new(),
            text: String::new(),
        }
    }

    /// Attaches the file name and the offending line's text
    pub fn attach(mut self, file: &str, source: &str) -> Self {
        self.file = file.to_owned();
        self.text = source
            .lines()
            .nth(self.line.saturating_sub(1))
            .unwrap_or("")
            .to_owned();
        self
    }

    /// Checks whether this is an error
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.file, self.line, self.message)?;
        if !self.text.is_empty() {
            // tabs are kept so that the caret lines up
            let caret: String = self
                .text
                .chars()
                .take(self.col.saturating_sub(1))
                .map(|c| if c == '\t' { '\t' } else { '-' })
                .collect();
            write!(f, "\n{}\n{caret}^", self.text)?;
        }
        Ok(())
    }
}
