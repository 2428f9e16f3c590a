//! Operator-facing messages

use std::io::Write;

/// Kind of message shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Question,
    /// Capture is about to start
    Listening,
    Warning,
    Success,
    Error,
}

impl MessageKind {
    const fn marker(self) -> &'static str {
        match self {
            Self::Info => "",
            Self::Question => "? ",
            Self::Listening => "[listening] ",
            Self::Warning => "! ",
            Self::Success => "ok: ",
            Self::Error => "error: ",
        }
    }
}

/// Where user-facing text goes
///
/// Diagnostics go through `tracing`; this is only for what the operator reads.
pub trait DisplaySink: Send + Sync {
    fn display(&self, message: &str, kind: MessageKind);
}

/// Writes messages to stdout, warnings and errors to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleDisplay;

impl DisplaySink for ConsoleDisplay {
    fn display(&self, message: &str, kind: MessageKind) {
        let line = format!("{}{message}", kind.marker());
        // A closed terminal leaves nothing to report to
        let _ = match kind {
            MessageKind::Warning | MessageKind::Error => writeln!(std::io::stderr(), "{line}"),
            _ => writeln!(std::io::stdout(), "{line}"),
        };
    }
}
