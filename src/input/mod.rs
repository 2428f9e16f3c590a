//! Operator input: voice-first arbitration, typed lines and display

mod arbitrator;
mod display;
mod terminal;

pub use arbitrator::{ArbiterState, InputArbitrator, MAGIC_PHRASES, is_magic_phrase};
pub use display::{ConsoleDisplay, DisplaySink, MessageKind};
pub use terminal::{TerminalInput, TextInput};
