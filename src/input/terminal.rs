//! Typed input from the terminal

use std::io::{BufRead, IsTerminal};

use async_trait::async_trait;
use dialoguer::Input;

use crate::{Error, Result};

/// Source of typed lines
#[async_trait]
pub trait TextInput: Send {
    /// Read one line after showing `prompt`; the result is trimmed
    async fn read_line(&mut self, prompt: &str) -> Result<String>;
}

/// Reads lines from stdin
///
/// Uses a `dialoguer` prompt on an interactive terminal and plain line
/// reads when stdin is piped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalInput;

#[async_trait]
impl TextInput for TerminalInput {
    async fn read_line(&mut self, prompt: &str) -> Result<String> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || read_blocking(&prompt))
            .await
            .map_err(|e| Error::Input(format!("input task failed: {e}")))?
    }
}

fn read_blocking(prompt: &str) -> Result<String> {
    if std::io::stdin().is_terminal() {
        let line: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| Error::Input(e.to_string()))?;
        return Ok(line.trim().to_string());
    }

    println!("{prompt}");
    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Err(Error::Input("end of input".to_string()));
    }
    Ok(line.trim().to_string())
}
