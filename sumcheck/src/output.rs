//! Output formatting for CLI commands.
//!
//! Results are written to stdout as text or JSON; errors go to stderr.

use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};
use sumcheck_core::Digest;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
        }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Write a result to stdout.
    ///
    /// `text_fn` is only called in text mode.
    pub fn write<T: Serialize>(&self, data: &T, text_fn: impl FnOnce() -> String) -> Result<()> {
        let mut stdout = io::stdout().lock();
        self.render(&mut stdout, data, text_fn)
    }

    fn render<T: Serialize>(
        &self,
        out: &mut impl Write,
        data: &T,
        text_fn: impl FnOnce() -> String,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(out, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(out, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error to stderr, as a JSON object in JSON mode.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// One input digested by the `digest` command.
#[derive(Debug, Clone, Serialize)]
pub struct DigestedInput {
    pub path: String,
    pub digest: Digest,
    pub bytes: u64,
}

/// Output for `digest` command.
#[derive(Debug, Serialize)]
pub struct DigestOutput {
    pub success: bool,
    pub result_code: u8,
    pub inputs: Vec<DigestedInput>,
}

/// Output for `verify` command.
#[derive(Debug, Serialize)]
pub struct VerifyOutput {
    pub success: bool,
    pub result_code: u8,
    pub path: String,
    pub verified: bool,
    pub expected: Digest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Digest>,
    pub bytes: u64,
}

/// Output for `length` command.
#[derive(Debug, Serialize)]
pub struct LengthOutput {
    pub success: bool,
    pub result_code: u8,
    pub path: String,
    pub verified: bool,
    pub expected: u64,
    pub actual: u64,
}
