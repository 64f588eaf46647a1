//! Output formatting

use serde::Serialize;
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::error::CliResult;

/// Renders command results in the selected format
#[derive(Debug, Clone, Copy)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Display any serializable value (pretty JSON in both formats)
    pub fn display<T: Serialize + ?Sized>(&self, value: &T) -> CliResult<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Display a single string, wrapped in `{ field: value }` for JSON
    pub fn display_value(&self, field: &str, value: &str) -> CliResult<()> {
        match self.format {
            OutputFormat::Human => {
                println!("{value}");
                Ok(())
            }
            OutputFormat::Json => self.display(&json!({ field: value })),
        }
    }

    /// Display PEM public keys
    pub fn display_keys(&self, pems: &[String]) -> CliResult<()> {
        print!("{}", self.render_keys(pems)?);
        Ok(())
    }

    fn render_keys(&self, pems: &[String]) -> CliResult<String> {
        Ok(match self.format {
            OutputFormat::Human => pems
                .iter()
                .map(|pem| format!("{}\n", pem.trim_end()))
                .collect::<Vec<_>>()
                .join("\n"),
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&Value::from(pems))?),
        })
    }
}
