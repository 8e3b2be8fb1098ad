//! Console output formatter for daemon results

use crate::cli::commands::OutputFormat;
use crate::output::formatter::OutputFormatter;
use butlerd_domain::RpcFault;
use colored::Colorize;
use serde_json::Value;

/// Formats results for console display
pub struct ConsoleFormatter {
    format: OutputFormat,
}

impl ConsoleFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render JSON in the configured layout
    pub fn format_json(format: OutputFormat, value: &Value) -> String {
        let rendered = match format {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        };
        rendered.unwrap_or_else(|_| value.to_string())
    }

    /// Describe a fault, naming the well-known kind when there is one
    pub fn describe_fault(fault: &RpcFault) -> String {
        let mut output = format!(
            "{} {}",
            format!("error {}:", fault.code).red().bold(),
            fault.message
        );
        if let Some(kind) = fault.kind {
            output.push_str(&format!(" {}", format!("({:?})", kind).dimmed()));
        }
        if let Some(data) = &fault.data {
            output.push('\n');
            output.push_str(&Self::indent(&Self::format_json(OutputFormat::Pretty, data), "  "));
        }
        output
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_result(&self, result: &Value) -> String {
        Self::format_json(self.format, result)
    }

    fn format_fault(&self, fault: &RpcFault) -> String {
        Self::describe_fault(fault)
    }
}
