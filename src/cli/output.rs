//! Terminal rendering for CLI commands.

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use rmcp::model::{CallToolResult, RawContent, ResourceContents};
use serde::Serialize;

/// Output mode for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

pub fn output_json<T: Serialize>(item: &T) {
    match serde_json::to_string_pretty(item) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Could not encode output as JSON: {}", e)),
    }
}

/// Render rows under `headers`, or `empty` when there are none.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>, empty: &str) {
    if rows.is_empty() {
        println!("{}", empty.dimmed());
        return;
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers);
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

/// Print the blocks of a tool result in order.
///
/// Images are summarized, not dumped.
pub fn print_envelope(result: &CallToolResult) {
    for block in &result.content {
        match &block.raw {
            RawContent::Text(text) => println!("{}", text.text),
            RawContent::Image(image) => println!(
                "{} {} ({} base64 chars)",
                "[image]".cyan(),
                image.mime_type,
                image.data.len()
            ),
            _ => println!("{}", "[unsupported content block]".dimmed()),
        }
    }
}

pub fn print_resource_contents(contents: &[ResourceContents]) {
    for item in contents {
        match item {
            ResourceContents::TextResourceContents { text, .. } => println!("{}", text),
            ResourceContents::BlobResourceContents { uri, .. } => {
                println!("{} {}", "[blob]".cyan(), uri)
            }
        }
    }
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}

pub fn print_header(title: &str) {
    println!("\n{}\n", title.bold());
}

/// Aligned `key: value` lines.
pub fn print_fields(fields: &[(&str, String)]) {
    let width = fields.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in fields {
        let padded = format!("{:<width$}", key, width = width);
        println!("  {}  {}", padded.dimmed(), value);
    }
}

pub fn print_hint(msg: &str) {
    println!("{}", msg.dimmed());
}

/// Shorten descriptions for table cells.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}
