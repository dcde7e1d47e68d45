use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rtde_recipe::{FieldValue, Record};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RecordOutput<'a> {
    schema_id: &'a str,
    recipe_id: u8,
    sequence: u64,
    timestamp: String,
    fields: &'a Record,
}

pub fn print_record(record: &Record, sequence: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = RecordOutput {
                schema_id: "https://schemas.3leaps.dev/rtde/cli/v1/record-received.schema.json",
                recipe_id: record.recipe_id(),
                sequence,
                timestamp: now_unix_seconds(),
                fields: record,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut header = vec!["SEQ".to_string()];
            let mut row = vec![sequence.to_string()];
            for (name, value) in record.iter() {
                header.push(name.to_uppercase());
                row.push(format_value(value));
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header)
                .add_row(row);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{}", pretty_line(record, sequence));
        }
    }
}

/// One-line `name=value` rendering of a record.
pub fn pretty_line(record: &Record, sequence: u64) -> String {
    let fields = record
        .iter()
        .map(|(name, value)| format!("{name}={}", format_value(value)))
        .collect::<Vec<_>>()
        .join(" ");
    format!("seq={sequence} recipe={} {fields}", record.recipe_id())
}

pub fn format_value(value: &FieldValue) -> String {
    match value.as_str() {
        Some(text) => text.to_string(),
        None => serde_json::to_string(value).unwrap_or_else(|_| "?".to_string()),
    }
}

pub fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_render_without_json_quoting_for_text() {
        assert_eq!(format_value(&FieldValue::String("hello".into())), "hello");
        assert_eq!(format_value(&FieldValue::Double(0.5)), "0.5");
        assert_eq!(
            format_value(&FieldValue::Vector3d([1.0, 2.0, 3.0])),
            "[1.0,2.0,3.0]"
        );
        assert_eq!(format_value(&FieldValue::Bool(true)), "true");
    }
}
