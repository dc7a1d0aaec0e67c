//! Formatter table for the command line. The engine hands over ordered
//! records and an opaque format tag; the tag is looked up here.

use std::fmt::Write;

use spectql::spectql::Record;
use spectql::storage::Value;

pub const DEFAULT_FORMAT: &str = "json";

type Formatter = fn(&[Record]) -> Result<String, Box<dyn std::error::Error>>;

const FORMATTERS: &[(&str, Formatter)] = &[
    ("json", format_json),
    ("csv", format_csv),
    ("table", format_table),
];

pub fn supported() -> Vec<&'static str> {
    FORMATTERS.iter().map(|(name, _)| *name).collect()
}

pub fn render(format: &str, records: &[Record]) -> Result<String, Box<dyn std::error::Error>> {
    let formatter = FORMATTERS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(format))
        .map(|(_, f)| *f)
        .ok_or_else(|| {
            format!(
                "Unsupported output format '{}' (expected one of: {})",
                format,
                supported().join(", ")
            )
        })?;

    formatter(records)
}

fn format_json(records: &[Record]) -> Result<String, Box<dyn std::error::Error>> {
    Ok(serde_json::to_string_pretty(records)?)
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn format_csv(records: &[Record]) -> Result<String, Box<dyn std::error::Error>> {
    let mut out = String::new();
    let Some(first) = records.first() else {
        return Ok(out);
    };

    writeln!(out, "{}", first.names().collect::<Vec<_>>().join(","))?;
    for record in records {
        let values: Vec<String> = record
            .values()
            .map(|v| {
                let s = cell(v);
                if s.contains(',') || s.contains('"') || s.contains('\n') {
                    format!("\"{}\"", s.replace('"', "\"\""))
                } else {
                    s
                }
            })
            .collect();
        writeln!(out, "{}", values.join(","))?;
    }

    Ok(out)
}

fn format_table(records: &[Record]) -> Result<String, Box<dyn std::error::Error>> {
    let mut out = String::new();
    let Some(first) = records.first() else {
        writeln!(out, "(0 rows)")?;
        return Ok(out);
    };

    let names: Vec<&str> = first.names().collect();
    let widths: Vec<usize> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let max_value_width = records
                .iter()
                .filter_map(|r| r.fields().get(i))
                .map(|(_, v)| cell(v).chars().count())
                .max()
                .unwrap_or(0);
            name.chars().count().max(max_value_width)
        })
        .collect();

    let header: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("{:width$}", name, width = widths[i]))
        .collect();
    writeln!(out, "{}", header.join(" | "))?;

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    writeln!(out, "{}", sep.join("-+-"))?;

    for record in records {
        let values: Vec<String> = record
            .values()
            .enumerate()
            .map(|(i, v)| format!("{:width$}", cell(v), width = widths[i]))
            .collect();
        writeln!(out, "{}", values.join(" | "))?;
    }

    writeln!(out, "({} rows)", records.len())?;
    Ok(out)
}
