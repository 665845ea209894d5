use serde_json::Value;

use crate::core::ValueType;
use crate::lhr::{Details, Heading};

const BYTE_UNITS: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Header row of labels followed by one row per item, or `None` when there
/// is nothing to tabulate.
pub fn render_table(details: &Details) -> Option<Vec<Vec<String>>> {
    if details.headings.is_empty() || details.items.is_empty() {
        return None;
    }

    let mut rows = Vec::with_capacity(details.items.len() + 1);
    rows.push(
        details
            .headings
            .iter()
            .map(|h| h.label().to_string())
            .collect(),
    );
    for item in &details.items {
        rows.push(
            details
                .headings
                .iter()
                .map(|h| format_cell(h, item))
                .collect(),
        );
    }
    Some(rows)
}

pub fn format_cell(heading: &Heading, item: &Value) -> String {
    let value = heading
        .key
        .as_deref()
        .and_then(|key| item.get(key))
        .unwrap_or(&Value::Null);
    if value.is_null() {
        return String::new();
    }

    let tag = heading.value_type_tag().unwrap_or("");
    match ValueType::parse(tag) {
        ValueType::Thumbnail => {
            let v = plain_value(value);
            format!("[![]({v})]({v})")
        }
        ValueType::Url => {
            let v = plain_value(value);
            format!("[{v}]({v})")
        }
        ValueType::Bytes => match value.as_f64() {
            Some(bytes) => format_bytes(bytes),
            None => plain_value(value),
        },
        ValueType::TimespanMs => format!("{} ms", plain_value(value)),
        ValueType::Numeric | ValueType::Text | ValueType::Code => plain_value(value),
        ValueType::Other => {
            if !tag.is_empty() {
                tracing::debug!(value_type = tag, "rendering unknown value type as plain text");
            }
            plain_value(value)
        }
    }
}

pub fn plain_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => format_number(f),
            None => n.to_string(),
        },
        Value::Object(map) => {
            for key in ["url", "text"] {
                if let Some(Value::String(s)) = map.get(key) {
                    return s.clone();
                }
            }
            value.to_string()
        }
        Value::Array(_) => value.to_string(),
    }
}

/// Shortest decimal form: `12` for 12.0, `12.5` for 12.5.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    format!("{n}")
}

pub fn format_bytes(bytes: f64) -> String {
    if bytes == 0.0 {
        return "0 Bytes".to_string();
    }

    // Repeated division keeps exact powers of 1024 exact.
    let mut scaled = bytes;
    let mut i = 0;
    while scaled.abs() >= 1024.0 && i < BYTE_UNITS.len() - 1 {
        scaled /= 1024.0;
        i += 1;
    }
    let rounded = (scaled * 100.0).round() / 100.0;
    format!("{} {}", format_number(rounded), BYTE_UNITS[i])
}

/// GitHub-flavoured markdown table, first row as header.
pub fn markdown_table(rows: &[Vec<String>]) -> String {
    let Some((header, body)) = rows.split_first() else {
        return String::new();
    };
    let cols = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);

    let mut out = String::new();
    push_markdown_row(&mut out, header, cols);
    out.push('|');
    for _ in 0..cols {
        out.push_str(" --- |");
    }
    out.push('\n');
    for row in body {
        push_markdown_row(&mut out, row, cols);
    }
    out
}

fn push_markdown_row(out: &mut String, row: &[String], cols: usize) {
    out.push('|');
    for i in 0..cols {
        let cell = row.get(i).map(String::as_str).unwrap_or("");
        out.push(' ');
        out.push_str(&escape_markdown_cell(cell));
        out.push_str(" |");
    }
    out.push('\n');
}

fn escape_markdown_cell(cell: &str) -> String {
    let flat: String = cell
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    flat.replace('|', "\\|")
}
