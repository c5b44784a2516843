//! Table and status formatting for command output

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use prettytable::{format, Cell, Row, Table};
use serde::Serialize;

/// Format a compact table with headers and rows using prettytable-rs clean format
pub fn format_compact_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);

    table.add_row(Row::new(headers.iter().map(|header| Cell::new(header)).collect()));
    for row in rows {
        table.add_row(Row::new(row.iter().map(|cell| Cell::new(cell)).collect()));
    }

    // 2-space indent under section headings
    let mut result = String::new();
    for line in table.to_string().lines() {
        result.push_str("  ");
        result.push_str(line);
        result.push('\n');
    }
    result
}

/// Pretty-printed JSON for `--json`
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output to JSON")
}

pub fn heading(text: &str) -> ColoredString {
    text.bold()
}

pub fn success(text: &str) -> ColoredString {
    text.green()
}

pub fn warning(text: &str) -> ColoredString {
    text.yellow()
}

pub fn failure(text: &str) -> ColoredString {
    text.red()
}

pub fn muted(text: &str) -> ColoredString {
    text.dimmed()
}

/// Turn colours off for this process
pub fn disable_colours() {
    colored::control::set_override(false);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_is_empty() {
        assert_eq!(format_compact_table(&["ID", "NAME"], &[]), "");
    }

    #[test]
    fn test_table_rows_are_indented() {
        let rows = vec![
            vec!["blog".to_string(), "Blog".to_string()],
            vec!["shop".to_string(), "Shop".to_string()],
        ];
        let output = format_compact_table(&["ID", "NAME"], &rows);

        assert_eq!(output.lines().count(), 3);
        assert!(output.lines().all(|line| line.starts_with("  ")));
        assert!(output.contains("blog"));
        assert!(output.contains("Shop"));
    }

    #[test]
    fn test_to_json() {
        let output = to_json(&vec!["blog", "shop"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[1], "shop");
    }
}
