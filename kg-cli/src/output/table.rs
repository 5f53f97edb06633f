//! Table output using the `tabled` crate
//!
//! Cells are plain text; color is applied outside the table so that width
//! computations stay exact.

use super::{truncate, OutputConfig};
use tabled::{
    builder::Builder,
    settings::{object::Columns, style::Style, Alignment, Modify, Width},
    Table,
};

pub struct TableOutput;

impl TableOutput {
    /// Rows under a header line. `max_widths` caps individual columns when
    /// truncation is enabled.
    pub fn from_rows(
        headers: &[&str],
        rows: &[Vec<String>],
        max_widths: &[(usize, usize)],
        config: &OutputConfig,
    ) -> String {
        if rows.is_empty() {
            return "(no results)".to_string();
        }

        let mut builder = Builder::default();
        builder.push_record(headers.iter().copied());
        for row in rows {
            let cells = row.iter().enumerate().map(|(i, cell)| {
                match max_widths.iter().find(|(col, _)| *col == i) {
                    Some((_, width)) if config.should_truncate() => truncate(cell, *width),
                    _ => cell.clone(),
                }
            });
            builder.push_record(cells);
        }

        let mut table = builder.build();
        Self::finish(&mut table, config);
        table.to_string()
    }

    /// Two-column label/value table with right-aligned labels.
    pub fn key_value(pairs: &[(&str, String)], config: &OutputConfig) -> String {
        let mut builder = Builder::default();
        for (key, value) in pairs {
            builder.push_record([*key, value.as_str()]);
        }

        let mut table = builder.build();
        table.with(Modify::new(Columns::first()).with(Alignment::right()));
        Self::finish(&mut table, config);
        table.to_string()
    }

    fn finish(table: &mut Table, config: &OutputConfig) {
        if config.compact {
            table.with(Style::blank());
        } else {
            table.with(Style::rounded());
        }
        if config.should_truncate() {
            table.with(Width::wrap(config.effective_width()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;

    fn config() -> OutputConfig {
        OutputConfig::new(OutputFormat::Table).without_colors()
    }

    #[test]
    fn test_rows_with_header() {
        let rows = vec![
            vec!["g1".to_string(), "c1".to_string(), "40%".to_string()],
            vec!["g2".to_string(), "c2".to_string(), "0%".to_string()],
        ];
        let output = TableOutput::from_rows(
            &["Graph", "Cluster", "Progress"],
            &rows,
            &[],
            &config().without_truncation(),
        );

        assert!(output.contains("Graph"));
        assert!(output.contains("Progress"));
        assert!(output.contains("g2"));
        assert!(output.contains("40%"));
    }

    #[test]
    fn test_column_cap_applies_when_truncating() {
        let rows = vec![vec!["a-very-long-graph-identifier".to_string()]];
        let output = TableOutput::from_rows(&["Graph"], &rows, &[(0, 10)], &config().with_width(80));
        assert!(output.contains("a-very-..."));
        assert!(!output.contains("identifier"));
    }

    #[test]
    fn test_empty_rows() {
        let output = TableOutput::from_rows(&["Graph"], &[], &[], &config());
        assert_eq!(output, "(no results)");
    }

    #[test]
    fn test_key_value() {
        let pairs = vec![("Graph", "g1".to_string()), ("Status", "running".to_string())];
        let output = TableOutput::key_value(&pairs, &config().with_width(80));

        assert!(output.contains("Graph"));
        assert!(output.contains("running"));
    }
}
