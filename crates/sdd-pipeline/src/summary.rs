use std::fmt;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use crate::pipeline::{RunResult, TableStatus};

/// Overview of a run: header lines plus one table row per specification.
pub struct RunSummary {
    lines: Vec<String>,
    table: Table,
    errors: Vec<String>,
}

impl RunSummary {
    pub fn new(result: &RunResult) -> Self {
        let lines = vec![
            format!("Run started: {}", result.started_at.format("%Y-%m-%d %H:%M:%S UTC")),
            format!("Year: {}", result.year),
            format!("Output: {}", result.output_dir.display()),
            format!("Pupils: {}", result.exclusion),
        ];

        let mut table = Table::new();
        table.set_header(vec![
            header_cell("Table"),
            header_cell("Strategy"),
            header_cell("Rows"),
            header_cell("Status"),
        ]);
        apply_summary_table_style(&mut table);
        align_column(&mut table, 2, CellAlignment::Right);
        align_column(&mut table, 3, CellAlignment::Center);

        let mut total_rows = 0usize;
        let mut errors = Vec::new();
        for outcome in &result.tables {
            let (rows, status) = match &outcome.status {
                TableStatus::Written { rows, .. } => {
                    total_rows += rows;
                    (Cell::new(rows), Cell::new("written").fg(Color::Green))
                }
                TableStatus::Failed { message } => {
                    errors.push(format!("{}: {message}", outcome.name));
                    (dim_cell("-"), Cell::new("failed").fg(Color::Red))
                }
            };
            table.add_row(vec![
                Cell::new(&outcome.name),
                Cell::new(outcome.strategy.display_name()),
                rows,
                status,
            ]);
        }
        table.add_row(vec![
            Cell::new("TOTAL")
                .fg(Color::Cyan)
                .add_attribute(Attribute::Bold),
            dim_cell("-"),
            Cell::new(total_rows).add_attribute(Attribute::Bold),
            Cell::new(format!("{}/{}", result.written(), result.tables.len()))
                .add_attribute(Attribute::Bold),
        ]);
        Self {
            lines,
            table,
            errors,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// `table: message` for every failed specification.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        write!(f, "{}", self.table)
    }
}

pub fn print_summary(result: &RunResult) {
    let summary = RunSummary::new(result);
    println!("{summary}");
    if !summary.errors().is_empty() {
        eprintln!("Errors:");
        for error in summary.errors() {
            eprintln!("- {error}");
        }
    }
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(120);
    table.set_constraints(vec![
        ColumnConstraint::UpperBoundary(Width::Percentage(45)),
        ColumnConstraint::LowerBoundary(Width::Fixed(12)),
        ColumnConstraint::LowerBoundary(Width::Fixed(6)),
        ColumnConstraint::LowerBoundary(Width::Fixed(8)),
    ]);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
