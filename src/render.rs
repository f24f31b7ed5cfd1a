use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use comfy_table::presets::NOTHING;
use comfy_table::{Cell, CellAlignment, Color, Table};

use crate::model::{Measure, RowKind, TableRow};

pub const CSV_HEADERS: [&str; 17] = [
    "namespace",
    "cpu_request",
    "cpu_request_percent",
    "cpu_limit",
    "cpu_limit_percent",
    "cpu_usage",
    "cpu_usage_percent",
    "mem_request",
    "mem_request_percent",
    "mem_limit",
    "mem_limit_percent",
    "mem_usage",
    "mem_usage_percent",
    "storage_request",
    "storage_request_percent",
    "storage_limit",
    "storage_limit_percent",
];

const TABLE_HEADERS: [&str; 17] = [
    "Namespace",
    "CPU Request",
    "%",
    "CPU Limit",
    "%",
    "CPU Usage",
    "%",
    "Mem Request",
    "%",
    "Mem Limit",
    "%",
    "Mem Usage",
    "%",
    "Storage Request",
    "%",
    "Storage Limit",
    "%",
];

const GREEN: (u8, u8, u8) = (34, 197, 94);
const YELLOW: (u8, u8, u8) = (250, 204, 21);
const RED: (u8, u8, u8) = (239, 68, 68);

#[derive(Debug, Clone, Copy)]
enum Dimension {
    Cpu,
    Bytes,
}

const DIMENSIONS: [Dimension; 8] = [
    Dimension::Cpu,
    Dimension::Cpu,
    Dimension::Cpu,
    Dimension::Bytes,
    Dimension::Bytes,
    Dimension::Bytes,
    Dimension::Bytes,
    Dimension::Bytes,
];

/// Aligned text table. Percent cells get a severity color when `color` is
/// set, except on the capacity row.
pub fn render_table(rows: &[TableRow], color: bool, taken_at: DateTime<Local>) -> String {
    let mut table = Table::new();
    table.load_preset(NOTHING).set_header(TABLE_HEADERS.to_vec());
    if color {
        table.enforce_styling();
    } else {
        table.force_no_tty();
    }

    let mut separated = false;
    for row in rows {
        if row.kind.is_summary() && !separated {
            table.add_row(vec![""; TABLE_HEADERS.len()]);
            separated = true;
        }

        let mut cells = Vec::with_capacity(TABLE_HEADERS.len());
        cells.push(Cell::new(&row.namespace));
        for (measure, dimension) in row.measures().into_iter().zip(DIMENSIONS) {
            let amount = match dimension {
                Dimension::Cpu => format_cpu(measure.amount),
                Dimension::Bytes => format_bytes(measure.amount),
            };
            cells.push(Cell::new(amount));
            cells.push(percent_cell(measure, row.kind, color));
        }
        table.add_row(cells);
    }

    for index in 1..TABLE_HEADERS.len() {
        if let Some(column) = table.column_mut(index) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }

    format!(
        "{table}\n\nSnapshot taken {}",
        taken_at.format("%Y-%m-%d %H:%M:%S %Z")
    )
}

/// CSV with a header line and raw amounts (nanocores, bytes).
pub fn render_csv(rows: &[TableRow]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer
        .write_record(CSV_HEADERS)
        .context("failed to write csv header")?;

    for row in rows {
        let mut fields = Vec::with_capacity(CSV_HEADERS.len());
        fields.push(row.namespace.clone());
        for measure in row.measures() {
            fields.push(measure.amount.to_string());
            fields.push(format!("{:.4}", measure.percent));
        }
        writer
            .write_record(&fields)
            .with_context(|| format!("failed to write csv row for {}", row.namespace))?;
    }

    let bytes = writer.into_inner().context("failed to flush csv output")?;
    String::from_utf8(bytes).context("csv output is not valid utf-8")
}

fn percent_cell(measure: Measure, kind: RowKind, color: bool) -> Cell {
    let cell = Cell::new(format!("{:.2}", measure.percent));
    if !color || kind == RowKind::TotalCapacity {
        return cell;
    }
    let (r, g, b) = severity_color(measure.percent);
    cell.fg(Color::Rgb { r, g, b })
}

/// Green at 0%, yellow at 50%, red from 100% up.
fn severity_color(percent: f64) -> (u8, u8, u8) {
    let ratio = if percent.is_finite() {
        (percent / 100.0).clamp(0.0, 1.0)
    } else {
        1.0
    };
    if ratio <= 0.5 {
        blend(GREEN, YELLOW, ratio * 2.0)
    } else {
        blend(YELLOW, RED, (ratio - 0.5) * 2.0)
    }
}

fn blend(from: (u8, u8, u8), to: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    (mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}

fn format_cpu(nanocores: u64) -> String {
    let millicores = nanocores as f64 / 1_000_000.0;
    if millicores >= 1_000.0 {
        format!("{:.2} CPU", millicores / 1_000.0)
    } else {
        format!("{millicores:.2} mCPU")
    }
}

fn format_bytes(value: u64) -> String {
    const UNITS: [(&str, f64); 4] = [
        ("TiB", 1_099_511_627_776.0),
        ("GiB", 1_073_741_824.0),
        ("MiB", 1_048_576.0),
        ("KiB", 1_024.0),
    ];

    let value_f64 = value as f64;
    for (suffix, unit_size) in UNITS {
        if value_f64 >= unit_size {
            return format!("{:.2} {suffix}", value_f64 / unit_size);
        }
    }
    format!("{value} B")
}
