//! Plain-text renderings of charts and tables, shared by the TUI transcript
//! and the one-shot commands.

use atos_core::chart::{format_brl, format_brl_whole, format_percent, ChartSeries};
use atos_core::{AxisKeyPolicy, ChartSpec, CsvTable, VisualizationType};

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const PIE_MARKERS: [char; 6] = ['●', '◆', '▲', '■', '★', '✚'];
const MAX_LABEL_WIDTH: usize = 18;

/// Shorten `s` to `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(max - 1).collect();
    out.push('…');
    out
}

fn pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - len))
    }
}

fn label_width(series: &ChartSeries) -> usize {
    series
        .labels
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .min(MAX_LABEL_WIDTH)
}

pub fn bar_lines(series: &ChartSeries, width: usize) -> Vec<String> {
    if series.is_empty() {
        return vec!["(sem dados)".to_string()];
    }

    let lw = label_width(series);
    let values: Vec<String> = series.values.iter().map(|v| format_brl_whole(*v)).collect();
    let vw = values.iter().map(|v| v.chars().count()).max().unwrap_or(0);
    let bar_width = width.saturating_sub(lw + vw + 4).max(1);
    let max = series.max();

    series
        .iter()
        .zip(values.iter())
        .map(|((label, value), shown)| {
            let filled = if max > 0.0 && value > 0.0 {
                ((value / max) * bar_width as f64).round().max(1.0) as usize
            } else {
                0
            };
            format!(
                "{} │{}{} {}",
                pad(&truncate(label, lw), lw),
                "█".repeat(filled),
                " ".repeat(bar_width - filled.min(bar_width)),
                shown
            )
        })
        .collect()
}

pub fn sparkline(values: &[f64]) -> String {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    values
        .iter()
        .map(|v| {
            if span <= 0.0 || !span.is_finite() {
                SPARK_LEVELS[SPARK_LEVELS.len() / 2]
            } else {
                let idx = ((v - min) / span * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
                SPARK_LEVELS[idx.min(SPARK_LEVELS.len() - 1)]
            }
        })
        .collect()
}

pub fn line_lines(series: &ChartSeries) -> Vec<String> {
    if series.is_empty() {
        return vec!["(sem dados)".to_string()];
    }

    let min = series.values.iter().copied().fold(f64::INFINITY, f64::min);
    let first = series.labels.first().map(String::as_str).unwrap_or("");
    let last = series.labels.last().map(String::as_str).unwrap_or("");

    vec![
        sparkline(&series.values),
        format!("{} … {}", first, last),
        format!("mín {} · máx {}", format_brl(min), format_brl(series.max())),
    ]
}

pub fn pie_lines(series: &ChartSeries) -> Vec<String> {
    if series.is_empty() {
        return vec!["(sem dados)".to_string()];
    }

    let lw = label_width(series);
    atos_core::chart::pie_slices(series)
        .iter()
        .enumerate()
        .map(|(i, slice)| {
            format!(
                "{} {} {:>6}  {}",
                PIE_MARKERS[i % PIE_MARKERS.len()],
                pad(&truncate(&slice.label, lw), lw),
                format_percent(slice.percent),
                format_brl(slice.value)
            )
        })
        .collect()
}

pub fn chart_lines(spec: &ChartSpec, policy: AxisKeyPolicy, width: usize) -> Vec<String> {
    let series = spec.series(policy);
    match spec.visualization {
        VisualizationType::Bar => bar_lines(&series, width),
        VisualizationType::Line => line_lines(&series),
        VisualizationType::Pie => pie_lines(&series),
    }
}

pub fn table_lines(table: &CsvTable, max_rows: usize, max_col_width: usize) -> Vec<String> {
    if table.is_empty() {
        return vec!["(relatório vazio)".to_string()];
    }

    let widths: Vec<usize> = table
        .column_widths()
        .into_iter()
        .map(|w| w.min(max_col_width))
        .collect();

    let render_row = |cells: &[String]| -> String {
        widths
            .iter()
            .enumerate()
            .map(|(i, w)| pad(&truncate(cells.get(i).map(String::as_str).unwrap_or(""), *w), *w))
            .collect::<Vec<_>>()
            .join(" │ ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render_row(&table.headers)];
    lines.push(
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("─┼─"),
    );
    lines.extend(table.rows.iter().take(max_rows).map(|r| render_row(r)));
    if table.rows.len() > max_rows {
        lines.push(format!("… +{} linhas", table.rows.len() - max_rows));
    }
    lines
}
