//! Pure adapters from API records to the label/value arrays charts consume.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

use crate::api::{BarPoint, ClientPiePoint, Row, SellerPiePoint};

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez",
];

/// Fallback pie keys used by the analysis service for product rankings.
pub const DEFAULT_PIE_LABEL_KEY: &str = "nomeproduto";
pub const DEFAULT_PIE_VALUE_KEY: &str = "total_vendas";

/// How axis names sent by the server are matched against row keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKeyPolicy {
    /// Match ignoring case, falling back to the literal name.
    #[default]
    CaseInsensitive,
    /// Use the name exactly as sent.
    Exact,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ChartSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.total() / self.values.len() as f64
        }
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
    /// Share of the total, 0-100.
    pub percent: f64,
}

/// `"2025-07"` -> `"Jul/2025"`.
///
/// An out-of-range or unparsable month renders as `undefined`, e.g.
/// `"2025-13"` -> `"undefined/2025"`.
pub fn format_month_label(month_label: &str) -> String {
    let mut parts = month_label.split('-');
    let year = parts.next().unwrap_or_default();
    let month = parts
        .next()
        .and_then(leading_integer)
        .and_then(|m| m.checked_sub(1))
        .and_then(|idx| MONTH_ABBREVIATIONS.get(idx as usize))
        .copied()
        .unwrap_or("undefined");
    format!("{}/{}", month, year)
}

fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

fn float_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?").expect("valid regex")
    })
}

/// Parse the longest numeric prefix of `s`; `"3.14abc"` -> `3.14`.
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    float_prefix_re()
        .find(s.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn truthy_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| *v != 0.0 && !v.is_nan()),
        Value::String(s) if !s.is_empty() => parse_float_prefix(s),
        _ => None,
    }
}

/// Coerce a chart value to a number.
///
/// Accepts a plain number, or an object carrying `parsedValue` or a
/// string-sourced `source`. Every other shape, strings included, is 0.
pub fn normalize_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Object(obj) => {
            if let Some(parsed) = obj.get("parsedValue").and_then(truthy_number) {
                return parsed;
            }
            match obj.get("source") {
                Some(Value::String(s)) if !s.is_empty() => parse_float_prefix(s).unwrap_or(0.0),
                Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
                _ => 0.0,
            }
        }
        _ => 0.0,
    }
}

/// Coerce a table cell to a number the lenient way: numeric strings parse,
/// booleans count as 1/0, objects go through [`normalize_value`].
pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
            }
        }
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Object(_) => normalize_value(value),
        Value::Null | Value::Array(_) => 0.0,
    }
}

/// Render a cell as an axis label.
pub fn value_to_label(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Map an axis name sent by the server onto a key present in `rows`.
pub fn resolve_key(key: Option<&str>, rows: &[Row], policy: AxisKeyPolicy) -> Option<String> {
    let key = key.filter(|k| !k.is_empty())?;
    let first = rows.first()?;

    match policy {
        AxisKeyPolicy::Exact => Some(key.to_string()),
        AxisKeyPolicy::CaseInsensitive => {
            let lower = key.to_lowercase();
            let found = first.keys().find(|k| k.to_lowercase() == lower);
            Some(found.cloned().unwrap_or_else(|| key.to_string()))
        }
    }
}

/// Monthly sales bars.
pub fn bar_series(points: &[BarPoint]) -> ChartSeries {
    ChartSeries {
        labels: points.iter().map(|p| format_month_label(&p.month_label)).collect(),
        values: points.iter().map(|p| normalize_value(&p.total_sales)).collect(),
    }
}

pub fn client_pie_series(clients: &[ClientPiePoint]) -> ChartSeries {
    ChartSeries {
        labels: clients.iter().map(|c| c.client_name.clone()).collect(),
        values: clients.iter().map(ClientPiePoint::value).collect(),
    }
}

pub fn seller_pie_series(sellers: &[SellerPiePoint]) -> ChartSeries {
    ChartSeries {
        labels: sellers.iter().map(|s| s.seller_name.clone()).collect(),
        values: sellers.iter().map(SellerPiePoint::total).collect(),
    }
}

/// Pull a label column and a value column out of free-form rows.
///
/// Missing cells become an empty label or a zero value.
pub fn series_from_rows(rows: &[Row], label_key: &str, value_key: &str) -> ChartSeries {
    ChartSeries {
        labels: rows.iter().map(|r| value_to_label(r.get(label_key))).collect(),
        values: rows
            .iter()
            .map(|r| r.get(value_key).map(coerce_number).unwrap_or(0.0))
            .collect(),
    }
}

pub fn pie_slices(series: &ChartSeries) -> Vec<PieSlice> {
    let total = series.total();
    series
        .iter()
        .map(|(label, value)| PieSlice {
            label: label.to_string(),
            value,
            percent: percent_of(value, total),
        })
        .collect()
}

pub fn percent_of(value: f64, total: f64) -> f64 {
    if total == 0.0 || !total.is_finite() {
        0.0
    } else {
        value / total * 100.0
    }
}

/// One decimal place, as the dashboard legends show it: `33.3%`.
pub fn format_percent(percent: f64) -> String {
    format!("{:.1}%", percent)
}

fn group_thousands(integer: u128) -> String {
    let digits = integer.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

fn format_brl_with(value: f64, decimals: u32) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let scale = 10u128.pow(decimals);
    let scaled = (value.abs() * scale as f64).round() as u128;
    let integer = group_thousands(scaled / scale);
    let sign = if value < 0.0 && scaled != 0 { "-" } else { "" };

    if decimals == 0 {
        format!("{}R$ {}", sign, integer)
    } else {
        format!(
            "{}R$ {},{:0width$}",
            sign,
            integer,
            scaled % scale,
            width = decimals as usize
        )
    }
}

/// Brazilian real with cents: `1234.5` -> `R$ 1.234,50`.
pub fn format_brl(value: f64) -> String {
    format_brl_with(value, 2)
}

/// Brazilian real rounded to whole units: `1234.5` -> `R$ 1.235`.
pub fn format_brl_whole(value: f64) -> String {
    format_brl_with(value, 0)
}

/// Short form for axis ticks: `R$ 1,2 mil`, `R$ 34 mi`.
pub fn format_brl_compact(value: f64) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1e12 {
        (abs / 1e12, " tri")
    } else if abs >= 1e9 {
        (abs / 1e9, " bi")
    } else if abs >= 1e6 {
        (abs / 1e6, " mi")
    } else if abs >= 1e3 {
        (abs / 1e3, " mil")
    } else {
        (abs, "")
    };

    let number = if scaled < 10.0 && !suffix.is_empty() {
        let rounded = (scaled * 10.0).round() / 10.0;
        if rounded.fract() == 0.0 {
            format!("{}", rounded as u64)
        } else {
            format!("{:.1}", rounded).replace('.', ",")
        }
    } else {
        format!("{}", scaled.round() as u64)
    };

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}R$ {}{}", sign, number, suffix)
}
