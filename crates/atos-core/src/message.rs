//! Chat transcript entries.
//!
//! A message is built once and never mutated; what it carries beyond its text
//! is decided by [`MessageBody`].

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::api::{AnalyzeResponse, CsvReportResponse, Row};
use crate::blob::{BlobRegistry, ObjectUrl};
use crate::chart::{
    pie_slices, resolve_key, series_from_rows, AxisKeyPolicy, ChartSeries, PieSlice,
    DEFAULT_PIE_LABEL_KEY, DEFAULT_PIE_VALUE_KEY,
};
use crate::classify::{AnalyzeResult, FileKind, FilePayload};
use crate::table::{rows_to_csv, CsvTable};

pub const NO_RESPONSE_TEXT: &str = "⚠️ Nenhuma resposta recebida.";
pub const REPORT_GENERATED_TEXT: &str = "📊 Relatório gerado com sucesso! (dados recebidos da API)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationType {
    Line,
    Bar,
    Pie,
}

impl VisualizationType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "line" => Some(VisualizationType::Line),
            "bar" => Some(VisualizationType::Bar),
            "pie" => Some(VisualizationType::Pie),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisualizationType::Line => "line",
            VisualizationType::Bar => "bar",
            VisualizationType::Pie => "pie",
        }
    }
}

/// Data and axis hints for a chart message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub visualization: VisualizationType,
    pub rows: Vec<Row>,
    pub x_axis: Option<String>,
    pub y_axis: Option<String>,
    pub label_key: Option<String>,
    pub value_key: Option<String>,
}

impl ChartSpec {
    /// Keys to read labels and values from, after applying `policy`.
    pub fn keys(&self, policy: AxisKeyPolicy) -> (String, String) {
        let (label, value) = match self.visualization {
            VisualizationType::Pie => (
                self.label_key
                    .as_deref()
                    .or(self.x_axis.as_deref())
                    .unwrap_or(DEFAULT_PIE_LABEL_KEY),
                self.value_key
                    .as_deref()
                    .or(self.y_axis.as_deref())
                    .unwrap_or(DEFAULT_PIE_VALUE_KEY),
            ),
            VisualizationType::Line | VisualizationType::Bar => (
                self.x_axis.as_deref().or(self.label_key.as_deref()).unwrap_or(""),
                self.y_axis.as_deref().or(self.value_key.as_deref()).unwrap_or(""),
            ),
        };

        (
            resolve_key(Some(label), &self.rows, policy).unwrap_or_else(|| label.to_string()),
            resolve_key(Some(value), &self.rows, policy).unwrap_or_else(|| value.to_string()),
        )
    }

    pub fn series(&self, policy: AxisKeyPolicy) -> ChartSeries {
        let (label_key, value_key) = self.keys(policy);
        series_from_rows(&self.rows, &label_key, &value_key)
    }

    pub fn pie_slices(&self, policy: AxisKeyPolicy) -> Vec<PieSlice> {
        pie_slices(&self.series(policy))
    }
}

/// A generated file attached to a report message.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportFile {
    pub url: ObjectUrl,
    pub file_name: String,
    pub file_type: FileKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// PDF, Excel or CSV returned by `/analyze`; CSV text is also in the content.
    File(ReportFile),
    /// Download link returned by `/report/csv`.
    Link(String),
    /// Rows returned by `/report/csv`, rendered as CSV text in the content.
    Inline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Text,
    Report(Report),
    Chart(ChartSpec),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Report,
    Chart,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: u64,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Local>,
    pub body: MessageBody,
}

impl Message {
    fn new(id: u64, content: impl Into<String>, sender: Sender, body: MessageBody) -> Self {
        Self {
            id,
            content: content.into(),
            sender,
            timestamp: Local::now(),
            body,
        }
    }

    pub fn user(id: u64, content: impl Into<String>) -> Self {
        Self::new(id, content, Sender::User, MessageBody::Text)
    }

    pub fn ai_text(id: u64, content: impl Into<String>) -> Self {
        Self::new(id, content, Sender::Ai, MessageBody::Text)
    }

    /// Build the assistant reply for a classified `/analyze` response.
    ///
    /// File payloads are parked in `blobs`; the message holds the URL handle.
    pub fn from_analysis(id: u64, result: AnalyzeResult, blobs: &BlobRegistry) -> Self {
        match result {
            AnalyzeResult::Json(json) => Self::from_json(id, json),
            AnalyzeResult::File(file) => Self::from_file(id, file, blobs),
        }
    }

    fn from_json(id: u64, json: AnalyzeResponse) -> Self {
        let content = json
            .message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| NO_RESPONSE_TEXT.to_string());

        let visualization = json
            .visualization_type
            .as_deref()
            .and_then(VisualizationType::parse);

        match (visualization, json.rows()) {
            (Some(visualization), Some(rows)) => {
                let spec = ChartSpec {
                    visualization,
                    rows,
                    x_axis: json.x_axis,
                    y_axis: json.y_axis,
                    label_key: json.label,
                    value_key: json.value,
                };
                Self::new(id, content, Sender::Ai, MessageBody::Chart(spec))
            }
            _ => Self::new(id, content, Sender::Ai, MessageBody::Text),
        }
    }

    fn from_file(id: u64, file: FilePayload, blobs: &BlobRegistry) -> Self {
        let content = match file.kind {
            FileKind::Csv => file.text().unwrap_or_default().to_string(),
            FileKind::Pdf => format!("📄 Relatório PDF gerado: {}", file.filename),
            FileKind::Excel => format!("📊 Planilha Excel gerada: {}", file.filename),
        };

        let url = blobs.create_object_url(file.bytes, &file.mime_type, &file.filename);
        let report = Report::File(ReportFile {
            url,
            file_name: file.filename,
            file_type: file.kind,
        });

        Self::new(id, content, Sender::Ai, MessageBody::Report(report))
    }

    /// Build the assistant reply for a `/report/csv` response.
    pub fn from_csv_report(id: u64, report: CsvReportResponse) -> Self {
        if let Some(url) = report.file_url.filter(|u| !u.trim().is_empty()) {
            let content = format!("📊 Clique aqui para baixar o relatório CSV: {}", url);
            return Self::new(id, content, Sender::Ai, MessageBody::Report(Report::Link(url)));
        }

        match report.data.filter(|rows| !rows.is_empty()) {
            Some(rows) => Self::new(
                id,
                rows_to_csv(&rows),
                Sender::Ai,
                MessageBody::Report(Report::Inline),
            ),
            None => Self::ai_text(id, REPORT_GENERATED_TEXT),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self.body {
            MessageBody::Text => MessageKind::Text,
            MessageBody::Report(_) => MessageKind::Report,
            MessageBody::Chart(_) => MessageKind::Chart,
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    pub fn chart(&self) -> Option<&ChartSpec> {
        match &self.body {
            MessageBody::Chart(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn report_file(&self) -> Option<&ReportFile> {
        match &self.body {
            MessageBody::Report(Report::File(file)) => Some(file),
            _ => None,
        }
    }

    /// Content parsed as a table, for reports whose content is CSV text.
    pub fn csv_table(&self) -> Option<CsvTable> {
        match &self.body {
            MessageBody::Report(Report::Inline) => Some(CsvTable::parse(&self.content)),
            MessageBody::Report(Report::File(file)) if file.file_type == FileKind::Csv => {
                Some(CsvTable::parse(&self.content))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::format_percent;
    use serde_json::json;

    fn json_result(value: serde_json::Value) -> AnalyzeResult {
        AnalyzeResult::Json(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_plain_json_becomes_text() {
        let blobs = BlobRegistry::new();
        let msg = Message::from_analysis(1, json_result(json!({"message": "Total 10"})), &blobs);
        assert_eq!(msg.kind(), MessageKind::Text);
        assert_eq!(msg.content, "Total 10");
        assert_eq!(msg.sender, Sender::Ai);
    }

    #[test]
    fn test_missing_message_uses_placeholder() {
        let blobs = BlobRegistry::new();
        let msg = Message::from_analysis(1, json_result(json!({})), &blobs);
        assert_eq!(msg.content, NO_RESPONSE_TEXT);
    }

    #[test]
    fn test_chart_requires_data_and_visualization() {
        let blobs = BlobRegistry::new();
        let without_data = Message::from_analysis(
            1,
            json_result(json!({"message": "m", "visualization_type": "bar"})),
            &blobs,
        );
        assert_eq!(without_data.kind(), MessageKind::Text);

        let unknown_type = Message::from_analysis(
            2,
            json_result(json!({"message": "m", "visualization_type": "radar", "data": [{"a": 1}]})),
            &blobs,
        );
        assert_eq!(unknown_type.kind(), MessageKind::Text);

        let chart = Message::from_analysis(
            3,
            json_result(json!({
                "message": "Vendas",
                "visualization_type": "BAR",
                "data": [{"Mes": "Jan", "Total": 5}],
                "x_axis": "mes",
                "y_axis": "total"
            })),
            &blobs,
        );
        let spec = chart.chart().expect("chart message");
        assert_eq!(spec.visualization, VisualizationType::Bar);
        let series = spec.series(AxisKeyPolicy::CaseInsensitive);
        assert_eq!(series.labels, vec!["Jan"]);
        assert_eq!(series.values, vec![5.0]);

        let exact = spec.series(AxisKeyPolicy::Exact);
        assert_eq!(exact.values, vec![0.0]);
    }

    #[test]
    fn test_pie_with_custom_keys() {
        let blobs = BlobRegistry::new();
        let msg = Message::from_analysis(
            1,
            json_result(json!({
                "message": "Participação",
                "visualization_type": "pie",
                "data": [{"name": "A", "val": 10}, {"name": "B", "val": 20}],
                "label": "name",
                "value": "val"
            })),
            &blobs,
        );
        let slices = msg.chart().unwrap().pie_slices(AxisKeyPolicy::CaseInsensitive);
        assert_eq!(slices[0].label, "A");
        assert_eq!(format_percent(slices[0].percent), "33.3%");
        assert_eq!(format_percent(slices[1].percent), "66.7%");
        let sum: f64 = slices.iter().map(|s| s.percent).sum();
        assert!((sum - 100.0).abs() <= 0.1);
    }

    #[test]
    fn test_pie_falls_back_to_default_keys() {
        let spec = ChartSpec {
            visualization: VisualizationType::Pie,
            rows: vec![json!({"nomeproduto": "Café", "total_vendas": "7"}).as_object().unwrap().clone()],
            x_axis: None,
            y_axis: None,
            label_key: None,
            value_key: None,
        };
        let series = spec.series(AxisKeyPolicy::CaseInsensitive);
        assert_eq!(series.labels, vec!["Café"]);
        assert_eq!(series.values, vec![7.0]);
    }

    #[test]
    fn test_pdf_becomes_report_with_object_url() {
        let blobs = BlobRegistry::new();
        let file = FilePayload {
            kind: FileKind::Pdf,
            mime_type: "application/pdf".into(),
            filename: "vendas.pdf".into(),
            bytes: b"%PDF-1.7".to_vec(),
        };
        let msg = Message::from_analysis(7, AnalyzeResult::File(file), &blobs);
        assert_eq!(msg.kind(), MessageKind::Report);
        let report = msg.report_file().unwrap();
        assert_eq!(report.file_type, FileKind::Pdf);
        assert_eq!(report.file_name, "vendas.pdf");
        assert!(!report.url.as_str().is_empty());
        assert_eq!(blobs.live_count(), 1);

        drop(msg);
        assert_eq!(blobs.live_count(), 0);
    }

    #[test]
    fn test_csv_file_keeps_text_in_content() {
        let blobs = BlobRegistry::new();
        let csv = "mes,total\nJan,10\n";
        let file = FilePayload {
            kind: FileKind::Csv,
            mime_type: "text/csv".into(),
            filename: "r.csv".into(),
            bytes: csv.as_bytes().to_vec(),
        };
        let msg = Message::from_analysis(1, AnalyzeResult::File(file), &blobs);
        assert_eq!(msg.content, csv);
        let table = msg.csv_table().unwrap();
        assert_eq!(table.headers, vec!["mes", "total"]);
    }

    #[test]
    fn test_csv_report_variants() {
        let link = Message::from_csv_report(
            1,
            CsvReportResponse {
                file_url: Some("http://x/r.csv".into()),
                data: None,
            },
        );
        assert_eq!(link.body, MessageBody::Report(Report::Link("http://x/r.csv".into())));
        assert!(link.content.contains("http://x/r.csv"));

        let rows = vec![json!({"a": 1}).as_object().unwrap().clone()];
        let inline = Message::from_csv_report(
            2,
            CsvReportResponse {
                file_url: None,
                data: Some(rows),
            },
        );
        assert_eq!(inline.body, MessageBody::Report(Report::Inline));
        assert_eq!(inline.content, "a\n1\n");

        let empty = Message::from_csv_report(3, CsvReportResponse::default());
        assert_eq!(empty.kind(), MessageKind::Text);
        assert_eq!(empty.content, REPORT_GENERATED_TEXT);
    }
}
