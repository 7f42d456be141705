//! Decide what a `POST /analyze` response carries.
//!
//! The decision key is `Content-Type`. When the header is missing or too vague
//! to trust (`text/plain`, `application/octet-stream`) the body is sniffed.

use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

use crate::api::AnalyzeResponse;
use crate::error::{ApiError, ApiResult};

pub const PDF_MIME: &str = "application/pdf";
pub const EXCEL_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const CSV_MIME: &str = "text/csv";

/// Filename override some deployments send instead of `Content-Disposition`.
pub const X_FILENAME: &str = "x-filename";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Excel,
    Csv,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Excel => "excel",
            FileKind::Csv => "csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Excel => "xlsx",
            FileKind::Csv => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FileKind::Pdf => PDF_MIME,
            FileKind::Excel => EXCEL_MIME,
            FileKind::Csv => CSV_MIME,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            FileKind::Pdf => "PDF",
            FileKind::Excel => "Excel",
            FileKind::Csv => "CSV",
        }
    }

    pub fn default_filename(&self) -> String {
        format!("relatorio.{}", self.extension())
    }
}

/// The four shapes an analysis response can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Pdf,
    Excel,
    Csv,
    Json,
}

impl ResponseKind {
    pub fn file_kind(&self) -> Option<FileKind> {
        match self {
            ResponseKind::Pdf => Some(FileKind::Pdf),
            ResponseKind::Excel => Some(FileKind::Excel),
            ResponseKind::Csv => Some(FileKind::Csv),
            ResponseKind::Json => None,
        }
    }
}

/// A downloadable file returned by the analysis API.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePayload {
    pub kind: FileKind,
    pub mime_type: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl FilePayload {
    /// Body as text; only CSV payloads are guaranteed to be valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Classified response of `POST /analyze`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzeResult {
    Json(AnalyzeResponse),
    File(FilePayload),
}

enum HeaderVerdict {
    Known(ResponseKind),
    Ambiguous,
    Unsupported(String),
}

fn verdict_for(content_type: Option<&str>) -> HeaderVerdict {
    let Some(raw) = content_type else {
        return HeaderVerdict::Ambiguous;
    };
    let essence = raw
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "" | "text/plain" | "application/octet-stream" | "binary/octet-stream" => {
            HeaderVerdict::Ambiguous
        }
        "application/pdf" => HeaderVerdict::Known(ResponseKind::Pdf),
        EXCEL_MIME | "application/vnd.ms-excel" => HeaderVerdict::Known(ResponseKind::Excel),
        "text/csv" | "application/csv" | "text/comma-separated-values" => {
            HeaderVerdict::Known(ResponseKind::Csv)
        }
        "application/json" | "text/json" => HeaderVerdict::Known(ResponseKind::Json),
        other if other.ends_with("+json") => HeaderVerdict::Known(ResponseKind::Json),
        _ => HeaderVerdict::Unsupported(raw.trim().to_string()),
    }
}

/// Guess the kind of a body that came without a trustworthy content type.
fn sniff(body: &[u8]) -> Option<ResponseKind> {
    if body.starts_with(b"%PDF-") {
        return Some(ResponseKind::Pdf);
    }
    // xlsx is a zip container
    if body.starts_with(b"PK\x03\x04") {
        return Some(ResponseKind::Excel);
    }

    let text = std::str::from_utf8(body).ok()?;
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return Some(ResponseKind::Json);
    }
    if looks_like_csv(text) {
        return Some(ResponseKind::Csv);
    }
    None
}

/// True when the first two non-empty lines both contain commas, in equal number.
pub fn looks_like_csv(text: &str) -> bool {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let (Some(first), Some(second)) = (lines.next(), lines.next()) else {
        return false;
    };
    let count = |line: &str| line.matches(',').count();
    let first_count = count(first);
    first_count > 0 && first_count == count(second)
}

/// Resolve the kind of a response from its `Content-Type` and body.
pub fn response_kind(content_type: Option<&str>, body: &[u8]) -> ApiResult<ResponseKind> {
    match verdict_for(content_type) {
        HeaderVerdict::Known(kind) => Ok(kind),
        HeaderVerdict::Unsupported(ct) => Err(ApiError::UnsupportedContentType(ct)),
        HeaderVerdict::Ambiguous => sniff(body).ok_or_else(|| {
            ApiError::UnsupportedContentType(content_type.unwrap_or("<none>").to_string())
        }),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl reqwest::header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn extended_filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)filename\*=UTF-8''([^;\n\r]+)").expect("valid regex"))
}

fn plain_filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)filename="?([^";\n\r]+)"?"#).expect("valid regex"))
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw.trim())
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.trim().to_string())
}

/// Extract a filename from `Content-Disposition`, preferring the RFC 5987 form.
pub fn filename_from_disposition(disposition: &str) -> Option<String> {
    extended_filename_re()
        .captures(disposition)
        .or_else(|| plain_filename_re().captures(disposition))
        .and_then(|caps| caps.get(1))
        .map(|m| percent_decode(m.as_str()))
        .filter(|name| !name.is_empty())
}

fn resolve_filename(headers: &HeaderMap, kind: FileKind) -> String {
    header_str(headers, CONTENT_DISPOSITION)
        .and_then(filename_from_disposition)
        .or_else(|| {
            header_str(headers, X_FILENAME)
                .map(percent_decode)
                .filter(|name| !name.is_empty())
        })
        .unwrap_or_else(|| kind.default_filename())
}

/// Turn raw response headers and bytes into an [`AnalyzeResult`].
pub fn classify(headers: &HeaderMap, body: Vec<u8>) -> ApiResult<AnalyzeResult> {
    let content_type = header_str(headers, CONTENT_TYPE);
    let kind = response_kind(content_type, &body)?;
    debug!(?kind, content_type, bytes = body.len(), "classified analyze response");

    let file_kind = match kind.file_kind() {
        Some(file_kind) => file_kind,
        None => {
            let json: AnalyzeResponse = serde_json::from_slice(&body)?;
            return Ok(AnalyzeResult::Json(json));
        }
    };

    if file_kind == FileKind::Csv && std::str::from_utf8(&body).is_err() {
        return Err(ApiError::Parse("CSV body is not valid UTF-8".to_string()));
    }

    let mime_type = match verdict_for(content_type) {
        HeaderVerdict::Known(_) => content_type.unwrap_or(file_kind.mime_type()).to_string(),
        _ => file_kind.mime_type().to_string(),
    };

    Ok(AnalyzeResult::File(FilePayload {
        kind: file_kind,
        mime_type,
        filename: resolve_filename(headers, file_kind),
        bytes: body,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_pdf_by_content_type() {
        let h = headers(&[
            ("content-type", "application/pdf"),
            ("content-disposition", "attachment; filename=\"vendas.pdf\""),
        ]);
        let result = classify(&h, b"%PDF-1.7 ...".to_vec()).unwrap();
        match result {
            AnalyzeResult::File(file) => {
                assert_eq!(file.kind, FileKind::Pdf);
                assert!(file.mime_type.contains("pdf"));
                assert_eq!(file.filename, "vendas.pdf");
            }
            other => panic!("expected file, got {:?}", other),
        }
    }

    #[test]
    fn test_excel_with_extended_filename() {
        let h = headers(&[
            ("content-type", EXCEL_MIME),
            (
                "content-disposition",
                "attachment; filename=\"fallback.xlsx\"; filename*=UTF-8''relat%C3%B3rio%20mensal.xlsx",
            ),
        ]);
        let AnalyzeResult::File(file) = classify(&h, vec![1, 2, 3]).unwrap() else {
            panic!("expected file");
        };
        assert_eq!(file.kind, FileKind::Excel);
        assert_eq!(file.filename, "relatório mensal.xlsx");
    }

    #[test]
    fn test_x_filename_header_used_without_disposition() {
        let h = headers(&[("content-type", "text/csv; charset=utf-8"), ("x-filename", "top_clientes.csv")]);
        let AnalyzeResult::File(file) = classify(&h, b"a,b\n1,2\n".to_vec()).unwrap() else {
            panic!("expected file");
        };
        assert_eq!(file.kind, FileKind::Csv);
        assert_eq!(file.filename, "top_clientes.csv");
        assert_eq!(file.mime_type, "text/csv; charset=utf-8");
    }

    #[test]
    fn test_default_filename_per_kind() {
        let h = headers(&[("content-type", "application/pdf")]);
        let AnalyzeResult::File(file) = classify(&h, vec![0]).unwrap() else {
            panic!("expected file");
        };
        assert_eq!(file.filename, "relatorio.pdf");
    }

    #[test]
    fn test_csv_text_is_preserved_exactly() {
        let payload = "cliente,valor\nJoão,10.5\nMaria,\"1,200\"\n";
        let h = headers(&[("content-type", "text/csv")]);
        let AnalyzeResult::File(file) = classify(&h, payload.as_bytes().to_vec()).unwrap() else {
            panic!("expected file");
        };
        assert_eq!(file.text(), Some(payload));
    }

    #[test]
    fn test_csv_with_invalid_utf8_is_a_parse_error() {
        let h = headers(&[("content-type", "text/csv")]);
        let err = classify(&h, vec![b'a', b',', 0xff, b'\n']).unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[test]
    fn test_json_response() {
        let h = headers(&[("content-type", "application/json")]);
        let body = br#"{"message": "Total: 10", "visualization_type": null}"#.to_vec();
        let AnalyzeResult::Json(json) = classify(&h, body).unwrap() else {
            panic!("expected json");
        };
        assert_eq!(json.message.as_deref(), Some("Total: 10"));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let h = headers(&[("content-type", "application/json")]);
        let err = classify(&h, b"{not json".to_vec()).unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[test]
    fn test_unknown_content_type_is_an_error() {
        let h = headers(&[("content-type", "image/png")]);
        let err = classify(&h, vec![0x89, b'P', b'N', b'G']).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedContentType(ct) if ct == "image/png"));
    }

    #[test]
    fn test_missing_content_type_sniffs_csv() {
        let h = HeaderMap::new();
        let AnalyzeResult::File(file) = classify(&h, b"mes,total\n2025-01,100\n".to_vec()).unwrap() else {
            panic!("expected csv");
        };
        assert_eq!(file.kind, FileKind::Csv);
        assert_eq!(file.mime_type, CSV_MIME);
    }

    #[test]
    fn test_text_plain_sniffs_json() {
        let h = headers(&[("content-type", "text/plain")]);
        let result = classify(&h, br#"{"message": "oi"}"#.to_vec()).unwrap();
        assert!(matches!(result, AnalyzeResult::Json(_)));
    }

    #[test]
    fn test_octet_stream_sniffs_pdf_magic() {
        let h = headers(&[("content-type", "application/octet-stream")]);
        let AnalyzeResult::File(file) = classify(&h, b"%PDF-1.4\n".to_vec()).unwrap() else {
            panic!("expected pdf");
        };
        assert_eq!(file.kind, FileKind::Pdf);
        assert_eq!(file.mime_type, PDF_MIME);
    }

    #[test]
    fn test_ambiguous_plain_prose_is_unsupported() {
        let h = headers(&[("content-type", "text/plain")]);
        let err = classify(&h, b"hello there\nno commas".to_vec()).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedContentType(_)));
    }

    #[test]
    fn test_csv_heuristic() {
        assert!(looks_like_csv("a,b,c\n1,2,3"));
        assert!(looks_like_csv("\n\na,b\n1,2\n"));
        assert!(!looks_like_csv("a,b,c\n1,2"));
        assert!(!looks_like_csv("a,b"));
        assert!(!looks_like_csv("a b\nc d"));
    }
}
