//! CSV handling for report messages: parse what the server sends so it can be
//! shown as a table, and serialise JSON rows back into CSV text.

use csv::{ReaderBuilder, WriterBuilder};
use serde_json::Value;
use tracing::warn;

use crate::api::Row;
use crate::chart::value_to_label;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    /// Parse the first record as headers. Ragged rows are kept as they are;
    /// parsing stops at the first malformed record.
    pub fn parse(text: &str) -> Self {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.trim_start_matches('\u{feff}').as_bytes());

        let headers: Vec<String> = match reader.headers() {
            Ok(headers) => headers.iter().map(str::to_string).collect(),
            Err(e) => {
                warn!(error = %e, "unreadable CSV header");
                return Self::default();
            }
        };

        let mut rows = Vec::new();
        for record in reader.records() {
            match record {
                Ok(record) => rows.push(record.iter().map(str::to_string).collect()),
                Err(e) => {
                    warn!(error = %e, rows = rows.len(), "stopping at malformed CSV record");
                    break;
                }
            }
        }

        Self { headers, rows }
    }

    /// Build a table from JSON rows, columns ordered as in the first row.
    pub fn from_rows(rows: &[Row]) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for row in rows {
            for key in row.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let rows = rows
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .map(|h| value_to_label(row.get(h)))
                    .collect()
            })
            .collect();

        Self { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    pub fn to_csv(&self) -> String {
        match self.write_csv() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to serialise CSV table");
                String::new()
            }
        }
    }

    fn write_csv(&self) -> Result<String, csv::Error> {
        let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());
        for record in std::iter::once(&self.headers).chain(self.rows.iter()) {
            if !record.is_empty() {
                writer.write_record(record)?;
            }
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Widest cell per column, in characters.
    pub fn column_widths(&self) -> Vec<usize> {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);

        (0..columns)
            .map(|i| {
                std::iter::once(&self.headers)
                    .chain(self.rows.iter())
                    .filter_map(|r| r.get(i))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }
}

/// Serialise JSON rows as CSV text.
pub fn rows_to_csv(rows: &[Row]) -> String {
    CsvTable::from_rows(rows).to_csv()
}

/// True when a JSON value is a non-empty array of objects.
pub fn is_row_array(value: &Value) -> bool {
    matches!(value, Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_quoted_fields() {
        let table = CsvTable::parse("cliente,valor\r\n\"Silva, João\",\"1\"\"0\"\nMaria,20\n");
        assert_eq!(table.headers, vec!["cliente", "valor"]);
        assert_eq!(table.rows[0], vec!["Silva, João", "1\"0"]);
        assert_eq!(table.rows[1], vec!["Maria", "20"]);
    }

    #[test]
    fn test_parse_skips_blank_lines_and_handles_missing_newline() {
        let table = CsvTable::parse("a,b\n\n1,2");
        assert_eq!(table.rows, vec![vec!["1".to_string(), "2".to_string()]]);
    }

    #[test]
    fn test_parse_keeps_record_of_one_empty_quoted_field() {
        let table = CsvTable::parse("nome\n\"\"\nAna\n");
        assert_eq!(table.headers, vec!["nome"]);
        assert_eq!(table.rows, vec![vec![String::new()], vec!["Ana".to_string()]]);
    }

    #[test]
    fn test_parse_ragged_rows() {
        let table = CsvTable::parse("a,b,c\n1\n2,3,4,5\n");
        assert_eq!(table.rows[0], vec!["1"]);
        assert_eq!(table.rows[1].len(), 4);
        assert_eq!(table.column_widths().len(), 4);
    }

    #[test]
    fn test_parse_empty() {
        assert!(CsvTable::parse("").is_empty());
    }

    #[test]
    fn test_rows_to_csv_escapes() {
        let rows: Vec<Row> = vec![
            json!({"nome": "Ana, Lda", "total": 10}).as_object().unwrap().clone(),
            json!({"nome": "Bia", "total": 2.5, "extra": null}).as_object().unwrap().clone(),
        ];
        let csv = rows_to_csv(&rows);
        let reparsed = CsvTable::parse(&csv);
        assert_eq!(reparsed.headers.len(), 3);
        assert_eq!(reparsed.rows[0][0], "Ana, Lda");
        assert_eq!(reparsed.rows[1][1], "2.5");
        assert_eq!(reparsed.rows[0][2], "");
    }

    #[test]
    fn test_column_widths() {
        let table = CsvTable::parse("a,bb\nccc,d\n");
        assert_eq!(table.column_widths(), vec![3, 2]);
    }

    #[test]
    fn test_is_row_array() {
        assert!(is_row_array(&json!([{"a": 1}])));
        assert!(!is_row_array(&json!([])));
        assert!(!is_row_array(&json!([1])));
    }
}
