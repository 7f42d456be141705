//! Wire shapes of the analysis API.
//!
//! These are read-only DTOs: the server owns their layout, so most fields are
//! optional and default when missing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chart::coerce_number;

/// One tabular record returned by the analysis endpoints.
pub type Row = Map<String, Value>;

/// `GET /`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RootResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `POST /analyze`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest {
    pub user_question: String,
}

/// JSON flavour of a `POST /analyze` response.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    /// Usually an array of rows, but the server is not strict about it.
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub visualization_type: Option<String>,
    #[serde(default)]
    pub x_axis: Option<String>,
    #[serde(default)]
    pub y_axis: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl AnalyzeResponse {
    /// Rows of `data` when it is an array of objects; non-object items are skipped.
    pub fn rows(&self) -> Option<Vec<Row>> {
        match &self.data {
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(|item| item.as_object().cloned())
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// `GET /report/csv`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CsvReportResponse {
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<Row>>,
}

/// A month of sales in `GET /bar/static`.
///
/// `total_sales` is kept raw: some backends ship it as an object carrying
/// `parsedValue` or `source` instead of a number.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BarPoint {
    pub month_label: String,
    #[serde(default)]
    pub total_sales: Value,
}

/// `GET /bar/static`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BarResponse {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub data: Vec<BarPoint>,
    #[serde(default)]
    pub x_axis: Option<String>,
    #[serde(default)]
    pub y_axis: Option<String>,
}

/// A client in `GET /pie/static`.
///
/// Amounts stay raw: `Decimal` columns arrive as strings (`"300.50"`) and
/// counts may arrive as floats (`3.0`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ClientPiePoint {
    pub client_name: String,
    #[serde(default)]
    pub value_purchased: Value,
    #[serde(default)]
    pub total_orders: Value,
}

impl ClientPiePoint {
    pub fn value(&self) -> f64 {
        coerce_number(&self.value_purchased)
    }

    pub fn orders(&self) -> u64 {
        let orders = coerce_number(&self.total_orders);
        if orders > 0.0 {
            orders.round() as u64
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SellerPiePoint {
    pub seller_name: String,
    #[serde(default)]
    pub total_sold: Value,
}

impl SellerPiePoint {
    pub fn total(&self) -> f64 {
        coerce_number(&self.total_sold)
    }
}

/// Column captions the server suggests for the pie tables.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PieLabels {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub count: Option<String>,
}

/// `GET /pie/static`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PieResponse {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data_clients: Vec<ClientPiePoint>,
    #[serde(default)]
    pub data_sellers: Vec<SellerPiePoint>,
    #[serde(default)]
    pub client_labels: Option<PieLabels>,
    #[serde(default)]
    pub seller_labels: Option<PieLabels>,
}

/// `GET /years`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct YearsResponse {
    #[serde(default)]
    pub data: Vec<String>,
}

/// FastAPI error body: `detail` is either a string or a list of validation errors.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ValidationError {
    #[serde(default)]
    pub loc: Vec<Value>,
    pub msg: String,
}

impl ErrorBody {
    pub fn describe(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<ValidationError>(item.clone()).ok())
                    .map(|err| {
                        let loc: Vec<String> = err
                            .loc
                            .iter()
                            .map(|l| match l {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            })
                            .collect();
                        format!("{}: {}", loc.join("."), err.msg)
                    })
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("; "))
                }
            }
            other => Some(other.to_string()),
        }
    }
}
