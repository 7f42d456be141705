pub mod client;
pub mod types;

pub use client::AtosClient;
pub use types::{
    AnalyzeRequest, AnalyzeResponse, BarPoint, BarResponse, ClientPiePoint, CsvReportResponse,
    PieLabels, PieResponse, RootResponse, Row, SellerPiePoint, YearsResponse,
};
