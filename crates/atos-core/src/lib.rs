pub mod api;
pub mod blob;
pub mod chart;
pub mod classify;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod message;
pub mod table;
pub mod turn;

// Re-export main types for convenience
pub use api::AtosClient;
pub use blob::{BlobRegistry, ObjectUrl};
pub use chart::{AxisKeyPolicy, ChartSeries, PieSlice};
pub use classify::{classify, AnalyzeResult, FileKind, FilePayload, ResponseKind};
pub use config::Config;
pub use dashboard::Dashboard;
pub use error::{ApiError, ApiResult};
pub use message::{ChartSpec, Message, MessageBody, MessageKind, Report, Sender, VisualizationType};
pub use table::CsvTable;
pub use turn::{run_turn, ChatSession, PendingTurn, TurnOutcome, TurnRequest, TurnState};
