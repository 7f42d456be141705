//! Chat turn handling.
//!
//! [`ChatSession`] is the only writer of the transcript. Each request it starts
//! is tagged with a generation number and a cancellation token; starting a new
//! request, cancelling, or dropping the session invalidates the previous one,
//! so a late response can never land in the transcript.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{AtosClient, CsvReportResponse};
use crate::blob::BlobRegistry;
use crate::classify::AnalyzeResult;
use crate::error::{ApiError, ApiResult, ANALYZE_FAILURE_TEXT, REPORT_FAILURE_TEXT};
use crate::message::{Message, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingResponse { generation: u64 },
    /// The last turn failed. Accepts input exactly like `Idle`.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnRequest {
    Analyze(String),
    CsvReport(String),
}

impl TurnRequest {
    pub fn question(&self) -> &str {
        match self {
            TurnRequest::Analyze(q) | TurnRequest::CsvReport(q) => q,
        }
    }
}

/// A request the caller must run (see [`run_turn`]) and feed back through
/// [`ChatSession::complete`].
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub generation: u64,
    pub request: TurnRequest,
    pub token: CancellationToken,
}

#[derive(Debug)]
pub enum TurnOutcome {
    Analysis(AnalyzeResult),
    CsvReport(CsvReportResponse),
}

pub struct ChatSession {
    messages: Vec<Message>,
    state: TurnState,
    generation: u64,
    next_id: u64,
    in_flight: Option<(TurnRequest, CancellationToken)>,
    blobs: BlobRegistry,
    last_error: Option<String>,
}

impl ChatSession {
    pub fn new(blobs: BlobRegistry) -> Self {
        Self {
            messages: Vec::new(),
            state: TurnState::Idle,
            generation: 0,
            next_id: 1,
            in_flight: None,
            blobs,
            last_error: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, TurnState::AwaitingResponse { .. })
    }

    pub fn blobs(&self) -> &BlobRegistry {
        &self.blobs
    }

    /// Detail of the last failure, for logs and status lines.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_user_question(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::User)
            .map(|m| m.content.as_str())
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn start(&mut self, request: TurnRequest) -> PendingTurn {
        self.abort_in_flight();
        self.generation += 1;
        let token = CancellationToken::new();
        self.in_flight = Some((request.clone(), token.clone()));
        self.state = TurnState::AwaitingResponse {
            generation: self.generation,
        };
        debug!(generation = self.generation, ?request, "turn started");

        PendingTurn {
            generation: self.generation,
            request,
            token,
        }
    }

    fn abort_in_flight(&mut self) {
        if let Some((request, token)) = self.in_flight.take() {
            debug!(?request, "cancelling in-flight request");
            token.cancel();
        }
    }

    /// Append the user's question and start an analysis request.
    ///
    /// Blank input is ignored: nothing is appended and no request is started.
    pub fn submit(&mut self, input: &str) -> Option<PendingTurn> {
        if input.trim().is_empty() {
            return None;
        }

        let id = self.next_id();
        self.messages.push(Message::user(id, input));
        Some(self.start(TurnRequest::Analyze(input.to_string())))
    }

    /// Start a CSV report for the most recent user question, if any.
    pub fn request_report(&mut self) -> Option<PendingTurn> {
        let question = self.last_user_question()?.to_string();
        Some(self.start(TurnRequest::CsvReport(question)))
    }

    /// Deliver the result of a request started by this session.
    ///
    /// Returns `false` when the result belongs to a superseded or cancelled
    /// request and was dropped.
    pub fn complete(&mut self, generation: u64, result: ApiResult<TurnOutcome>) -> bool {
        if self.state != (TurnState::AwaitingResponse { generation }) {
            debug!(generation, current = self.generation, "discarding stale response");
            return false;
        }

        let request = self.in_flight.take().map(|(request, _)| request);
        let id = self.next_id();

        match result {
            Ok(TurnOutcome::Analysis(analysis)) => {
                let message = Message::from_analysis(id, analysis, &self.blobs);
                info!(generation, kind = ?message.kind(), "analysis received");
                self.messages.push(message);
                self.state = TurnState::Idle;
                self.last_error = None;
            }
            Ok(TurnOutcome::CsvReport(report)) => {
                self.messages.push(Message::from_csv_report(id, report));
                self.state = TurnState::Idle;
                self.last_error = None;
            }
            Err(ApiError::Cancelled) => {
                self.state = TurnState::Idle;
            }
            Err(err) => {
                warn!(generation, error = %err, "turn failed");
                let text = match request {
                    Some(TurnRequest::CsvReport(_)) => REPORT_FAILURE_TEXT,
                    _ => ANALYZE_FAILURE_TEXT,
                };
                self.messages.push(Message::ai_text(id, text));
                self.last_error = Some(err.to_string());
                self.state = TurnState::Error;
            }
        }
        true
    }

    /// Abandon the in-flight request; its result will be discarded.
    pub fn cancel(&mut self) {
        if self.is_awaiting() {
            self.abort_in_flight();
            self.generation += 1;
            self.state = TurnState::Idle;
        }
    }

    /// Drop the transcript, revoking the object URLs its reports held.
    pub fn clear(&mut self) {
        self.cancel();
        self.messages.clear();
        self.last_error = None;
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}

async fn execute(client: &AtosClient, request: &TurnRequest) -> ApiResult<TurnOutcome> {
    match request {
        TurnRequest::Analyze(question) => client.analyze(question).await.map(TurnOutcome::Analysis),
        TurnRequest::CsvReport(question) => {
            client.csv_report(question).await.map(TurnOutcome::CsvReport)
        }
    }
}

/// Run a pending turn against the API, giving up as soon as it is cancelled.
pub async fn run_turn(client: &AtosClient, pending: &PendingTurn) -> ApiResult<TurnOutcome> {
    let token = pending.token.clone();
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ApiError::Cancelled),
        result = execute(client, &pending.request) => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AnalyzeResponse;
    use crate::classify::{FileKind, FilePayload};
    use crate::message::MessageKind;

    fn text_outcome(text: &str) -> ApiResult<TurnOutcome> {
        Ok(TurnOutcome::Analysis(AnalyzeResult::Json(AnalyzeResponse {
            message: Some(text.to_string()),
            ..Default::default()
        })))
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let mut session = ChatSession::new(BlobRegistry::new());
        assert!(session.submit("").is_none());
        assert!(session.submit("   \n\t").is_none());
        assert!(session.messages().is_empty());
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[test]
    fn test_successful_turn() {
        let mut session = ChatSession::new(BlobRegistry::new());
        let pending = session.submit("Mostre o faturamento").unwrap();
        assert_eq!(pending.request, TurnRequest::Analyze("Mostre o faturamento".into()));
        assert!(session.is_awaiting());
        assert_eq!(session.messages().len(), 1);

        assert!(session.complete(pending.generation, text_outcome("R$ 10")));
        assert_eq!(session.state(), TurnState::Idle);
        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, Sender::Ai);
        assert_eq!(messages[1].content, "R$ 10");
        assert!(messages[0].id < messages[1].id);
    }

    #[test]
    fn test_failure_appends_static_message() {
        let mut session = ChatSession::new(BlobRegistry::new());
        let pending = session.submit("pergunta").unwrap();
        let err = ApiError::Parse("bad".into());
        assert!(session.complete(pending.generation, Err(err)));

        assert_eq!(session.state(), TurnState::Error);
        assert_eq!(session.messages().last().unwrap().content, ANALYZE_FAILURE_TEXT);
        assert!(session.last_error().unwrap().contains("bad"));

        // the error state accepts new input
        assert!(session.submit("outra").is_some());
    }

    #[test]
    fn test_resubmission_discards_stale_response() {
        let mut session = ChatSession::new(BlobRegistry::new());
        let first = session.submit("primeira").unwrap();
        let second = session.submit("segunda").unwrap();
        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());

        assert!(!session.complete(first.generation, text_outcome("old")));
        assert!(session.complete(second.generation, text_outcome("new")));

        let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["primeira", "segunda", "new"]);
    }

    #[test]
    fn test_cancel_discards_late_result() {
        let mut session = ChatSession::new(BlobRegistry::new());
        let pending = session.submit("pergunta").unwrap();
        session.cancel();
        assert!(pending.token.is_cancelled());
        assert_eq!(session.state(), TurnState::Idle);
        assert!(!session.complete(pending.generation, text_outcome("late")));
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn test_drop_cancels_in_flight() {
        let mut session = ChatSession::new(BlobRegistry::new());
        let pending = session.submit("pergunta").unwrap();
        drop(session);
        assert!(pending.token.is_cancelled());
    }

    #[test]
    fn test_report_uses_last_user_question() {
        let mut session = ChatSession::new(BlobRegistry::new());
        assert!(session.request_report().is_none());

        let pending = session.submit("vendas por região").unwrap();
        session.complete(pending.generation, text_outcome("ok"));

        let report = session.request_report().unwrap();
        assert_eq!(report.request, TurnRequest::CsvReport("vendas por região".into()));
        assert!(session.complete(
            report.generation,
            Err(ApiError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                detail: "boom".into()
            })
        ));
        assert_eq!(session.messages().last().unwrap().content, REPORT_FAILURE_TEXT);
    }

    #[test]
    fn test_clear_revokes_object_urls() {
        let blobs = BlobRegistry::new();
        let mut session = ChatSession::new(blobs.clone());
        let pending = session.submit("me envie o pdf").unwrap();
        let file = FilePayload {
            kind: FileKind::Pdf,
            mime_type: "application/pdf".into(),
            filename: "a.pdf".into(),
            bytes: vec![1, 2, 3],
        };
        session.complete(pending.generation, Ok(TurnOutcome::Analysis(AnalyzeResult::File(file))));
        assert_eq!(session.messages().last().unwrap().kind(), MessageKind::Report);
        assert_eq!(blobs.live_count(), 1);

        session.clear();
        assert!(session.messages().is_empty());
        assert_eq!(blobs.live_count(), 0);
    }
}
