use std::path::PathBuf;

use atos_core::dashboard::Dashboard;
use atos_core::{
    run_turn, ApiResult, AtosClient, AxisKeyPolicy, BlobRegistry, ChatSession, Config,
    PendingTurn, TurnOutcome,
};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::render;

/// Example questions offered while the transcript is empty.
pub const SUGGESTED_PROMPTS: [&str; 4] = [
    "Mostre o faturamento dos últimos 6 meses",
    "Crie um gráfico de vendas por região",
    "Analise a taxa de vendas dos produtos",
    "Me envie as despesas do mês",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    pub client: AtosClient,
    pub axis_key_policy: AxisKeyPolicy,
    pub download_dir: PathBuf,

    // Chat state
    pub session: ChatSession,
    pub input: String,
    pub cursor: usize, // char index into `input`
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub turn_task: Option<(u64, JoinHandle<ApiResult<TurnOutcome>>)>,

    // Dashboard state
    pub dashboard: Option<Dashboard>,
    pub dashboard_task: Option<JoinHandle<Dashboard>>,
    pub selected_year: usize,

    pub status: Option<String>,
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(client: AtosClient, config: &Config) -> Self {
        Self {
            should_quit: false,
            screen: Screen::Chat,
            input_mode: InputMode::Editing,
            client,
            axis_key_policy: config.axis_key_policy,
            download_dir: config.resolved_download_dir(),
            session: ChatSession::new(BlobRegistry::new()),
            input: String::new(),
            cursor: 0,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            turn_task: None,
            dashboard: None,
            dashboard_task: None,
            selected_year: 0,
            status: None,
            animation_frame: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.session.is_awaiting()
    }

    fn spawn_turn(&mut self, pending: PendingTurn) {
        let client = self.client.clone();
        let generation = pending.generation;
        let handle = tokio::spawn(async move { run_turn(&client, &pending).await });
        // A replaced handle belongs to a cancelled turn; it finishes on its own.
        self.turn_task = Some((generation, handle));
        self.status = None;
        self.scroll_chat_to_bottom();
    }

    /// Send the current input as a question. Blank input is ignored.
    pub fn submit_input(&mut self) {
        let input = std::mem::take(&mut self.input);
        self.cursor = 0;
        match self.session.submit(&input) {
            Some(pending) => self.spawn_turn(pending),
            None => self.input = input,
        }
    }

    /// Put a suggested prompt in the input box for the user to edit or send.
    pub fn fill_suggestion(&mut self, index: usize) {
        if let Some(prompt) = SUGGESTED_PROMPTS.get(index) {
            self.input = prompt.to_string();
            self.cursor = self.input.chars().count();
            self.input_mode = InputMode::Editing;
        }
    }

    pub fn request_report(&mut self) {
        match self.session.request_report() {
            Some(pending) => self.spawn_turn(pending),
            None => self.status = Some("Faça uma pergunta antes de gerar o relatório.".to_string()),
        }
    }

    pub fn cancel_turn(&mut self) {
        if self.session.is_awaiting() {
            self.session.cancel();
            self.status = Some("Solicitação cancelada.".to_string());
        }
    }

    pub fn clear_chat(&mut self) {
        self.session.clear();
        self.chat_scroll = 0;
        self.status = None;
    }

    /// Save the newest file report in the transcript to the download directory.
    pub fn save_latest_report(&mut self) {
        let Some(file) = self
            .session
            .messages()
            .iter()
            .rev()
            .find_map(|m| m.report_file())
        else {
            self.status = Some("Nenhum relatório para salvar.".to_string());
            return;
        };

        match self.session.blobs().save(&file.url, &self.download_dir) {
            Ok(path) => self.status = Some(format!("Salvo em {}", path.display())),
            Err(e) => {
                error!(error = %e, "failed to save report");
                self.status = Some(format!("Erro ao salvar: {}", e));
            }
        }
    }

    pub fn refresh_dashboard(&mut self) {
        if let Some(task) = self.dashboard_task.take() {
            task.abort();
        }
        let client = self.client.clone();
        self.dashboard_task = Some(tokio::spawn(async move { Dashboard::load(&client).await }));
    }

    pub fn is_dashboard_loading(&self) -> bool {
        self.dashboard_task.is_some()
    }

    pub fn years(&self) -> Vec<String> {
        self.dashboard
            .as_ref()
            .map(Dashboard::selectable_years)
            .unwrap_or_default()
    }

    pub fn selected_year_label(&self) -> Option<String> {
        self.years().get(self.selected_year).cloned()
    }

    /// Move the year selector by `delta` and reload. The API takes no year,
    /// so every card is fetched again as-is.
    pub fn shift_year(&mut self, delta: isize) {
        let count = self.years().len();
        if count == 0 {
            return;
        }
        let next = (self.selected_year as isize + delta).rem_euclid(count as isize) as usize;
        if next != self.selected_year {
            self.selected_year = next;
            self.refresh_dashboard();
        }
    }

    pub fn toggle_screen(&mut self) {
        self.screen = match self.screen {
            Screen::Chat => Screen::Dashboard,
            Screen::Dashboard => Screen::Chat,
        };
        if self.screen == Screen::Dashboard && self.dashboard.is_none() && self.dashboard_task.is_none() {
            self.refresh_dashboard();
        }
        if self.screen == Screen::Dashboard {
            self.input_mode = InputMode::Normal;
        }
    }

    /// Collect results from background tasks that have finished.
    pub async fn poll_tasks(&mut self) {
        if self.turn_task.as_ref().is_some_and(|(_, h)| h.is_finished()) {
            if let Some((generation, handle)) = self.turn_task.take() {
                match handle.await {
                    Ok(result) => {
                        if self.session.complete(generation, result) {
                            self.scroll_chat_to_bottom();
                        }
                    }
                    Err(e) => {
                        error!(error = %e, generation, "turn task failed");
                        self.session.cancel();
                        self.status = Some("Erro interno ao processar a resposta.".to_string());
                    }
                }
            }
        }

        if self.dashboard_task.as_ref().is_some_and(|h| h.is_finished()) {
            if let Some(handle) = self.dashboard_task.take() {
                match handle.await {
                    Ok(dashboard) => {
                        let years = dashboard.selectable_years().len();
                        if self.selected_year >= years {
                            self.selected_year = 0;
                        }
                        self.dashboard = Some(dashboard);
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => warn!(error = %e, "dashboard task failed"),
                }
            }
        }
    }

    pub fn tick_animation(&mut self) {
        if self.is_loading() || self.is_dashboard_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    /// Scroll the transcript so the newest message (or the thinking
    /// indicator) is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 { self.chat_width as usize } else { 50 };
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };

        let total_lines = wrapped_line_count(&transcript_lines(self, wrap_width), wrap_width);
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    /// Stop in-flight work before the terminal is torn down.
    pub fn shutdown(&mut self) {
        self.session.cancel();
        self.session.blobs().revoke_all();
        if let Some((_, handle)) = self.turn_task.take() {
            handle.abort();
        }
        if let Some(handle) = self.dashboard_task.take() {
            handle.abort();
        }
    }
}

/// Rows the lines occupy once wrapped at `width`, clamped to `u16::MAX`.
pub fn wrapped_line_count(lines: &[String], width: usize) -> u16 {
    let width = width.max(1);
    let total: usize = lines
        .iter()
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .fold(0, usize::saturating_add);
    u16::try_from(total).unwrap_or(u16::MAX)
}

/// Plain text of the transcript as drawn, used for scroll arithmetic.
pub fn transcript_lines(app: &App, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for message in app.session.messages() {
        lines.push(String::new()); // sender line
        lines.extend(message_body_lines(message, app.axis_key_policy, width));
        lines.push(String::new());
    }
    if app.is_loading() {
        lines.push(String::new());
        lines.push(String::new());
    }
    lines
}

/// Body lines of one message: text, then any chart or table.
pub fn message_body_lines(
    message: &atos_core::Message,
    policy: AxisKeyPolicy,
    width: usize,
) -> Vec<String> {
    if let Some(spec) = message.chart() {
        let mut lines: Vec<String> = message.content.lines().map(str::to_string).collect();
        lines.extend(render::chart_lines(spec, policy, width.saturating_sub(2)));
        return lines;
    }

    if let Some(table) = message.csv_table() {
        let mut lines = render::table_lines(&table, 12, 18);
        if let Some(file) = message.report_file() {
            lines.push(format!("{} · {}", file.file_name, file.url));
        }
        return lines;
    }

    let mut lines: Vec<String> = message.content.lines().map(str::to_string).collect();
    if let Some(file) = message.report_file() {
        lines.push(format!("{} · {}", file.file_type.display_name(), file.url));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn app() -> App {
        let client = AtosClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        App::new(client, &Config::new())
    }

    #[tokio::test]
    async fn test_blank_input_keeps_text_and_sends_nothing() {
        let mut app = app();
        app.input = "   ".to_string();
        app.submit_input();
        assert!(app.turn_task.is_none());
        assert_eq!(app.input, "   ");
        assert!(app.session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_submit_spawns_turn_and_cancel_discards_it() {
        let mut app = app();
        app.input = "vendas".to_string();
        app.submit_input();
        assert!(app.is_loading());
        assert!(app.input.is_empty());
        assert_eq!(app.session.messages().len(), 1);

        app.cancel_turn();
        assert!(!app.is_loading());
        assert_eq!(app.status.as_deref(), Some("Solicitação cancelada."));
    }

    #[tokio::test]
    async fn test_report_needs_a_question() {
        let mut app = app();
        app.request_report();
        assert!(app.turn_task.is_none());
        assert!(app.status.is_some());
    }

    #[tokio::test]
    async fn test_suggestion_fills_input_without_sending() {
        let mut app = app();
        app.input_mode = InputMode::Normal;
        app.fill_suggestion(1);
        assert_eq!(app.input, SUGGESTED_PROMPTS[1]);
        assert_eq!(app.cursor, SUGGESTED_PROMPTS[1].chars().count());
        assert_eq!(app.input_mode, InputMode::Editing);
        assert!(app.session.messages().is_empty());
        assert!(!app.is_loading());

        app.fill_suggestion(99);
        assert_eq!(app.input, SUGGESTED_PROMPTS[1]);
    }

    #[test]
    fn test_wrapped_line_count() {
        let lines = vec![String::new(), "a".repeat(10), "b".repeat(11)];
        assert_eq!(wrapped_line_count(&lines, 10), 4);
        assert_eq!(wrapped_line_count(&lines, 0), 22);
    }

    #[tokio::test]
    async fn test_long_transcript_scroll_saturates() {
        let lines = vec!["x".repeat(400); 2_000];
        assert_eq!(wrapped_line_count(&lines, 10), u16::MAX);

        let mut app = app();
        app.chat_width = 1;
        app.chat_height = 10;
        for _ in 0..200 {
            let _ = app.session.submit(&"y".repeat(500));
        }
        app.scroll_chat_to_bottom();
        assert_eq!(app.chat_scroll, u16::MAX - 10);
    }

    #[tokio::test]
    async fn test_save_without_report_sets_status() {
        let mut app = app();
        app.save_latest_report();
        assert_eq!(app.status.as_deref(), Some("Nenhum relatório para salvar."));
    }

    #[tokio::test]
    async fn test_save_latest_report_writes_file() {
        use atos_core::{AnalyzeResult, FileKind, FilePayload};

        let dir = tempfile::tempdir().unwrap();
        let mut app = app();
        app.download_dir = dir.path().to_path_buf();
        app.input = "relatório em pdf".to_string();
        app.submit_input();

        let (generation, _) = app.turn_task.take().unwrap();
        let payload = FilePayload {
            kind: FileKind::Pdf,
            mime_type: "application/pdf".to_string(),
            filename: "vendas.pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        };
        assert!(app
            .session
            .complete(generation, Ok(TurnOutcome::Analysis(AnalyzeResult::File(payload)))));

        app.save_latest_report();
        let saved = dir.path().join("vendas.pdf");
        assert_eq!(std::fs::read(&saved).unwrap(), b"%PDF-1.4");
        assert!(app.status.unwrap().contains("vendas.pdf"));
    }

    #[tokio::test]
    async fn test_shift_year_wraps() {
        let mut app = app();
        app.dashboard = Some(Dashboard::from_responses(
            Err(atos_core::ApiError::Cancelled),
            Err(atos_core::ApiError::Cancelled),
            Ok(vec!["2025".into(), "2024".into()]),
        ));
        app.shift_year(-1);
        assert_eq!(app.selected_year_label().as_deref(), Some("2024"));
        assert!(app.is_dashboard_loading());
        app.shift_year(1);
        assert_eq!(app.selected_year_label().as_deref(), Some("2025"));
        app.shutdown();
    }
}
