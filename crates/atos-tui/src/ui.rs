use atos_core::chart::{format_brl, format_brl_compact, format_percent};
use atos_core::dashboard::{ClientCapture, SalesOverview, SellerRanking, LOAD_ERROR_TEXT};
use atos_core::{Message, MessageKind, Sender};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::app::{message_body_lines, App, InputMode, Screen, SUGGESTED_PROMPTS};

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Dashboard => render_dashboard_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Atos AI ", Style::default().fg(Color::Red).bold()),
        Span::styled(app.client.base_url().to_string(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Chat => " CHAT ",
        Screen::Dashboard => " DASHBOARD ",
    };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let mut spans = vec![Span::styled(mode_text, mode_style)];
    let hints: Vec<[Span; 2]> = match (app.screen, app.input_mode) {
        (Screen::Chat, InputMode::Editing) => vec![
            hint(" Enter ", " send "),
            hint(" Esc ", if app.is_loading() { " cancel " } else { " normal " }),
            hint(" Tab ", " dashboard "),
        ],
        (Screen::Chat, InputMode::Normal) => vec![
            hint(" i ", " ask "),
            hint(" r ", " CSV report "),
            hint(" s ", " save file "),
            hint(" c ", " clear "),
            hint(" j/k ", " scroll "),
            hint(" Tab ", " dashboard "),
            hint(" q ", " quit "),
        ],
        (Screen::Dashboard, _) => vec![
            hint(" [/] ", " year "),
            hint(" r ", " refresh "),
            hint(" Tab ", " chat "),
            hint(" q ", " quit "),
        ],
    };
    spans.extend(hints.into_iter().flatten());

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn sender_line(message: &Message) -> Line<'static> {
    let (name, color) = match message.sender {
        Sender::User => ("Você", Color::Cyan),
        Sender::Ai => ("Atos AI", Color::Yellow),
    };
    Line::from(vec![
        Span::styled(name, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(
            format!(" {}", message.timestamp.format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn body_style(message: &Message, index: usize, text_lines: usize) -> Style {
    match message.kind() {
        MessageKind::Chart if index >= text_lines => Style::default().fg(Color::Magenta),
        MessageKind::Report if index == 0 && message.csv_table().is_some() => {
            Style::default().add_modifier(Modifier::BOLD)
        }
        MessageKind::Report => Style::default().fg(Color::Green),
        _ if message.content.starts_with('❌') => Style::default().fg(Color::Red),
        _ => Style::default(),
    }
}

fn welcome_text() -> Text<'static> {
    let mut lines = vec![
        Line::from(Span::styled(
            "Pergunte sobre vendas, clientes e vendedores.",
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(Span::styled("Sugestões:", Style::default().fg(Color::DarkGray).bold())),
    ];
    for (i, prompt) in SUGGESTED_PROMPTS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!(" {} ", i + 1), Style::default().bg(Color::DarkGray).fg(Color::White)),
            Span::raw(format!(" {}", prompt)),
        ]));
    }
    Text::from(lines)
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let status = app
        .status
        .clone()
        .or_else(|| app.session.last_error().map(|e| format!("Último erro: {}", e)));
    let status_height = if status.is_some() { 1 } else { 0 };

    let [chat_area, status_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(status_height),
        Constraint::Length(3),
    ])
    .areas(area);

    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversa ");

    let chat_text = if app.session.messages().is_empty() && !app.is_loading() {
        welcome_text()
    } else {
        let width = app.chat_width as usize;
        let mut lines: Vec<Line> = Vec::new();

        for message in app.session.messages() {
            lines.push(sender_line(message));
            let text_lines = message.content.lines().count();
            for (i, line) in message_body_lines(message, app.axis_key_policy, width)
                .into_iter()
                .enumerate()
            {
                lines.push(Line::styled(line, body_style(message, i, text_lines)));
            }
            lines.push(Line::default());
        }

        if app.is_loading() {
            lines.push(Line::from(Span::styled(
                "Atos AI",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("IA está pensando{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    if let Some(status) = status {
        frame.render_widget(
            Paragraph::new(Span::styled(status, Style::default().fg(Color::Yellow))),
            status_area,
        );
    }

    let editing = app.input_mode == InputMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(" Pergunte ");

    // Horizontal scroll keeps the cursor inside the box
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width > 0 && app.cursor >= inner_width {
        app.cursor - inner_width + 1
    } else {
        0
    };
    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .map(|c| if c == '\n' { '⏎' } else { c })
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, input_area);

    if editing {
        let cursor_x = (app.cursor - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn card(title: String) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(title, Style::default().bold()))
}

fn loading_or_error(frame: &mut Frame, area: Rect, block: Block<'static>, loading: bool, dots: &str) {
    let (text, style) = if loading {
        (format!("Carregando{}", dots), Style::default().fg(Color::DarkGray))
    } else {
        (LOAD_ERROR_TEXT.to_string(), Style::default().fg(Color::Red))
    };
    frame.render_widget(
        Paragraph::new(Span::styled(text, style))
            .alignment(Alignment::Center)
            .block(block),
        area,
    );
}

fn render_dashboard_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [top, bottom] = Layout::vertical([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(area);
    let [sales_area, summary_area] = Layout::horizontal([Constraint::Min(0), Constraint::Length(32)]).areas(top);
    let [clients_area, sellers_area] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(bottom);

    let loading = app.is_dashboard_loading();
    let dots = ".".repeat((app.animation_frame as usize) + 1);
    let year = app.selected_year_label();

    let sales = app.dashboard.as_ref().and_then(|d| d.sales.as_ref().ok());
    let clients = app.dashboard.as_ref().and_then(|d| d.clients.as_ref().ok());
    let sellers = app.dashboard.as_ref().and_then(|d| d.sellers.as_ref().ok());

    match sales {
        Some(sales) => {
            render_sales_chart(frame, sales_area, sales);
            render_summary(frame, summary_area, sales, year.as_deref(), loading, &dots);
        }
        None => {
            loading_or_error(frame, sales_area, card(" Vendas Mensais ".into()), loading || app.dashboard.is_none(), &dots);
            render_year_only(frame, summary_area, year.as_deref(), loading, &dots);
        }
    }

    match clients {
        Some(clients) => render_clients(frame, clients_area, clients),
        None => loading_or_error(
            frame,
            clients_area,
            card(" Captação de Clientes ".into()),
            loading || app.dashboard.is_none(),
            &dots,
        ),
    }

    match sellers {
        Some(sellers) => render_sellers(frame, sellers_area, sellers),
        None => loading_or_error(
            frame,
            sellers_area,
            card(" Vendedores ".into()),
            loading || app.dashboard.is_none(),
            &dots,
        ),
    }
}

fn render_sales_chart(frame: &mut Frame, area: Rect, sales: &SalesOverview) {
    let block = card(format!(" Vendas Mensais · {} ", sales.subtitle));
    if sales.series.is_empty() {
        frame.render_widget(Paragraph::new("(sem dados)").block(block), area);
        return;
    }

    let inner_width = area.width.saturating_sub(2) as usize;
    let count = sales.series.len().max(1);
    let bar_width = ((inner_width / count).saturating_sub(1)).clamp(1, 9) as u16;

    let bars: Vec<Bar> = sales
        .series
        .iter()
        .map(|(label, value)| {
            Bar::default()
                .value(value.max(0.0).round() as u64)
                .text_value(format_brl_compact(value))
                .label(Line::from(label.to_string()))
                .style(Style::default().fg(Color::Red))
                .value_style(Style::default().fg(Color::White).bg(Color::Red))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1);
    frame.render_widget(chart, area);
}

fn year_line(year: Option<&str>, loading: bool, dots: &str) -> Line<'static> {
    let mut spans = vec![
        Span::styled("Ano ", Style::default().fg(Color::DarkGray)),
        Span::styled("◀ ", Style::default().fg(Color::DarkGray)),
        Span::styled(year.unwrap_or("-").to_string(), Style::default().fg(Color::Cyan).bold()),
        Span::styled(" ▶", Style::default().fg(Color::DarkGray)),
    ];
    if loading {
        spans.push(Span::styled(format!("  atualizando{}", dots), Style::default().fg(Color::DarkGray)));
    }
    Line::from(spans)
}

fn render_summary(frame: &mut Frame, area: Rect, sales: &SalesOverview, year: Option<&str>, loading: bool, dots: &str) {
    let lines = vec![
        year_line(year, loading, dots),
        Line::default(),
        Line::from(Span::styled("Total no período", Style::default().fg(Color::DarkGray))),
        Line::from(Span::styled(format_brl(sales.total), Style::default().bold())),
        Line::default(),
        Line::from(Span::styled("Média mensal", Style::default().fg(Color::DarkGray))),
        Line::from(Span::styled(format_brl(sales.average), Style::default().bold())),
        Line::default(),
        Line::from(Span::styled(
            format!("{} × {}", sales.x_label, sales.y_label),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(Paragraph::new(lines).block(card(" Resumo ".into())), area);
}

fn render_year_only(frame: &mut Frame, area: Rect, year: Option<&str>, loading: bool, dots: &str) {
    frame.render_widget(
        Paragraph::new(year_line(year, loading, dots)).block(card(" Resumo ".into())),
        area,
    );
}

fn share_bar(percent: f64, width: usize) -> String {
    let filled = ((percent / 100.0) * width as f64).round().clamp(0.0, width as f64) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn render_clients(frame: &mut Frame, area: Rect, clients: &ClientCapture) {
    let header = Row::new(vec!["Cliente", "Total", "%", "", "Pedidos"])
        .style(Style::default().fg(Color::DarkGray).bold());
    let rows: Vec<Row> = clients
        .clients
        .iter()
        .map(|c| {
            Row::new(vec![
                c.name.clone(),
                format_brl(c.value),
                format_percent(c.percent),
                share_bar(c.percent, 10),
                c.orders.to_string(),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(14),
            Constraint::Length(16),
            Constraint::Length(6),
            Constraint::Length(10),
            Constraint::Length(7),
        ],
    )
    .header(header)
    .block(card(format!(" Captação de Clientes · {} ", format_brl(clients.total))));
    frame.render_widget(table, area);
}

fn render_sellers(frame: &mut Frame, area: Rect, sellers: &SellerRanking) {
    let header = Row::new(vec!["#", "Vendedor", "Vendido", "%"]).style(Style::default().fg(Color::DarkGray).bold());
    let rows: Vec<Row> = sellers
        .sellers
        .iter()
        .enumerate()
        .map(|(i, s)| {
            Row::new(vec![
                format!("{}", i + 1),
                s.name.clone(),
                format_brl(s.total_sold),
                format_percent(s.percent),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(16),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .block(card(" Vendedores ".into()));
    frame.render_widget(table, area);
}
