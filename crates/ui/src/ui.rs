use crate::app::{App, AppExit, StatusType};
use crate::dialog::format_countdown;
use casekeep_session::{Phase, SessionSnapshot};
use color_eyre::Result;
use ratatui::crossterm::event;
use ratatui::layout::Alignment;
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
};
use std::time::Duration;

const INPUT_POLL: Duration = Duration::from_millis(50);
const TICK_RATE: Duration = Duration::from_secs(1);

// --- Palette ---
pub(crate) const fn c_bg() -> Color {
    Color::Rgb(18, 18, 23)
}
pub(crate) const fn c_bg_panel() -> Color {
    Color::Rgb(24, 26, 33)
}
pub(crate) const fn c_border() -> Color {
    Color::Rgb(60, 66, 80)
}
pub(crate) const fn c_accent() -> Color {
    Color::Rgb(80, 200, 255)
} // cyan-ish
pub(crate) const fn c_accent2() -> Color {
    Color::Rgb(148, 92, 255)
} // purple
pub(crate) const fn c_ok() -> Color {
    Color::Rgb(120, 220, 120)
}
pub(crate) const fn c_warn() -> Color {
    Color::Rgb(255, 210, 90)
}
pub(crate) const fn c_err() -> Color {
    Color::Rgb(255, 120, 120)
}
pub(crate) const fn c_text() -> Color {
    Color::Rgb(220, 224, 232)
}
pub(crate) const fn c_text_dim() -> Color {
    Color::Rgb(140, 145, 160)
}

const fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Armed => c_ok(),
        Phase::Warning => c_warn(),
        Phase::LoggingOut => c_err(),
        Phase::Idle | Phase::Disabled => c_text_dim(),
    }
}

/// Runs the session screen until the user quits or the session navigates away.
///
/// Terminal input is polled every 50ms; between polls the loop waits on
/// session events, and the warning countdown is refreshed once a second.
///
/// # Errors
///
/// Returns an error if the terminal cannot be drawn to or read from.
pub async fn run_app(app: &mut App) -> Result<AppExit> {
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    let size = terminal.size()?;
    app.area = Rect::new(0, 0, size.width, size.height);

    loop {
        terminal.draw(|f| draw(f, app))?;
        if let Some(exit) = app.take_exit() {
            return Ok(exit);
        }
        while event::poll(Duration::ZERO)? {
            let event = event::read()?;
            app.on_terminal_event(&event);
        }
        app.wait_for_event(INPUT_POLL).await;
        app.drain_events();
        app.tick_if_due(TICK_RATE);
    }
}

/// Renders the whole screen. Exposed for rendering with other backends.
pub fn render<B: Backend>(terminal: &mut Terminal<B>, app: &App) -> Result<()> {
    terminal.draw(|f| draw(f, app))?;
    Ok(())
}

fn draw(f: &mut Frame, app: &App) {
    let size = f.area();
    let bg_block = Block::default().style(Style::default().bg(c_bg()));
    f.render_widget(bg_block, size);

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(0),    // Body
            Constraint::Length(1), // Status bar
        ])
        .split(size);

    let snapshot = app.snapshot();
    draw_header(f, root[0]);
    draw_body(f, app, &snapshot, root[1]);
    draw_status_bar(f, app, &snapshot, root[2]);
    app.dialog.render(f, size);
}

fn draw_header(f: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(
            "  ◈ casekeep ",
            Style::default().fg(c_accent()).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled("session guard", Style::default().fg(c_text_dim())),
    ]);

    let bar = Block::default()
        .borders(Borders::BOTTOM)
        .border_type(BorderType::Plain)
        .border_style(Style::default().fg(c_border()))
        .style(Style::default().bg(c_bg_panel()));
    f.render_widget(bar, area);

    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    f.render_widget(Paragraph::new(title).style(Style::default().fg(c_text())), inner[0]);

    let version_info = Paragraph::new(Line::from(vec![
        Span::styled("v", Style::default().fg(c_text_dim())),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(c_accent())),
        Span::raw(" "),
    ]))
    .style(Style::default().fg(c_text()))
    .alignment(Alignment::Right);
    f.render_widget(version_info, inner[1]);
}

fn draw_body(f: &mut Frame, app: &App, snapshot: &SessionSnapshot, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .margin(1)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    draw_session_panel(f, app, snapshot, columns[0]);
    draw_help_section(f, columns[1]);
}

fn row(label: &'static str, value: String, value_style: Style) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<16}"), Style::default().fg(c_text_dim())),
        Span::styled(value, value_style),
    ])
}

fn draw_session_panel(f: &mut Frame, app: &App, snapshot: &SessionSnapshot, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(c_border()))
        .style(Style::default().bg(c_bg_panel()).fg(c_text()))
        .title(Span::styled(
            " Session ",
            Style::default().fg(c_accent2()).add_modifier(Modifier::BOLD),
        ));

    let text = Style::default().fg(c_text());
    let settings = snapshot.settings;
    let mut lines = vec![
        row("Server", app.account.clone(), text),
        row(
            "Signed in",
            app.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            text,
        ),
        Line::raw(""),
        row(
            "State",
            snapshot.phase.to_string(),
            Style::default()
                .fg(phase_color(snapshot.phase))
                .add_modifier(Modifier::BOLD),
        ),
    ];

    if snapshot.phase.is_active() {
        lines.push(row(
            "Signs out in",
            format_countdown(snapshot.time_remaining),
            Style::default().fg(if snapshot.warning_shown { c_warn() } else { c_accent() }),
        ));
        if !snapshot.warning_shown {
            let warning_in = settings.warning_time.saturating_sub(snapshot.idle_for);
            lines.push(row("Warning in", format_countdown(warning_in), text));
        }
        lines.push(row("Idle for", format_countdown(snapshot.idle_for), text));
    }

    lines.push(row(
        "Last activity",
        snapshot
            .last_activity
            .map_or_else(|| "none yet".to_string(), |kind| kind.to_string()),
        text,
    ));
    lines.push(Line::raw(""));
    lines.push(row(
        "Warning after",
        format_countdown(settings.warning_time),
        Style::default().fg(c_text_dim()),
    ));
    lines.push(row(
        "Logout after",
        format_countdown(settings.logout_time),
        Style::default().fg(c_text_dim()),
    ));
    let check = if settings.session_check_interval.is_zero() {
        "off".to_string()
    } else {
        format_countdown(settings.session_check_interval)
    };
    lines.push(row("Session check", check, Style::default().fg(c_text_dim())));

    let panel = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}

fn draw_help_section(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(c_border()))
        .style(Style::default().bg(c_bg_panel()).fg(c_text()))
        .title(Span::styled(
            " Keys ",
            Style::default().fg(c_accent2()).add_modifier(Modifier::BOLD),
        ));

    let key = |k: &'static str, action: &'static str| {
        Line::from(vec![
            Span::styled(format!("{k:<8}"), Style::default().fg(c_accent()).add_modifier(Modifier::BOLD)),
            Span::styled(action, Style::default().fg(c_text_dim())),
        ])
    };
    let lines = vec![
        key("r", "restart inactivity timers"),
        key("l", "sign out now"),
        key("q/Esc", "quit (signs out)"),
        Line::raw(""),
        Line::from(Span::styled(
            "Any key, click or scroll counts as activity.",
            Style::default().fg(c_text_dim()),
        )),
    ];
    f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
}

fn draw_status_bar(f: &mut Frame, app: &App, snapshot: &SessionSnapshot, area: Rect) {
    let status_block = Block::default().style(Style::default().bg(c_bg_panel()));
    f.render_widget(status_block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    let (message, message_style) = get_status_message_and_style(app, snapshot);
    let status_paragraph = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(message, message_style),
    ]))
    .style(Style::default().bg(c_bg_panel()));
    f.render_widget(status_paragraph, chunks[0]);

    let hints = if app.dialog.is_open() {
        "[s] stay  [l] logout "
    } else {
        "[r] reset  [l] logout  [q] quit "
    };
    let hints_paragraph = Paragraph::new(hints)
        .style(Style::default().bg(c_bg_panel()).fg(c_text_dim()))
        .alignment(Alignment::Right);
    f.render_widget(hints_paragraph, chunks[1]);
}

fn get_status_message_and_style(app: &App, snapshot: &SessionSnapshot) -> (String, Style) {
    if let Some(message) = &app.status_message {
        let style = match app.status_type {
            StatusType::Success => Style::default().fg(c_ok()).add_modifier(Modifier::BOLD),
            StatusType::Warning => Style::default().fg(c_warn()).add_modifier(Modifier::BOLD),
            StatusType::Error => Style::default().fg(c_err()).add_modifier(Modifier::BOLD),
            StatusType::Info => Style::default().fg(c_accent()),
        };
        return (message.clone(), style);
    }
    let context = match snapshot.phase {
        Phase::Idle => "Inactivity tracking not started",
        Phase::Armed => "Session active",
        Phase::Warning => "Inactivity warning shown",
        Phase::LoggingOut => "Signing out...",
        Phase::Disabled => "Inactivity timeout disabled",
    };
    (context.to_string(), Style::default().fg(c_text_dim()))
}

pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let h = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(v[1]);
    h[1]
}
