//! Modal shown once the inactivity warning fires. It can only be left by
//! staying signed in or logging out; Esc and clicks on the backdrop count as
//! staying signed in.

use crate::ui::{c_bg_panel, c_border, c_err, c_ok, c_text, c_text_dim, c_warn, centered_rect};
use ratatui::Frame;
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    Extend,
    LogoutNow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DialogButton {
    #[default]
    StayLoggedIn,
    LogoutNow,
}

struct DialogLayout {
    panel: Rect,
    message: Rect,
    countdown: Rect,
    stay: Rect,
    logout: Rect,
}

#[derive(Debug, Clone, Default)]
pub struct WarningDialog {
    open: bool,
    time_remaining: Duration,
    focus: DialogButton,
}

impl WarningDialog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub const fn time_remaining(&self) -> Duration {
        self.time_remaining
    }

    pub fn show(&mut self, time_remaining: Duration) {
        self.open = true;
        self.time_remaining = time_remaining;
        self.focus = DialogButton::StayLoggedIn;
    }

    pub fn hide(&mut self) {
        self.open = false;
    }

    /// Updates the displayed countdown. Display only; the coordinator owns the deadline.
    pub fn tick(&mut self, time_remaining: Duration) {
        if self.open {
            self.time_remaining = time_remaining;
        }
    }

    #[must_use]
    pub fn countdown(&self) -> String {
        format_countdown(self.time_remaining)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<DialogAction> {
        if !self.open || key.kind == KeyEventKind::Release {
            return None;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('s' | 'S') => Some(DialogAction::Extend),
            KeyCode::Char('l' | 'L') => Some(DialogAction::LogoutNow),
            KeyCode::Enter | KeyCode::Char(' ') => Some(match self.focus {
                DialogButton::StayLoggedIn => DialogAction::Extend,
                DialogButton::LogoutNow => DialogAction::LogoutNow,
            }),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right => {
                self.focus = match self.focus {
                    DialogButton::StayLoggedIn => DialogButton::LogoutNow,
                    DialogButton::LogoutNow => DialogButton::StayLoggedIn,
                };
                None
            }
            _ => None,
        }
    }

    /// `area` is the full frame the dialog is drawn over.
    pub fn handle_mouse(&mut self, mouse: MouseEvent, area: Rect) -> Option<DialogAction> {
        if !self.open || mouse.kind != MouseEventKind::Down(MouseButton::Left) {
            return None;
        }
        let at = Position::new(mouse.column, mouse.row);
        let layout = Self::layout(area);
        if layout.logout.contains(at) {
            Some(DialogAction::LogoutNow)
        } else if layout.stay.contains(at) || !layout.panel.contains(at) {
            Some(DialogAction::Extend)
        } else {
            None
        }
    }

    fn layout(area: Rect) -> DialogLayout {
        let panel = centered_rect(50, 40, area);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Min(2),
                Constraint::Length(2),
                Constraint::Length(1),
            ])
            .split(panel);
        let buttons = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[2]);
        DialogLayout {
            panel,
            message: rows[0],
            countdown: rows[1],
            stay: buttons[0],
            logout: buttons[1],
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        if !self.open {
            return;
        }
        let layout = Self::layout(area);
        f.render_widget(Clear, layout.panel);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(c_warn()))
            .style(Style::default().bg(c_bg_panel()).fg(c_text()))
            .title(Span::styled(
                " Session Expiring ",
                Style::default().fg(c_warn()).add_modifier(Modifier::BOLD),
            ));
        f.render_widget(block, layout.panel);

        let message = Paragraph::new(vec![
            Line::from("You have been inactive for a while."),
            Line::from(Span::styled(
                "For your security you will be signed out automatically.",
                Style::default().fg(c_text_dim()),
            )),
        ])
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
        f.render_widget(message, layout.message);

        let countdown = Paragraph::new(Line::from(vec![
            Span::styled("Signing out in ", Style::default().fg(c_text_dim())),
            Span::styled(self.countdown(), Style::default().fg(c_warn()).add_modifier(Modifier::BOLD)),
        ]))
        .alignment(Alignment::Center);
        f.render_widget(countdown, layout.countdown);

        let button = |label: &'static str, hotkey: &'static str, focused: bool, accent: Color| {
            let style = if focused {
                Style::default().fg(accent).add_modifier(Modifier::BOLD | Modifier::REVERSED)
            } else {
                Style::default().fg(accent)
            };
            Paragraph::new(Line::from(vec![
                Span::styled(format!(" {label} "), style),
                Span::styled(format!(" [{hotkey}]"), Style::default().fg(c_border())),
            ]))
            .alignment(Alignment::Center)
        };
        f.render_widget(
            button("Stay Logged In", "s", self.focus == DialogButton::StayLoggedIn, c_ok()),
            layout.stay,
        );
        f.render_widget(
            button("Logout Now", "l", self.focus == DialogButton::LogoutNow, c_err()),
            layout.logout,
        );
    }
}

/// `M:SS`, rounded down to the whole second.
#[must_use]
pub fn format_countdown(remaining: Duration) -> String {
    let seconds = remaining.as_secs();
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
