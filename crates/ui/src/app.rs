use crate::dialog::{DialogAction, WarningDialog};
use crate::input::activity_for;
use casekeep_session::{
    ActivityOutcome, ActivityTracker, LogoutReason, Navigator, SessionCoordinator, SessionSnapshot, WarningListener,
};
use chrono::{DateTime, Local};
use ratatui::crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::Rect;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

/// Notifications delivered to the UI from the session machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Warning(Duration),
    Navigate(String),
}

/// Why the UI loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppExit {
    Quit,
    SignedOut { target: String },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StatusType {
    Info,
    Success,
    Warning,
    Error,
}

/// Navigates by ending the UI loop; the caller decides what "sign-in" means.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    events: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelNavigator {
    #[must_use]
    pub const fn new(events: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { events }
    }
}

impl Navigator for ChannelNavigator {
    fn force_navigate(&self, target: &str) {
        if self.events.send(UiEvent::Navigate(target.to_string())).is_err() {
            debug!("UI already closed; navigation to {} dropped", target);
        }
    }
}

#[must_use]
pub fn warning_listener(events: mpsc::UnboundedSender<UiEvent>) -> WarningListener {
    Arc::new(move |remaining| {
        let _ = events.send(UiEvent::Warning(remaining));
    })
}

pub struct App {
    pub coordinator: SessionCoordinator,
    pub tracker: ActivityTracker,
    pub dialog: WarningDialog,
    pub account: String,
    pub started_at: DateTime<Local>,
    pub status_message: Option<String>,
    pub status_type: StatusType,
    pub area: Rect,
    events: mpsc::UnboundedReceiver<UiEvent>,
    last_tick: Instant,
    exit: Option<AppExit>,
}

impl App {
    pub fn new(
        coordinator: SessionCoordinator,
        tracker: ActivityTracker,
        events: mpsc::UnboundedReceiver<UiEvent>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            coordinator,
            tracker,
            dialog: WarningDialog::new(),
            account: account.into(),
            started_at: Local::now(),
            status_message: None,
            status_type: StatusType::Info,
            area: Rect::default(),
            events,
            last_tick: Instant::now(),
            exit: None,
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>, status_type: StatusType) {
        self.status_message = Some(message.into());
        self.status_type = status_type;
    }

    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.coordinator.snapshot()
    }

    pub fn take_exit(&mut self) -> Option<AppExit> {
        self.exit.take()
    }

    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::Warning(remaining) => {
                self.dialog.show(remaining);
                self.set_status("You will be signed out soon due to inactivity", StatusType::Warning);
            }
            UiEvent::Navigate(target) => {
                self.dialog.hide();
                self.exit = Some(AppExit::SignedOut { target });
            }
        }
    }

    /// Applies every session event already queued.
    pub fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
        }
    }

    /// Waits up to `timeout` for the next session event.
    pub async fn wait_for_event(&mut self, timeout: Duration) {
        if let Ok(Some(event)) = tokio::time::timeout(timeout, self.events.recv()).await {
            self.apply(event);
        }
    }

    pub fn tick_if_due(&mut self, every: Duration) {
        if self.last_tick.elapsed() >= every {
            self.last_tick = Instant::now();
            self.tick();
        }
    }

    /// Re-reads the remaining time for the dialog countdown.
    pub fn tick(&mut self) {
        if !self.dialog.is_open() {
            return;
        }
        if self.coordinator.is_warning_shown() {
            self.dialog.tick(self.coordinator.time_remaining());
        } else if !self.coordinator.is_logging_out() {
            self.dialog.hide();
        }
    }

    pub fn on_terminal_event(&mut self, event: &Event) {
        if let Some(kind) = activity_for(event) {
            if self.tracker.notify(kind) == ActivityOutcome::Reset
                && self.status_type == StatusType::Success
            {
                self.clear_status();
            }
        }

        let action = match event {
            Event::Key(key) if self.dialog.is_open() => self.dialog.handle_key(*key),
            Event::Mouse(mouse) if self.dialog.is_open() => self.dialog.handle_mouse(*mouse, self.area),
            Event::Key(key) => {
                self.handle_key(*key);
                None
            }
            Event::Resize(width, height) => {
                self.area = Rect::new(0, 0, *width, *height);
                None
            }
            _ => None,
        };
        if let Some(action) = action {
            self.perform(action);
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c' | 'C')) {
            self.exit = Some(AppExit::Quit);
            return;
        }
        match key.code {
            KeyCode::Char('q' | 'Q') | KeyCode::Esc => self.exit = Some(AppExit::Quit),
            KeyCode::Char('l' | 'L') => self.perform(DialogAction::LogoutNow),
            KeyCode::Char('r' | 'R') => {
                if self.coordinator.reset_timers() {
                    self.set_status("Inactivity timers restarted", StatusType::Success);
                }
            }
            _ => {}
        }
    }

    pub fn perform(&mut self, action: DialogAction) {
        self.dialog.hide();
        match action {
            DialogAction::Extend => {
                if self.coordinator.extend() {
                    self.set_status("Session extended", StatusType::Success);
                } else {
                    self.set_status("Session could not be extended", StatusType::Error);
                }
            }
            DialogAction::LogoutNow => {
                self.set_status("Signing out...", StatusType::Info);
                self.coordinator.request_logout(LogoutReason::UserRequested);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use casekeep_session::{ManualScheduler, Phase, SessionHooks, TimeoutSettings};
    use ratatui::crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
    use std::sync::Mutex;

    /// Forwards warnings to the UI channel and records logout requests.
    struct UiHooks {
        listener: WarningListener,
        logouts: Mutex<Vec<LogoutReason>>,
    }

    impl SessionHooks for UiHooks {
        fn on_warning(&self, time_remaining: Duration) {
            (self.listener)(time_remaining);
        }

        fn on_logout(&self, reason: LogoutReason) {
            self.logouts.lock().unwrap().push(reason);
        }
    }

    fn app() -> (Arc<ManualScheduler>, Arc<UiHooks>, mpsc::UnboundedSender<UiEvent>, App) {
        let scheduler = Arc::new(ManualScheduler::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let hooks = Arc::new(UiHooks {
            listener: warning_listener(tx.clone()),
            logouts: Mutex::new(Vec::new()),
        });
        let coordinator = SessionCoordinator::new(
            TimeoutSettings::from_millis(60_000, 300_000, 0),
            scheduler.clone(),
            hooks.clone(),
        );
        coordinator.start();
        let tracker = ActivityTracker::new(coordinator.clone());
        let mut app = App::new(coordinator, tracker, rx, "http://127.0.0.1:3000");
        app.area = Rect::new(0, 0, 80, 24);
        (scheduler, hooks, tx, app)
    }

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_warning_event_opens_dialog() {
        let (scheduler, _hooks, _tx, mut app) = app();
        scheduler.advance(Duration::from_secs(60));
        app.drain_events();

        assert!(app.dialog.is_open());
        assert_eq!(app.dialog.time_remaining(), Duration::from_secs(240));
        assert_eq!(app.status_type, StatusType::Warning);
    }

    #[test]
    fn test_tick_rereads_remaining_time() {
        let (scheduler, _hooks, _tx, mut app) = app();
        scheduler.advance(Duration::from_secs(60));
        app.drain_events();

        scheduler.advance(Duration::from_secs(15));
        app.tick();
        assert_eq!(app.dialog.countdown(), "3:45");
    }

    #[test]
    fn test_activity_does_not_dismiss_dialog() {
        let (scheduler, _hooks, _tx, mut app) = app();
        scheduler.advance(Duration::from_secs(60));
        app.drain_events();

        app.on_terminal_event(&press(KeyCode::Char('x')));
        assert!(app.dialog.is_open());
        assert_eq!(app.coordinator.phase(), Phase::Warning);
    }

    #[test]
    fn test_escape_extends_session() {
        let (scheduler, hooks, _tx, mut app) = app();
        scheduler.advance(Duration::from_secs(60));
        app.drain_events();

        app.on_terminal_event(&press(KeyCode::Esc));
        assert!(!app.dialog.is_open());
        assert_eq!(app.coordinator.phase(), Phase::Armed);
        assert_eq!(app.coordinator.time_remaining(), Duration::from_secs(300));
        assert!(app.take_exit().is_none());

        scheduler.advance(Duration::from_secs(250));
        assert!(hooks.logouts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_backdrop_click_extends_session() {
        let (scheduler, _hooks, _tx, mut app) = app();
        scheduler.advance(Duration::from_secs(60));
        app.drain_events();

        app.on_terminal_event(&Event::Mouse(MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        }));
        assert!(!app.dialog.is_open());
        assert!(!app.coordinator.is_warning_shown());
    }

    #[test]
    fn test_logout_now_requests_logout_once() {
        let (scheduler, hooks, _tx, mut app) = app();
        scheduler.advance(Duration::from_secs(60));
        app.drain_events();

        app.on_terminal_event(&press(KeyCode::Char('l')));
        app.on_terminal_event(&press(KeyCode::Char('l')));
        assert_eq!(*hooks.logouts.lock().unwrap(), vec![LogoutReason::UserRequested]);
        assert!(app.coordinator.is_logging_out());
    }

    #[test]
    fn test_navigation_ends_the_app() {
        let (_scheduler, _hooks, tx, mut app) = app();
        ChannelNavigator::new(tx).force_navigate("/signin");
        app.drain_events();
        assert_eq!(
            app.take_exit(),
            Some(AppExit::SignedOut {
                target: "/signin".to_string()
            })
        );
    }

    #[test]
    fn test_quit_key() {
        let (_scheduler, _hooks, _tx, mut app) = app();
        app.on_terminal_event(&press(KeyCode::Char('q')));
        assert_eq!(app.take_exit(), Some(AppExit::Quit));
    }

    #[test]
    fn test_activity_resets_deadline() {
        let (scheduler, _hooks, _tx, mut app) = app();
        scheduler.advance(Duration::from_secs(30));
        app.on_terminal_event(&press(KeyCode::Char('x')));
        assert_eq!(app.coordinator.time_remaining(), Duration::from_secs(300));
    }
}
