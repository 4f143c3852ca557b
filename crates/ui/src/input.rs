use casekeep_session::ActivityKind;
use ratatui::crossterm::event::{Event, KeyEventKind, MouseEventKind};

/// Maps a terminal event to the activity it represents, if any.
#[must_use]
pub const fn activity_for(event: &Event) -> Option<ActivityKind> {
    match event {
        Event::Key(key) => match key.kind {
            KeyEventKind::Press => Some(ActivityKind::KeyDown),
            KeyEventKind::Repeat => Some(ActivityKind::KeyPress),
            KeyEventKind::Release => None,
        },
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Down(_) => Some(ActivityKind::PointerDown),
            MouseEventKind::Up(_) => Some(ActivityKind::Click),
            MouseEventKind::Moved | MouseEventKind::Drag(_) => Some(ActivityKind::PointerMove),
            MouseEventKind::ScrollDown
            | MouseEventKind::ScrollUp
            | MouseEventKind::ScrollLeft
            | MouseEventKind::ScrollRight => Some(ActivityKind::Scroll),
        },
        Event::Paste(_) => Some(ActivityKind::KeyPress),
        Event::FocusGained | Event::FocusLost | Event::Resize(..) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventState, KeyModifiers, MouseButton, MouseEvent};

    fn mouse(kind: MouseEventKind) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column: 3,
            row: 4,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn test_key_events() {
        let press = Event::Key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE));
        assert_eq!(activity_for(&press), Some(ActivityKind::KeyDown));

        let repeat = Event::Key(KeyEvent::new_with_kind_and_state(
            KeyCode::Char('a'),
            KeyModifiers::NONE,
            KeyEventKind::Repeat,
            KeyEventState::NONE,
        ));
        assert_eq!(activity_for(&repeat), Some(ActivityKind::KeyPress));

        let release = Event::Key(KeyEvent::new_with_kind(
            KeyCode::Char('a'),
            KeyModifiers::NONE,
            KeyEventKind::Release,
        ));
        assert_eq!(activity_for(&release), None);
    }

    #[test]
    fn test_mouse_events() {
        assert_eq!(
            activity_for(&mouse(MouseEventKind::Down(MouseButton::Left))),
            Some(ActivityKind::PointerDown)
        );
        assert_eq!(
            activity_for(&mouse(MouseEventKind::Up(MouseButton::Left))),
            Some(ActivityKind::Click)
        );
        assert_eq!(activity_for(&mouse(MouseEventKind::Moved)), Some(ActivityKind::PointerMove));
        assert_eq!(activity_for(&mouse(MouseEventKind::ScrollUp)), Some(ActivityKind::Scroll));
    }

    #[test]
    fn test_non_input_events_are_not_activity() {
        assert_eq!(activity_for(&Event::Resize(80, 24)), None);
        assert_eq!(activity_for(&Event::FocusGained), None);
        assert_eq!(activity_for(&Event::Paste("x".to_string())), Some(ActivityKind::KeyPress));
    }
}
