pub mod app;
pub mod dialog;
pub mod input;
pub mod ui;

pub use app::{App, AppExit, ChannelNavigator, StatusType, UiEvent, warning_listener};
pub use dialog::{DialogAction, WarningDialog, format_countdown};
pub use input::activity_for;
pub use ui::{render, run_app};
