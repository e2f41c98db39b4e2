//! Presentation-side plumbing: the UI mailbox, its drain loop, and the
//! terminal presenter.

pub mod pump;
pub mod queue;
pub mod terminal;

pub use pump::{DEFAULT_TICK, Presenter, run_ui_pump};
pub use queue::{ListenState, Role, UiQueue, UiReceiver, UiUpdate, ui_channel};
