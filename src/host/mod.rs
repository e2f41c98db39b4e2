//! JSON host bridge for native shells and scripted front ends.

pub mod channel;
pub mod contract;
pub mod events;
pub mod handler;
pub mod stdio;

pub use channel::{HostCommandHandler, NoopHostHandler, QuickAction, command_channel};
pub use contract::{CommandEnvelope, CommandName, EventEnvelope, ResponseEnvelope};
pub use events::HostEventPresenter;
pub use handler::AssistantHostHandler;
pub use stdio::{run_bridge, run_stdio_bridge};
