mod client;
mod pane;
mod process;

pub use client::{Multiplexer, TmuxClient};
pub use pane::{parse_target, Pane};
pub use process::{descendant_commands, refresh_process_cache};
