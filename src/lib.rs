pub mod app;
pub mod cache;
pub mod cmd;
pub mod events;
pub mod llm;
pub mod monitor;
pub mod nudge;
pub mod parsers;
pub mod tmux;
pub mod verdict;

pub use app::Config;
pub use cache::VerdictCache;
pub use monitor::{ScanOutcome, ScanSummary, Scanner};
pub use parsers::ParserRegistry;
pub use tmux::TmuxClient;
pub use verdict::{Action, Verdict};
