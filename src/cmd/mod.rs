mod events;
mod nudge;
mod scan;
mod watch;

pub use events::run_events;
pub use nudge::run_nudge;
pub use scan::run_scan;
pub use watch::run_watch;

use std::sync::Arc;

use anyhow::Result;

use crate::app::Config;
use crate::cache::VerdictCache;
use crate::monitor::Scanner;
use crate::parsers::ParserRegistry;
use crate::tmux::{Multiplexer, TmuxClient};

/// Builds a scanner wired to the real tmux adapter per the config.
pub(crate) fn build_scanner(config: &Config) -> Result<(Scanner, Arc<VerdictCache>)> {
    let mux: Arc<dyn Multiplexer> =
        Arc::new(TmuxClient::with_capture_lines(config.capture_lines));
    let cache = Arc::new(VerdictCache::new(config.cache_ttl()));
    let self_target = if config.ignore_self {
        mux.current_target()
    } else {
        None
    };

    let scanner = Scanner::new(
        Arc::clone(&mux),
        Arc::new(ParserRegistry::new()),
        Arc::clone(&cache),
    )
    .with_parallel(config.parallel)
    .with_filter(config.filter_regex()?)
    .with_excludes(config.exclude_set()?)
    .with_self_target(self_target);

    Ok((scanner, cache))
}

/// Fails fast when no tmux server is reachable.
pub(crate) fn require_tmux() -> Result<()> {
    if !TmuxClient::new().is_available() {
        anyhow::bail!("no reachable tmux server; is tmux running?");
    }
    Ok(())
}
