use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::Config;
use crate::events::{EventListener, EventStore};
use crate::monitor::AutoNudge;
use crate::nudge::{KeySender, Nudger};
use crate::tmux::TmuxClient;

/// Continuous supervision loop: scan on the refresh interval, optionally
/// ingest hook events and auto-nudge blocked panes, until ctrl-c.
pub async fn run_watch(config: &Config, with_events: bool, events_only: bool) -> Result<()> {
    if !events_only {
        super::require_tmux()?;
    }
    let (mut scanner, cache) = super::build_scanner(config)?;
    let cancel = CancellationToken::new();

    let mut listener_task = None;
    if with_events || events_only {
        let store = Arc::new(EventStore::new(config.event_ttl()));
        let listener = EventListener::bind(&config.event_socket_path(), Arc::clone(&store))?;
        info!("ingesting events at {}", listener.path().display());
        listener_task = Some(tokio::spawn(listener.run(cancel.clone())));
        scanner = scanner.with_events(store);
    }

    let policy = if config.auto_nudge {
        let sender: Arc<dyn KeySender> = Arc::new(TmuxClient::new());
        let nudger = Arc::new(Nudger::new(sender));
        info!(
            "auto-nudge enabled, ceiling {}",
            config.auto_nudge_max_risk.as_str()
        );
        Some(AutoNudge::new(
            nudger,
            Arc::clone(&cache),
            config.auto_nudge_max_risk,
        ))
    } else {
        None
    };

    loop {
        let outcome = if events_only {
            scanner.scan_events_only()
        } else {
            scanner.scan(&cancel).await
        };

        match outcome {
            Ok(outcome) => {
                for verdict in outcome.verdicts.iter().filter(|v| v.blocked) {
                    info!(
                        target = %verdict.target,
                        agent = %verdict.agent,
                        reason = %verdict.reason,
                        "blocked"
                    );
                }
                info!(
                    scanned = outcome.summary.scanned,
                    blocked = outcome.summary.blocked,
                    cache_hits = outcome.summary.cache_hits,
                    errors = outcome.summary.errors,
                    elapsed_ms = outcome.summary.elapsed_ms,
                    "scan complete"
                );
                if let Some(policy) = &policy {
                    let dispatched = policy.apply(&outcome.verdicts);
                    if dispatched > 0 {
                        info!(dispatched, "auto-nudges dispatched");
                    }
                }
            }
            // Scan-wide failure: log and try again on the next interval.
            Err(e) => warn!("scan failed: {e:#}"),
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                cancel.cancel();
                break;
            }
            _ = tokio::time::sleep(config.refresh_interval()) => {}
        }
    }

    if let Some(task) = listener_task {
        let _ = task.await;
    }
    Ok(())
}
