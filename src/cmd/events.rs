use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::app::Config;
use crate::events::{Event, EventListener, EventStore};

/// Runs the ingestor standalone and prints accepted events as they arrive.
/// Useful when wiring up assistant hooks.
pub async fn run_events(config: &Config, attention_only: bool) -> Result<()> {
    let store = Arc::new(EventStore::new(config.event_ttl()));
    let listener = EventListener::bind(&config.event_socket_path(), Arc::clone(&store))?;
    println!("listening on {}", listener.path().display());

    let cancel = CancellationToken::new();
    let task = tokio::spawn(listener.run(cancel.clone()));

    let mut seen: HashMap<String, Event> = HashMap::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                let snapshot = if attention_only {
                    store.snapshot_attention()
                } else {
                    store.snapshot()
                };
                for event in snapshot {
                    if seen.get(&event.target) != Some(&event) {
                        print_event(&event);
                        seen.insert(event.target.clone(), event);
                    }
                }
            }
        }
    }

    cancel.cancel();
    let _ = task.await;
    Ok(())
}

fn print_event(event: &Event) {
    println!(
        "{}  {}  {}  {}{}",
        event.ts.format("%H:%M:%S"),
        event.target,
        event.assistant,
        event.state.as_str(),
        event
            .message
            .as_deref()
            .map(|m| format!("  {m}"))
            .unwrap_or_default(),
    );
}
