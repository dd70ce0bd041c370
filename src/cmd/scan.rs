use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::app::Config;
use crate::verdict::Verdict;

/// One-shot scan: classify every pane once and print the results.
pub async fn run_scan(config: &Config, json: bool, include_content: bool) -> Result<()> {
    super::require_tmux()?;
    let (scanner, _cache) = super::build_scanner(config)?;
    let scanner = scanner.with_content(include_content);

    let outcome = scanner.scan(&CancellationToken::new()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.verdicts)?);
        return Ok(());
    }

    for verdict in &outcome.verdicts {
        print_verdict_line(verdict);
    }
    println!(
        "scanned {} panes: {} blocked, {} cache hits, {} errors ({} ms)",
        outcome.summary.scanned,
        outcome.summary.blocked,
        outcome.summary.cache_hits,
        outcome.summary.errors,
        outcome.summary.elapsed_ms,
    );
    Ok(())
}

fn print_verdict_line(verdict: &Verdict) {
    if verdict.blocked {
        let waiting = verdict.waiting_for.lines().next().unwrap_or("");
        let keys = verdict
            .recommended_action()
            .map(|a| a.keys.as_str())
            .unwrap_or("-");
        println!(
            "{}  {}  BLOCKED  {}  [{}]  -> {}",
            verdict.target, verdict.agent, verdict.reason, waiting, keys
        );
    } else {
        println!(
            "{}  {}  ok  {}",
            verdict.target, verdict.agent, verdict.reason
        );
    }
}
