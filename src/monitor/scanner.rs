//! Concurrent pane scanner: enumerate, filter, fan out evaluation over a
//! bounded worker pool, join in enumeration order.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::app::ExcludeSet;
use crate::cache::VerdictCache;
use crate::events::{Event, EventStore};
use crate::llm::LlmEvaluator;
use crate::parsers::ParserRegistry;
use crate::tmux::{parse_target, refresh_process_cache, Multiplexer, Pane};
use crate::verdict::{EvalSource, TokenUsage, Verdict};

/// Per-scan totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub scanned: usize,
    pub blocked: usize,
    pub cache_hits: usize,
    pub errors: usize,
    pub tokens: TokenUsage,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub verdicts: Vec<Verdict>,
    pub summary: ScanSummary,
}

pub struct Scanner {
    mux: Arc<dyn Multiplexer>,
    registry: Arc<ParserRegistry>,
    cache: Arc<VerdictCache>,
    events: Option<Arc<EventStore>>,
    llm: Option<Arc<dyn LlmEvaluator>>,
    parallel: usize,
    filter: Option<Regex>,
    exclude: ExcludeSet,
    self_target: Option<String>,
    include_content: bool,
}

impl Scanner {
    pub fn new(
        mux: Arc<dyn Multiplexer>,
        registry: Arc<ParserRegistry>,
        cache: Arc<VerdictCache>,
    ) -> Self {
        Self {
            mux,
            registry,
            cache,
            events: None,
            llm: None,
            parallel: 4,
            filter: None,
            exclude: ExcludeSet::default(),
            self_target: None,
            include_content: false,
        }
    }

    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }

    pub fn with_filter(mut self, filter: Option<Regex>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_excludes(mut self, exclude: ExcludeSet) -> Self {
        self.exclude = exclude;
        self
    }

    /// The supervisor's own pane, dropped from every scan.
    pub fn with_self_target(mut self, target: Option<String>) -> Self {
        self.self_target = target;
        self
    }

    /// Enables the event short-circuit tier.
    pub fn with_events(mut self, store: Arc<EventStore>) -> Self {
        self.events = Some(store);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmEvaluator>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Attach raw captured content to parser/LLM verdicts.
    pub fn with_content(mut self, include: bool) -> Self {
        self.include_content = include;
        self
    }

    fn is_excluded(&self, pane: &Pane) -> bool {
        if let Some(self_target) = &self.self_target {
            if *self_target == pane.target() {
                return true;
            }
        }
        self.exclude.excludes(&pane.session)
    }

    /// One scan tick. Listing failure is fatal; per-pane failures become
    /// error verdicts. Verdicts are ordered by pane enumeration order
    /// regardless of worker completion order.
    pub async fn scan(&self, cancel: &CancellationToken) -> Result<ScanOutcome> {
        let started = Instant::now();
        refresh_process_cache();

        let mut panes = self
            .mux
            .list_panes(self.filter.as_ref())
            .context("pane listing failed")?;
        panes.retain(|p| !self.is_excluded(p));
        debug!(panes = panes.len(), "scan started");

        let permits = self.parallel.clamp(1, panes.len().max(1));
        let semaphore = Arc::new(Semaphore::new(permits));

        let mut handles = Vec::with_capacity(panes.len());
        for pane in panes.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let mux = Arc::clone(&self.mux);
            let registry = Arc::clone(&self.registry);
            let cache = Arc::clone(&self.cache);
            let events = self.events.clone();
            let llm = self.llm.clone();
            let include_content = self.include_content;
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Verdict::evaluation_error(&pane, "scan aborted", 0),
                };
                evaluate_pane(pane, mux, registry, cache, events, llm, include_content, cancel)
                    .await
            }));
        }

        let mut verdicts = Vec::with_capacity(handles.len());
        for (idx, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(verdict) => verdicts.push(verdict),
                Err(e) => {
                    warn!("scan worker for {} failed: {}", panes[idx].target(), e);
                    verdicts.push(Verdict::evaluation_error(
                        &panes[idx],
                        "worker failed",
                        started.elapsed().as_millis() as u64,
                    ));
                }
            }
        }

        let summary = summarize(&verdicts, started.elapsed().as_millis() as u64);
        Ok(ScanOutcome { verdicts, summary })
    }

    /// Event-only scan: verdicts come from the store snapshot; the
    /// multiplexer is never consulted.
    pub fn scan_events_only(&self) -> Result<ScanOutcome> {
        let store = self
            .events
            .as_ref()
            .context("event store not configured for event-only scan")?;
        let started = Instant::now();

        let verdicts: Vec<Verdict> = store
            .snapshot()
            .iter()
            .map(|event| verdict_from_event_target(event))
            .collect();

        let summary = summarize(&verdicts, started.elapsed().as_millis() as u64);
        Ok(ScanOutcome { verdicts, summary })
    }
}

#[allow(clippy::too_many_arguments)]
async fn evaluate_pane(
    pane: Pane,
    mux: Arc<dyn Multiplexer>,
    registry: Arc<ParserRegistry>,
    cache: Arc<VerdictCache>,
    events: Option<Arc<EventStore>>,
    llm: Option<Arc<dyn LlmEvaluator>>,
    include_content: bool,
    cancel: CancellationToken,
) -> Verdict {
    let started = Instant::now();
    let target = pane.target();
    let elapsed = |s: Instant| s.elapsed().as_millis() as u64;

    if cancel.is_cancelled() {
        return Verdict::evaluation_error(&pane, "scan cancelled", elapsed(started));
    }

    let content = match mux.capture_pane(&target) {
        Ok(content) => content,
        Err(e) => return Verdict::evaluation_error(&pane, &format!("{e:#}"), elapsed(started)),
    };
    let headered = pane.with_header(&content);

    // Authoritative short-circuit: the assistant told us its state itself.
    if let Some(store) = &events {
        if let Some(event) = store.latest(&target) {
            return verdict_from_event(&pane, &event, elapsed(started));
        }
    }

    if let Some(mut hit) = cache.lookup(&target, &headered) {
        hit.eval_source = EvalSource::Cache;
        hit.duration_ms = elapsed(started);
        return hit;
    }

    let tree = pane.process_tree();
    if let Some(result) = registry.parse(&content, &tree) {
        let mut verdict = Verdict::from_parse(&pane, result, EvalSource::Parser, elapsed(started));
        if include_content {
            verdict.content = Some(content);
        }
        cache.store(&target, &headered, &verdict);
        return verdict;
    }

    if let Some(llm) = &llm {
        if cancel.is_cancelled() {
            return Verdict::evaluation_error(&pane, "scan cancelled", elapsed(started));
        }
        return match llm.evaluate(&headered) {
            Ok(llm_verdict) => {
                let mut verdict =
                    Verdict::from_parse(&pane, llm_verdict.result, EvalSource::Llm, elapsed(started));
                verdict.tokens = Some(llm_verdict.tokens);
                if include_content {
                    verdict.content = Some(content);
                }
                cache.store(&target, &headered, &verdict);
                verdict
            }
            Err(e) => Verdict::evaluation_error(&pane, &format!("{e:#}"), elapsed(started)),
        };
    }

    Verdict::unknown(&pane, elapsed(started))
}

fn verdict_from_event(pane: &Pane, event: &Event, duration_ms: u64) -> Verdict {
    let blocked = event.state.needs_attention();
    let reason = event
        .message
        .clone()
        .unwrap_or_else(|| format!("hook state: {}", event.state.as_str()));
    Verdict {
        session: pane.session.clone(),
        window: pane.window,
        pane: pane.pane,
        target: pane.target(),
        agent: event.assistant.clone(),
        blocked,
        reason,
        waiting_for: if blocked {
            event
                .message
                .clone()
                .unwrap_or_else(|| event.state.as_str().to_string())
        } else {
            String::new()
        },
        actions: Vec::new(),
        recommended: 0,
        eval_source: EvalSource::Event,
        evaluated_at: Utc::now(),
        duration_ms,
        tokens: None,
        content: None,
    }
}

/// Event-only mode has no pane object; identity comes from the validated
/// target string.
fn verdict_from_event_target(event: &Event) -> Verdict {
    let (session, window, pane_idx) =
        parse_target(&event.target).unwrap_or_else(|| (event.target.clone(), 0, 0));
    let pane = Pane {
        session,
        window,
        window_name: String::new(),
        pane: pane_idx,
        command: String::new(),
        pid: 0,
        child_commands: Vec::new(),
    };
    verdict_from_event(&pane, event, 0)
}

fn summarize(verdicts: &[Verdict], elapsed_ms: u64) -> ScanSummary {
    let mut summary = ScanSummary {
        scanned: verdicts.len(),
        elapsed_ms,
        ..ScanSummary::default()
    };
    for verdict in verdicts {
        if verdict.blocked {
            summary.blocked += 1;
        }
        match verdict.eval_source {
            EvalSource::Cache => summary.cache_hits += 1,
            EvalSource::Error => summary.errors += 1,
            _ => {}
        }
        if let Some(tokens) = verdict.tokens {
            summary.tokens.add(tokens);
        }
    }
    summary
}
