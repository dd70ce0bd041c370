//! Auto-nudge policy: a risk ceiling applied on top of the neutral
//! executor. The executor knows nothing about risk; this gate decides which
//! recommended actions are dispatched on the user's behalf.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::VerdictCache;
use crate::nudge::Nudger;
use crate::verdict::{Risk, Verdict, AGENT_ERROR, AGENT_NOT_AN_AGENT, AGENT_UNKNOWN};

/// True iff `risk` is graded (not unspecified) and does not exceed the
/// ceiling.
pub fn risk_within_threshold(risk: Risk, ceiling: Risk) -> bool {
    risk.ord() > 0 && risk.ord() <= ceiling.ord()
}

pub struct AutoNudge {
    nudger: Arc<Nudger>,
    cache: Arc<VerdictCache>,
    max_risk: Risk,
}

impl AutoNudge {
    pub fn new(nudger: Arc<Nudger>, cache: Arc<VerdictCache>, max_risk: Risk) -> Self {
        Self {
            nudger,
            cache,
            max_risk,
        }
    }

    /// Walks a scan's verdicts and dispatches the recommended action for
    /// each blocked agent pane within the risk ceiling. Sends run
    /// asynchronously so a slow pane never stalls the caller; the cache
    /// entry is invalidated after each send so the next scan re-classifies.
    /// Returns how many nudges were dispatched.
    pub fn apply(&self, verdicts: &[Verdict]) -> usize {
        let mut dispatched = 0;
        for verdict in verdicts {
            if !verdict.blocked {
                continue;
            }
            if matches!(
                verdict.agent.as_str(),
                AGENT_ERROR | AGENT_UNKNOWN | AGENT_NOT_AN_AGENT
            ) {
                continue;
            }
            let Some(action) = verdict.recommended_action() else {
                debug!(target = %verdict.target, "blocked but no recommended action");
                continue;
            };
            if !risk_within_threshold(action.risk, self.max_risk) {
                debug!(
                    target = %verdict.target,
                    risk = action.risk.as_str(),
                    "recommended action exceeds risk ceiling"
                );
                continue;
            }

            info!(
                target = %verdict.target,
                keys = %action.keys,
                risk = action.risk.as_str(),
                "auto-nudge"
            );
            let nudger = Arc::clone(&self.nudger);
            let cache = Arc::clone(&self.cache);
            let target = verdict.target.clone();
            let action = action.clone();
            tokio::spawn(async move {
                if let Err(e) = nudger.send_action(&target, &action).await {
                    warn!(target = %target, "auto-nudge failed: {e:#}");
                }
                cache.invalidate(&target);
            });
            dispatched += 1;
        }
        dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nudge::{KeySender, NudgeTiming};
    use crate::tmux::Pane;
    use crate::verdict::{Action, EvalSource, ParseResult};
    use anyhow::Result;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[test]
    fn test_risk_within_threshold_table() {
        use Risk::*;
        // ord(low)=1, ord(medium)=2, ord(high)=3, ord(other)=0
        assert!(risk_within_threshold(Low, Low));
        assert!(risk_within_threshold(Low, High));
        assert!(risk_within_threshold(Medium, Medium));
        assert!(risk_within_threshold(High, High));
        assert!(!risk_within_threshold(Medium, Low));
        assert!(!risk_within_threshold(High, Medium));
        assert!(!risk_within_threshold(Unspecified, High));
        assert!(!risk_within_threshold(Unspecified, Unspecified));
        assert!(!risk_within_threshold(Low, Unspecified));
    }

    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl KeySender for Recorder {
        fn send_keys(&self, target: &str, _literal: bool, keys: &str) -> Result<()> {
            self.sent.lock().push((target.to_string(), keys.to_string()));
            Ok(())
        }
    }

    fn blocked_verdict(target_pane: u32, agent: &str, risk: Risk) -> Verdict {
        let pane = Pane::parse(&format!("dev\t0\t{}\tw\tnode\t42", target_pane)).unwrap();
        let mut result = ParseResult::blocked(agent, "permission dialog", "Bash — $ ls");
        result.actions.push(Action::raw_keys("1", "approve", risk));
        result.actions.push(Action::raw_keys("3", "deny", Risk::Low));
        Verdict::from_parse(&pane, result, EvalSource::Parser, 1)
    }

    #[tokio::test]
    async fn test_apply_dispatches_within_ceiling_and_invalidates() {
        let recorder = Arc::new(Recorder {
            sent: Mutex::new(Vec::new()),
        });
        let nudger = Arc::new(Nudger::with_timing(
            Arc::clone(&recorder) as Arc<dyn KeySender>,
            NudgeTiming::ZERO,
        ));
        let cache = Arc::new(VerdictCache::new(Duration::from_secs(60)));

        let approve_low = blocked_verdict(0, "claude_code", Risk::Low);
        let approve_medium = blocked_verdict(1, "claude_code", Risk::Medium);
        let error = blocked_verdict(2, AGENT_ERROR, Risk::Low);
        let unblocked = {
            let pane = Pane::parse("dev\t0\t3\tw\tnode\t42").unwrap();
            Verdict::from_parse(
                &pane,
                ParseResult::active("claude_code", "active"),
                EvalSource::Parser,
                1,
            )
        };
        cache.store("dev:0.0", "content", &approve_low);

        let policy = AutoNudge::new(nudger, Arc::clone(&cache), Risk::Low);
        let dispatched = policy.apply(&[approve_low, approve_medium, error, unblocked]);
        // Only the low-risk agent verdict passes the gate.
        assert_eq!(dispatched, 1);

        // Let the spawned send complete.
        for _ in 0..50 {
            if !recorder.sent.lock().is_empty() && cache.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let sent = recorder.sent.lock().clone();
        assert_eq!(sent, vec![("dev:0.0".to_string(), "1".to_string())]);
        // Post-nudge invalidation: the entry is gone.
        assert!(cache.lookup("dev:0.0", "content").is_none());
    }

    #[tokio::test]
    async fn test_higher_ceiling_admits_medium() {
        let recorder = Arc::new(Recorder {
            sent: Mutex::new(Vec::new()),
        });
        let nudger = Arc::new(Nudger::with_timing(
            Arc::clone(&recorder) as Arc<dyn KeySender>,
            NudgeTiming::ZERO,
        ));
        let cache = Arc::new(VerdictCache::new(Duration::from_secs(60)));
        let policy = AutoNudge::new(nudger, cache, Risk::Medium);

        let dispatched = policy.apply(&[blocked_verdict(1, "claude_code", Risk::Medium)]);
        assert_eq!(dispatched, 1);
    }
}
