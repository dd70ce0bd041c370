//! Shared verdict model: the output of classifying one pane at one instant,
//! plus the parser-local result it is assembled from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tmux::Pane;

/// Agent tag for panes whose capture failed.
pub const AGENT_ERROR: &str = "error";
/// Agent tag for panes no parser (and no fallback) could classify.
pub const AGENT_UNKNOWN: &str = "unknown";
/// Agent tag for panes that are recognizably not running an agent.
pub const AGENT_NOT_AN_AGENT: &str = "not_an_agent";

/// Real-world impact of dispatching an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Risk {
    Low,
    Medium,
    High,
    /// Catch-all for absent or unparseable risk tags. Never auto-nudged.
    #[default]
    Unspecified,
}

impl Serialize for Risk {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Risk {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Risk::parse(&raw))
    }
}

impl Risk {
    /// Ordinal used by the auto-nudge ceiling: low=1, medium=2, high=3,
    /// anything else 0.
    pub fn ord(self) -> u8 {
        match self {
            Risk::Low => 1,
            Risk::Medium => 2,
            Risk::High => 3,
            Risk::Unspecified => 0,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "low" => Risk::Low,
            "medium" => Risk::Medium,
            "high" => Risk::High,
            _ => Risk::Unspecified,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Risk::Low => "low",
            Risk::Medium => "medium",
            Risk::High => "high",
            Risk::Unspecified => "",
        }
    }
}

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalSource {
    Parser,
    Cache,
    Event,
    Llm,
    Error,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One option the user (or the auto-nudge policy) may dispatch to unblock a
/// pane. `keys` is a space-separated sequence of literal characters and tmux
/// key-names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub keys: String,
    pub label: String,
    pub risk: Risk,
    /// True when the target is a raw-mode TUI that consumes each keypress
    /// individually; false means cooked-shell text and the executor appends
    /// Enter itself.
    #[serde(default, skip_serializing_if = "is_false")]
    pub raw: bool,
}

impl Action {
    pub fn raw_keys(keys: &str, label: &str, risk: Risk) -> Self {
        Self {
            keys: keys.to_string(),
            label: label.to_string(),
            risk,
            raw: true,
        }
    }

    pub fn cooked(text: &str, label: &str, risk: Risk) -> Self {
        Self {
            keys: text.to_string(),
            label: label.to_string(),
            risk,
            raw: false,
        }
    }
}

/// Token usage reported by the LLM fallback, aggregated into scan summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.input += other.input;
        self.output += other.output;
    }
}

/// Parser-local analogue of a verdict, without pane identity. A parser
/// returns `None` when the pane is not its agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub agent: String,
    pub blocked: bool,
    pub reason: String,
    pub waiting_for: String,
    pub actions: Vec<Action>,
    pub recommended: usize,
    pub reasoning: String,
}

impl ParseResult {
    /// Not-blocked result with no actions.
    pub fn active(agent: &str, reason: &str) -> Self {
        Self {
            agent: agent.to_string(),
            blocked: false,
            reason: reason.to_string(),
            waiting_for: String::new(),
            actions: Vec::new(),
            recommended: 0,
            reasoning: String::new(),
        }
    }

    /// Blocked result; callers push actions and set `waiting_for`.
    pub fn blocked(agent: &str, reason: &str, waiting_for: &str) -> Self {
        Self {
            agent: agent.to_string(),
            blocked: true,
            reason: reason.to_string(),
            waiting_for: waiting_for.to_string(),
            actions: Vec::new(),
            recommended: 0,
            reasoning: String::new(),
        }
    }
}

/// Classification of a single pane at a single instant. This is the stable
/// wire shape consumed by sinks: `recommended` and `waiting_for` are always
/// present, `actions` is omitted when empty, `raw` is omitted when false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub session: String,
    pub window: u32,
    pub pane: u32,
    pub target: String,
    pub agent: String,
    pub blocked: bool,
    pub reason: String,
    pub waiting_for: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    pub recommended: usize,
    pub eval_source: EvalSource,
    pub evaluated_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Verdict {
    /// Assembles a verdict from a parser (or LLM) result, enforcing the model
    /// invariants: non-blocked verdicts carry no actions and recommended 0;
    /// blocked verdicts keep recommended within bounds.
    pub fn from_parse(
        pane: &Pane,
        result: ParseResult,
        source: EvalSource,
        duration_ms: u64,
    ) -> Self {
        let (actions, recommended) = if result.blocked {
            let rec = if result.actions.is_empty() {
                0
            } else {
                result.recommended.min(result.actions.len() - 1)
            };
            (result.actions, rec)
        } else {
            (Vec::new(), 0)
        };

        Self {
            session: pane.session.clone(),
            window: pane.window,
            pane: pane.pane,
            target: pane.target(),
            agent: result.agent,
            blocked: result.blocked,
            reason: result.reason,
            waiting_for: if result.blocked {
                result.waiting_for
            } else {
                String::new()
            },
            actions,
            recommended,
            eval_source: source,
            evaluated_at: Utc::now(),
            duration_ms,
            tokens: None,
            content: None,
        }
    }

    /// Error verdict for a pane whose evaluation failed.
    pub fn evaluation_error(pane: &Pane, detail: &str, duration_ms: u64) -> Self {
        Self::from_parse(
            pane,
            ParseResult::active(AGENT_ERROR, &format!("evaluation failed: {}", detail)),
            EvalSource::Error,
            duration_ms,
        )
    }

    /// Verdict for a pane no tier could classify.
    pub fn unknown(pane: &Pane, duration_ms: u64) -> Self {
        Self::from_parse(
            pane,
            ParseResult::active(AGENT_UNKNOWN, "no parser matched"),
            EvalSource::Parser,
            duration_ms,
        )
    }

    /// The action the auto-nudge policy would dispatch, if any.
    pub fn recommended_action(&self) -> Option<&Action> {
        if !self.blocked {
            return None;
        }
        self.actions.get(self.recommended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmux::Pane;

    fn test_pane() -> Pane {
        Pane {
            session: "dev".to_string(),
            window: 0,
            window_name: "code".to_string(),
            pane: 1,
            command: "node".to_string(),
            pid: 4242,
            child_commands: vec!["claude".to_string()],
        }
    }

    #[test]
    fn test_risk_ordinals() {
        assert_eq!(Risk::Low.ord(), 1);
        assert_eq!(Risk::Medium.ord(), 2);
        assert_eq!(Risk::High.ord(), 3);
        assert_eq!(Risk::Unspecified.ord(), 0);
    }

    #[test]
    fn test_risk_parse_roundtrip() {
        for r in [Risk::Low, Risk::Medium, Risk::High] {
            assert_eq!(Risk::parse(r.as_str()), r);
        }
        assert_eq!(Risk::parse("weird"), Risk::Unspecified);
        assert_eq!(Risk::parse(""), Risk::Unspecified);
    }

    #[test]
    fn test_non_blocked_verdict_drops_actions() {
        let mut result = ParseResult::active("claude_code", "active");
        result
            .actions
            .push(Action::raw_keys("Enter", "stale", Risk::Low));
        result.recommended = 5;

        let verdict = Verdict::from_parse(&test_pane(), result, EvalSource::Parser, 3);
        assert!(!verdict.blocked);
        assert!(verdict.actions.is_empty());
        assert_eq!(verdict.recommended, 0);
        assert!(verdict.waiting_for.is_empty());
        assert!(verdict.recommended_action().is_none());
    }

    #[test]
    fn test_blocked_verdict_clamps_recommended() {
        let mut result = ParseResult::blocked("claude_code", "permission dialog", "Bash");
        result.actions.push(Action::raw_keys("1", "approve", Risk::Medium));
        result.actions.push(Action::raw_keys("2", "deny", Risk::Low));
        result.recommended = 9;

        let verdict = Verdict::from_parse(&test_pane(), result, EvalSource::Parser, 3);
        assert_eq!(verdict.recommended, 1);
        assert_eq!(verdict.recommended_action().unwrap().keys, "2");
    }

    #[test]
    fn test_wire_shape() {
        let verdict = Verdict::from_parse(
            &test_pane(),
            ParseResult::active("codex", "active execution"),
            EvalSource::Parser,
            12,
        );
        let json = serde_json::to_value(&verdict).unwrap();
        // Always present, even for the empty/zero case.
        assert_eq!(json["recommended"], 0);
        assert_eq!(json["waiting_for"], "");
        // Omitted when empty.
        assert!(json.get("actions").is_none());
        assert!(json.get("tokens").is_none());
        assert_eq!(json["eval_source"], "parser");
        assert_eq!(json["target"], "dev:0.1");
    }

    #[test]
    fn test_action_raw_flag_omitted_when_false() {
        let raw = serde_json::to_value(Action::raw_keys("1", "approve", Risk::Medium)).unwrap();
        assert_eq!(raw["raw"], true);
        assert_eq!(raw["risk"], "medium");

        let cooked = serde_json::to_value(Action::cooked("yes", "confirm", Risk::Low)).unwrap();
        assert!(cooked.get("raw").is_none());
    }

    #[test]
    fn test_error_verdict() {
        let verdict = Verdict::evaluation_error(&test_pane(), "capture-pane failed", 7);
        assert_eq!(verdict.agent, AGENT_ERROR);
        assert!(!verdict.blocked);
        assert_eq!(verdict.eval_source, EvalSource::Error);
        assert!(verdict.reason.starts_with("evaluation failed:"));
    }
}
