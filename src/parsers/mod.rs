mod claude_code;
mod codex;
mod gemini;
pub mod helpers;
mod opencode;

pub use claude_code::ClaudeCodeParser;
pub use codex::CodexParser;
pub use gemini::GeminiParser;
pub use opencode::OpenCodeParser;

use crate::verdict::ParseResult;

/// Deterministic recognizer for one agent's TUI.
///
/// `parse` returns `Some` only when the parser is confident the pane belongs
/// to its agent, judged from two independent signals: a process-tree match on
/// a distinguishing substring, or content markers unique to that agent's
/// rendering. False positives are more harmful than false negatives; when in
/// doubt, return `None` and let the next parser try.
///
/// Parsers are pure: no I/O, no shared mutable state, no wall-clock reads.
/// The same input always yields the same output, which is what makes verdicts
/// content-addressable.
pub trait AgentParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, content: &str, process_tree: &[String]) -> Option<ParseResult>;
}

/// Ordered collection of parsers; the first non-`None` result wins.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn AgentParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: vec![
                Box::new(OpenCodeParser::new()),
                Box::new(CodexParser::new()),
                Box::new(ClaudeCodeParser::new()),
                Box::new(GeminiParser::new()),
            ],
        }
    }

    /// Tries each registered parser in order. `None` means no parser
    /// recognized the pane and the caller should fall through to the next
    /// evaluation tier.
    pub fn parse(&self, content: &str, process_tree: &[String]) -> Option<ParseResult> {
        self.parsers
            .iter()
            .find_map(|p| p.parse(content, process_tree))
    }

    pub fn parser_names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order() {
        let registry = ParserRegistry::new();
        assert_eq!(
            registry.parser_names(),
            vec!["opencode", "codex", "claude_code", "gemini"]
        );
    }

    #[test]
    fn test_first_match_wins_by_process_tree() {
        let registry = ParserRegistry::new();
        let content = "some unremarkable output\n";

        let result = registry
            .parse(content, &["claude --continue".to_string()])
            .unwrap();
        assert_eq!(result.agent, "claude_code");

        let result = registry.parse(content, &["codex".to_string()]).unwrap();
        assert_eq!(result.agent, "codex");
    }

    #[test]
    fn test_unrecognized_pane_is_none() {
        let registry = ParserRegistry::new();
        assert!(registry
            .parse("$ htop\n", &["zsh".to_string(), "htop".to_string()])
            .is_none());
    }

    #[test]
    fn test_blocked_results_satisfy_action_invariants() {
        let registry = ParserRegistry::new();
        let fixtures: &[(&str, &str)] = &[
            (
                "Claude needs your permission to use Bash\n  $ ls\n  1. Yes  2. No\n",
                "claude",
            ),
            ("all done\n❯\n", "claude"),
            (
                "Run command?\n❯ Yes, proceed\n  No, and tell Codex what to do differently\n",
                "codex",
            ),
            ("done\n? for shortcuts\n", "codex"),
            ("finished\n┃ ▣ Build\nctrl+p commands\n", "opencode"),
            (
                "Allow execution?\n  make deploy\n● 1. Yes, allow once\n  2. No, cancel\n",
                "gemini",
            ),
            ("⠧ Task(Explore: scan) (0 toolcalls)\n", "claude"),
            ("Fetching https://example.com…\n", "claude"),
            ("⠹ Working (3s · esc to interrupt)\n", "codex"),
        ];

        for (content, process) in fixtures {
            let tree = vec![process.to_string()];
            let result = registry
                .parse(content, &tree)
                .unwrap_or_else(|| panic!("no parser claimed: {content:?}"));
            if result.blocked {
                assert!(!result.waiting_for.is_empty(), "{content:?}");
                assert!(!result.actions.is_empty(), "{content:?}");
                assert!(result.recommended < result.actions.len(), "{content:?}");
            } else {
                assert!(result.actions.is_empty(), "{content:?}");
                assert_eq!(result.recommended, 0, "{content:?}");
                assert!(result.waiting_for.is_empty(), "{content:?}");
            }
        }
    }

    #[test]
    fn test_registry_is_deterministic() {
        let registry = ParserRegistry::new();
        let content = "Claude needs your permission to use Bash\n  $ ls\n  1. Yes  2. No\n";
        let tree = vec!["claude".to_string()];
        assert_eq!(registry.parse(content, &tree), registry.parse(content, &tree));
    }
}
