//! Parser for Codex CLI panes.
//!
//! Codex does not use the alternate screen, so old dialogs and running
//! indicators persist in scrollback. The shared bottom-window discipline
//! matters most here.

use crate::verdict::{Action, ParseResult, Risk};

use super::helpers::{
    bottom_non_empty, has_braille, is_countdown_line, is_footer_line, is_tool_progress_line,
    process_tree_matches, strip_decor, trim_right_panel, BOTTOM_WINDOW,
};
use super::AgentParser;

const AGENT: &str = "codex";

/// First labels of the approval overlay's options, in rendered order.
/// The list is linear with an arrow cursor on the default entry.
const APPROVE_LABELS: &[&str] = &["Yes, proceed", "Yes, continue"];

pub struct CodexParser;

impl CodexParser {
    pub fn new() -> Self {
        Self
    }

    fn recognizes(&self, content: &str, process_tree: &[String]) -> bool {
        if process_tree_matches(process_tree, "codex") {
            return true;
        }
        content.contains("OpenAI Codex")
            || content.contains("tell Codex what to do")
            || content.contains("Codex CLI")
    }

    fn classify(&self, content: &str) -> ParseResult {
        let bottom = bottom_non_empty(content, BOTTOM_WINDOW);

        if idle_footer_in(&bottom) && !dialog_indicator_in(&bottom) && !active_indicator_in(&bottom)
        {
            return idle_result();
        }

        if let Some(result) = self.approval_dialog(content) {
            return result;
        }
        if let Some(result) = self.confirmation_prompt(&bottom) {
            return result;
        }

        if active_indicator_in(&bottom) {
            return ParseResult::active(AGENT, "active execution");
        }
        if bottom.iter().any(|l| is_countdown_line(l)) {
            return ParseResult::active(AGENT, "auto-resolving countdown");
        }

        idle_result()
    }

    /// The exec/patch approval overlay: a linear option list whose first
    /// entry is an approve label, selected by moving the arrow cursor.
    fn approval_dialog(&self, content: &str) -> Option<ParseResult> {
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let live_floor = lines.len().saturating_sub(BOTTOM_WINDOW);

        // Anchor on the last approve entry: earlier ones are scrollback.
        let first_idx = lines.iter().rposition(|l| {
            let text = strip_decor(l);
            APPROVE_LABELS.iter().any(|label| text.starts_with(label))
        })?;

        // Option block: contiguous option-like lines from the approve entry.
        let mut options: Vec<String> = Vec::new();
        let mut last_option_idx = first_idx;
        for (idx, line) in lines.iter().enumerate().skip(first_idx) {
            let text = strip_decor(trim_right_panel(line));
            let is_option = text.starts_with("Yes")
                || text.starts_with("No")
                || text.starts_with("Don't")
                || text.starts_with("Always")
                || text.starts_with("Provide feedback");
            if !is_option {
                break;
            }
            options.push(text.to_string());
            last_option_idx = idx;
        }

        if options.len() < 2 || last_option_idx < live_floor {
            return None;
        }

        // Header and detail: up to two meaningful lines directly above the
        // option block (dialog title, the command to run).
        let mut header_lines: Vec<String> = Vec::new();
        for line in lines[..first_idx].iter().rev().take(4) {
            let text = strip_decor(trim_right_panel(line));
            if text.is_empty() || is_footer_line(text) {
                continue;
            }
            header_lines.push(text.to_string());
            if header_lines.len() == 2 {
                break;
            }
        }
        header_lines.reverse();

        let mut waiting = header_lines.join("\n");
        for option in &options {
            if !waiting.is_empty() {
                waiting.push('\n');
            }
            waiting.push_str(option);
        }

        let mut result = ParseResult::blocked(AGENT, "approval dialog", &waiting);
        for (i, option) in options.iter().enumerate() {
            let mut keys = "Down ".repeat(i);
            keys.push_str("Enter");
            result
                .actions
                .push(Action::raw_keys(&keys, option, approval_risk(option)));
        }
        result.recommended = 0;
        Some(result)
    }

    /// Single-key confirmation (`Press Enter to continue`, trust prompts).
    fn confirmation_prompt(&self, bottom: &[&str]) -> Option<ParseResult> {
        let line = bottom.iter().find(|l| {
            let lower = l.to_lowercase();
            lower.contains("press enter to continue") || lower.contains("press enter to confirm")
        })?;

        let waiting = strip_decor(trim_right_panel(line));
        let mut result = ParseResult::blocked(AGENT, "confirmation prompt", waiting);
        result
            .actions
            .push(Action::raw_keys("Enter", "confirm", Risk::Low));
        result
            .actions
            .push(Action::raw_keys("Escape", "dismiss", Risk::Low));
        result.recommended = 0;
        Some(result)
    }
}

impl Default for CodexParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentParser for CodexParser {
    fn name(&self) -> &'static str {
        AGENT
    }

    fn parse(&self, content: &str, process_tree: &[String]) -> Option<ParseResult> {
        if !self.recognizes(content, process_tree) {
            return None;
        }
        Some(self.classify(content))
    }
}

fn idle_result() -> ParseResult {
    let mut result = ParseResult::blocked(AGENT, "idle at prompt", "input prompt");
    result
        .actions
        .push(Action::raw_keys("Enter", "send empty continuation", Risk::Low));
    result
}

fn idle_footer_in(lines: &[&str]) -> bool {
    lines.iter().any(|l| {
        let lower = l.to_lowercase();
        lower.contains("? for shortcuts") || lower.contains("⏎ send") || l.trim() == "›"
    })
}

fn dialog_indicator_in(lines: &[&str]) -> bool {
    lines.iter().any(|l| {
        let text = strip_decor(l);
        APPROVE_LABELS.iter().any(|label| text.starts_with(label))
            || text.starts_with("No, and tell Codex")
            || l.to_lowercase().contains("press enter to con")
    })
}

fn active_indicator_in(lines: &[&str]) -> bool {
    lines.iter().any(|l| {
        let lower = l.to_lowercase();
        has_braille(l)
            || is_tool_progress_line(trim_right_panel(l))
            || lower.contains("esc to interrupt")
    })
}

fn approval_risk(option: &str) -> Risk {
    let lower = option.to_lowercase();
    if lower.starts_with("no") || lower.starts_with("provide feedback") {
        Risk::Low
    } else {
        // Plain and persistent approval of a command both execute it.
        Risk::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codex_tree() -> Vec<String> {
        vec!["codex".to_string()]
    }

    fn parse(content: &str) -> ParseResult {
        CodexParser::new()
            .parse(content, &codex_tree())
            .expect("codex parser should claim this pane")
    }

    #[test]
    fn test_not_mine() {
        let parser = CodexParser::new();
        assert!(parser
            .parse("random shell output\n$ ", &["zsh".to_string()])
            .is_none());
    }

    #[test]
    fn test_exec_approval_dialog() {
        let content = "\
Run command?
  $ rm -rf target
❯ Yes, proceed
  Yes, and don't ask again for this command
  No, and tell Codex what to do differently
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "approval dialog");
        assert!(result.waiting_for.contains("Run command?"));
        assert!(result.waiting_for.contains("$ rm -rf target"));
        assert!(result.waiting_for.contains("Yes, proceed"));

        assert_eq!(result.actions.len(), 3);
        assert_eq!(result.actions[0].keys, "Enter");
        assert_eq!(result.actions[1].keys, "Down Enter");
        assert_eq!(result.actions[2].keys, "Down Down Enter");
        assert_eq!(result.actions[0].risk, Risk::Medium);
        assert_eq!(result.actions[1].risk, Risk::Medium);
        assert_eq!(result.actions[2].risk, Risk::Low);
        assert_eq!(result.recommended, 0);
        assert!(result.actions.iter().all(|a| a.raw));
    }

    #[test]
    fn test_stale_approval_below_idle_footer() {
        // Dialog answered long ago, still in scrollback; pane is idle now.
        let content = "\
❯ Yes, proceed
  No, and tell Codex what to do differently
ran the command
output a
output b
output c
output d
output e
output f
output g
? for shortcuts
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "idle at prompt");
        assert_eq!(result.actions.len(), 1);
    }

    #[test]
    fn test_running_with_idle_footer_is_active() {
        // Codex shows both during tool execution; running wins.
        let content = "\
⠹ Working (12s · esc to interrupt)
? for shortcuts
";
        let result = parse(content);
        assert!(!result.blocked);
        assert!(result.actions.is_empty());
    }

    #[test]
    fn test_confirmation_prompt() {
        let content = "\
Update available.
Press Enter to continue
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "confirmation prompt");
        assert_eq!(result.actions[0].keys, "Enter");
    }

    #[test]
    fn test_plain_idle_footer() {
        let content = "\
done with the change
? for shortcuts
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "idle at prompt");
    }

    #[test]
    fn test_deterministic() {
        let parser = CodexParser::new();
        let content = "⠹ Working (3s · esc to interrupt)\n";
        assert_eq!(
            parser.parse(content, &codex_tree()),
            parser.parse(content, &codex_tree())
        );
    }
}
