//! Parser for Gemini CLI panes.

use crate::verdict::{Action, ParseResult, Risk};

use super::helpers::{
    bottom_non_empty, has_braille, inline_numbered_options, is_countdown_line, is_footer_line,
    numbered_option, process_tree_matches, strip_decor, trim_right_panel, BOTTOM_WINDOW,
};
use super::AgentParser;

const AGENT: &str = "gemini";

/// Dialog titles Gemini CLI uses for tool approvals.
const DIALOG_TITLES: &[&str] = &[
    "Apply this change?",
    "Allow execution?",
    "Allow execution of",
    "Do you want to proceed?",
];

pub struct GeminiParser;

impl GeminiParser {
    pub fn new() -> Self {
        Self
    }

    fn recognizes(&self, content: &str, process_tree: &[String]) -> bool {
        if process_tree_matches(process_tree, "gemini") {
            return true;
        }
        content.contains("Gemini CLI")
            || content.contains("GEMINI.md")
            || content.contains("gemini-2")
    }

    fn classify(&self, content: &str) -> ParseResult {
        let bottom = bottom_non_empty(content, BOTTOM_WINDOW);

        if idle_prompt_in(&bottom) && !dialog_indicator_in(&bottom) && !active_indicator_in(&bottom)
        {
            return idle_result();
        }

        if let Some(result) = self.approval_dialog(content) {
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

    /// Tool approval dialog: a known title, detail lines, and a numbered
    /// selector answered with digit keys.
    fn approval_dialog(&self, content: &str) -> Option<ParseResult> {
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let live_floor = lines.len().saturating_sub(BOTTOM_WINDOW);

        // Anchor on the last title: earlier occurrences are scrollback.
        let header_idx = lines.iter().rposition(|l| {
            let text = strip_decor(l);
            DIALOG_TITLES.iter().any(|t| text.starts_with(t))
        })?;

        let mut details: Vec<String> = Vec::new();
        let mut options: Vec<(u32, String)> = Vec::new();
        let mut last_option_idx = header_idx;

        for (idx, line) in lines.iter().enumerate().skip(header_idx + 1) {
            let inline = inline_numbered_options(line);
            if !inline.is_empty() {
                options = inline;
                last_option_idx = idx;
                break;
            }
            if let Some((num, text)) = numbered_option(strip_decor(line)) {
                if num as usize == options.len() + 1 {
                    options.push((num, text));
                    last_option_idx = idx;
                    continue;
                }
            }
            if !options.is_empty() {
                break;
            }
            let text = strip_decor(trim_right_panel(line));
            if !text.is_empty() && !is_footer_line(text) && details.len() < 3 {
                details.push(text.to_string());
            }
        }

        if options.len() < 2 || last_option_idx < live_floor {
            return None;
        }

        let mut waiting = strip_decor(lines[header_idx]).to_string();
        for detail in &details {
            waiting.push('\n');
            waiting.push_str(detail);
        }
        for (num, text) in &options {
            waiting.push('\n');
            waiting.push_str(&format!("{}. {}", num, text));
        }

        let mut result = ParseResult::blocked(AGENT, "approval dialog", &waiting);
        for (num, text) in &options {
            result
                .actions
                .push(Action::raw_keys(&num.to_string(), text, grant_risk(text)));
        }
        result.recommended = 0;
        Some(result)
    }
}

impl Default for GeminiParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentParser for GeminiParser {
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

fn idle_prompt_in(lines: &[&str]) -> bool {
    lines.iter().any(|l| {
        l.contains("Type your message") || strip_decor(l).trim() == ">"
    })
}

fn dialog_indicator_in(lines: &[&str]) -> bool {
    lines.iter().any(|l| {
        let text = strip_decor(l);
        DIALOG_TITLES.iter().any(|t| text.starts_with(t))
            || !inline_numbered_options(l).is_empty()
    })
}

fn active_indicator_in(lines: &[&str]) -> bool {
    lines.iter().any(|l| {
        let lower = l.to_lowercase();
        has_braille(l)
            || lower.contains("esc to interrupt")
            || lower.contains("ctrl+c to interrupt")
    })
}

fn grant_risk(option: &str) -> Risk {
    let lower = option.to_lowercase();
    if lower.starts_with("no") || lower.starts_with("cancel") {
        Risk::Low
    } else if lower.contains("always") {
        Risk::High
    } else {
        Risk::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Vec<String> {
        vec!["node /usr/local/bin/gemini".to_string()]
    }

    fn parse(content: &str) -> ParseResult {
        GeminiParser::new()
            .parse(content, &tree())
            .expect("gemini parser should claim this pane")
    }

    #[test]
    fn test_not_mine() {
        let parser = GeminiParser::new();
        assert!(parser.parse("$ ls\n$ ", &["zsh".to_string()]).is_none());
    }

    #[test]
    fn test_approval_dialog() {
        let content = "\
Allow execution?
  git push origin main
● 1. Yes, allow once
  2. Yes, allow always
  3. No, suggest changes
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "approval dialog");
        assert!(result.waiting_for.starts_with("Allow execution?"));
        assert!(result.waiting_for.contains("git push origin main"));
        assert_eq!(result.actions.len(), 3);
        assert_eq!(result.actions[0].keys, "1");
        assert_eq!(result.actions[0].risk, Risk::Medium);
        assert_eq!(result.actions[1].risk, Risk::High);
        assert_eq!(result.actions[2].risk, Risk::Low);
    }

    #[test]
    fn test_active_spinner() {
        let content = "⠼ Thinking (esc to interrupt)\n";
        let result = parse(content);
        assert!(!result.blocked);
    }

    #[test]
    fn test_idle_prompt() {
        let content = "\
All done.
│ > Type your message
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "idle at prompt");
    }
}
