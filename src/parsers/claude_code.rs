//! Parser for Claude Code panes.

use crate::verdict::{Action, ParseResult, Risk};

use super::helpers::{
    bottom_non_empty, checkbox_option, has_braille, inline_numbered_options, is_countdown_line,
    is_footer_line, is_thinking_line, is_tool_progress_line, numbered_option, process_tree_matches,
    split_tabs, strip_decor, trim_right_panel, BOTTOM_WINDOW,
};
use super::AgentParser;

const AGENT: &str = "claude_code";

/// Window of non-empty lines a live dialog's option rows may occupy. Headers
/// may scroll further up; options may not.
const DIALOG_LIVE_WINDOW: usize = BOTTOM_WINDOW;

pub struct ClaudeCodeParser;

impl ClaudeCodeParser {
    pub fn new() -> Self {
        Self
    }

    fn recognizes(&self, content: &str, process_tree: &[String]) -> bool {
        if process_tree_matches(process_tree, "claude") {
            return true;
        }
        // Content fallback: markers unique to this TUI.
        content.contains("Claude Code")
            || content.contains("Claude needs your permission")
            || content.contains("claude.ai")
            || content.lines().any(|l| {
                let t = l.trim_start();
                ['✻', '✢', '✳', '✶', '✽'].iter().any(|g| t.starts_with(*g))
                    && is_thinking_line(l)
            })
    }

    fn classify(&self, content: &str) -> ParseResult {
        let bottom = bottom_non_empty(content, BOTTOM_WINDOW);

        // Bottom-of-screen precedence: an unambiguous idle prompt with no
        // dialog or activity below it wins over anything in scrollback.
        if let Some(prompt) = idle_prompt_line(&bottom) {
            if !dialog_indicator_in(&bottom) && !active_indicator_in(&bottom) {
                return idle_result(Some(prompt));
            }
        }

        if let Some(result) = self.permission_dialog(content) {
            return result;
        }
        if let Some(result) = self.question_dialog(content) {
            return result;
        }
        if let Some(result) = self.stuck_subagent(content) {
            return result;
        }

        if active_indicator_in(&bottom) {
            return ParseResult::active(AGENT, "active execution");
        }
        if bottom.iter().any(|l| is_countdown_line(l)) {
            return ParseResult::active(AGENT, "auto-resolving countdown");
        }

        idle_result(None)
    }

    /// Permission / approval dialog. Header forms:
    /// `Claude needs your permission to use Bash` or a boxed tool title
    /// followed by `Do you want to proceed?`. Options are a numbered
    /// selector, inline or one per row.
    fn permission_dialog(&self, content: &str) -> Option<ParseResult> {
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let live_floor = lines.len().saturating_sub(DIALOG_LIVE_WINDOW);

        // Anchor on the last header: earlier occurrences are scrollback.
        let header_idx = lines.iter().rposition(|l| {
            l.contains("needs your permission to use") || l.contains("Do you want to")
        })?;

        let tool = extract_tool(lines[header_idx]);

        // Detail lines between header and the option rows: command text,
        // file paths, dialog prose. Skip borders and footers.
        let mut details: Vec<String> = Vec::new();
        let mut options: Vec<(u32, String)> = Vec::new();
        let mut last_option_idx = 0;

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
            if !text.is_empty() && !is_footer_line(text) && !is_border(text) && details.len() < 3 {
                // "Do you want to proceed?" is dialog chrome, not a detail
                // worth extracting.
                if !text.starts_with("Do you want") {
                    details.push(text.to_string());
                }
            }
        }

        if options.len() < 2 || last_option_idx < live_floor {
            return None;
        }

        let mut waiting = match (tool.as_deref(), details.first()) {
            (Some(tool), Some(detail)) => format!("{} — {}", tool, detail),
            (Some(tool), None) => tool.to_string(),
            (None, Some(detail)) => detail.clone(),
            (None, None) => strip_decor(lines[header_idx]).to_string(),
        };
        for detail in details.iter().skip(1) {
            waiting.push('\n');
            waiting.push_str(detail);
        }
        for (num, text) in &options {
            waiting.push('\n');
            waiting.push_str(&format!("{}. {}", num, text));
        }

        let tool_name = tool.unwrap_or_default();
        let mut result = ParseResult::blocked(AGENT, "permission dialog", &waiting);
        for (num, text) in &options {
            result.actions.push(Action::raw_keys(
                &num.to_string(),
                text,
                option_risk(&tool_name, text),
            ));
        }
        result.recommended = 0;
        Some(result)
    }

    /// Question dialog: multi-select checkbox form or a plain numbered
    /// question. Both render their options near the bottom of the screen.
    fn question_dialog(&self, content: &str) -> Option<ParseResult> {
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let live_floor = lines.len().saturating_sub(DIALOG_LIVE_WINDOW);
        // Question dialogs may show a handful of options plus footer; search
        // a slightly wider region than the decision window.
        let search_floor = lines.len().saturating_sub(25);

        let mut checkboxes: Vec<(u32, bool, String)> = Vec::new();
        let mut numbered: Vec<(u32, String)> = Vec::new();
        let mut first_option_idx = usize::MAX;
        let mut last_option_idx = 0;

        for (idx, line) in lines.iter().enumerate().skip(search_floor) {
            if let Some((num, checked, label)) = checkbox_option(line) {
                // A fresh `1.` row starts a new selector; anything collected
                // before it was output or an older dialog.
                if num == 1 {
                    checkboxes.clear();
                    first_option_idx = usize::MAX;
                }
                if num as usize == checkboxes.len() + 1 {
                    checkboxes.push((num, checked, label));
                    first_option_idx = first_option_idx.min(idx);
                    last_option_idx = idx;
                }
                continue;
            }
            if checkboxes.is_empty() {
                if let Some((num, text)) = numbered_option(strip_decor(line)) {
                    if num == 1 {
                        numbered.clear();
                        first_option_idx = usize::MAX;
                    }
                    if num as usize == numbered.len() + 1 {
                        numbered.push((num, text));
                        first_option_idx = first_option_idx.min(idx);
                        last_option_idx = idx;
                    }
                }
            }
        }

        let multi_select = !checkboxes.is_empty();
        if multi_select {
            numbered = checkboxes
                .iter()
                .map(|(n, _, label)| (*n, label.clone()))
                .collect();
        }
        if numbered.len() < 2 || last_option_idx < live_floor {
            return None;
        }

        // Question text: nearest prose line above the first option.
        let mut question = String::new();
        for line in lines[search_floor..first_option_idx].iter().rev() {
            let text = strip_decor(trim_right_panel(line));
            if text.is_empty() || is_border(text) || is_footer_line(text) {
                continue;
            }
            question = text.to_string();
            break;
        }
        // A numbered list in agent output looks just like a selector. Only
        // claim a dialog on a real question mark, a cursor on an option row,
        // or a selection footer near the bottom.
        if !multi_select {
            let has_cursor = lines[search_floor..]
                .iter()
                .any(|l| l.trim_start().starts_with('❯') && numbered_option(strip_decor(l)).is_some());
            let has_select_footer = lines[live_floor..]
                .iter()
                .any(|l| l.contains("↑↓") || l.to_lowercase().contains("enter to select"));
            let is_question = question.ends_with('?') || question.ends_with('？');
            if !is_question && !has_cursor && !has_select_footer {
                return None;
            }
        }

        // Tabbed multi-question form: a tab header row above the question
        // and a `⇆ tab` hint in the footer.
        let tabbed = lines[live_floor..]
            .iter()
            .any(|l| l.contains('⇆') || l.to_lowercase().contains("tab to cycle"));
        let tab_header = lines[search_floor..first_option_idx].iter().find_map(|l| {
            let segments = split_tabs(strip_decor(l));
            if segments.len() >= 2 && segments.last() == Some(&"Confirm") {
                Some(segments.join(" | "))
            } else {
                None
            }
        });

        let mut waiting = String::new();
        if let Some(tabs) = &tab_header {
            waiting.push_str(&format!("[tabs] {}\n", tabs));
        }
        waiting.push_str(&question);
        for (num, label) in &numbered {
            waiting.push('\n');
            waiting.push_str(&format!("{}. {}", num, label));
        }

        let reason = if multi_select {
            "multi-select question"
        } else {
            "question dialog"
        };
        let mut result = ParseResult::blocked(AGENT, reason, waiting.trim());
        for (num, label) in &numbered {
            let verb = if multi_select { "toggle" } else { "choose" };
            result.actions.push(Action::raw_keys(
                &num.to_string(),
                &format!("{} {}", verb, label),
                Risk::Low,
            ));
        }
        result
            .actions
            .push(Action::raw_keys("Enter", "submit", Risk::Low));
        if tabbed || tab_header.is_some() {
            result
                .actions
                .push(Action::raw_keys("Tab", "next tab", Risk::Low));
            result
                .actions
                .push(Action::raw_keys("BTab", "previous tab", Risk::Low));
        }
        result
            .actions
            .push(Action::raw_keys("Escape", "dismiss", Risk::Low));
        result.recommended = 0;
        Some(result)
    }

    /// A Task block whose spinner is still turning but whose toolcall count
    /// is zero, with no interrupt hint anywhere: the subagent is stuck and
    /// will not resolve on its own.
    fn stuck_subagent(&self, content: &str) -> Option<ParseResult> {
        let lower = content.to_lowercase();
        if lower.contains("esc to interrupt") || lower.contains("esc interrupt") {
            return None;
        }
        let task_line = content
            .lines()
            .find(|l| l.contains("Task(") && (has_braille(l) || is_thinking_line(l)))?;
        if !lower.contains("0 toolcalls") && !lower.contains("0 tool uses") {
            return None;
        }

        let waiting = strip_decor(trim_right_panel(task_line));
        let mut result = ParseResult::blocked(AGENT, "stuck subagent", waiting);
        result.actions.push(Action::cooked(
            "The running subagent task has made no tool calls and appears stuck. Please cancel it and continue without it.",
            "ask parent to cancel stuck task",
            Risk::Low,
        ));
        result.reasoning = "task spinner with zero toolcalls and no interrupt hint".to_string();
        Some(result)
    }
}

impl Default for ClaudeCodeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentParser for ClaudeCodeParser {
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

fn idle_result(prompt: Option<&str>) -> ParseResult {
    let waiting = prompt
        .map(|p| strip_decor(p).to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "input prompt".to_string());
    let mut result = ParseResult::blocked(AGENT, "idle at prompt", &waiting);
    result
        .actions
        .push(Action::raw_keys("Enter", "send empty continuation", Risk::Low));
    result
}

/// The empty input prompt: a bare `❯`, a bare `>`, or an empty boxed input
/// row. A prompt with typed text after it does not count.
fn idle_prompt_line<'a>(bottom: &[&'a str]) -> Option<&'a str> {
    bottom
        .iter()
        .rev()
        .find(|line| {
            let stripped = strip_decor(line).trim();
            stripped == "❯" || stripped == ">" || (stripped.is_empty() && line.contains('❯'))
        })
        .copied()
}

fn dialog_indicator_in(lines: &[&str]) -> bool {
    lines.iter().any(|line| {
        line.contains("Do you want")
            || line.contains("needs your permission")
            || line.contains("Would you like")
            || checkbox_option(line).is_some()
            || !inline_numbered_options(line).is_empty()
            || (line.trim_start().starts_with('❯') && numbered_option(strip_decor(line)).is_some())
    })
}

fn active_indicator_in(lines: &[&str]) -> bool {
    lines.iter().any(|line| {
        let lower = line.to_lowercase();
        has_braille(line)
            || is_thinking_line(line)
            || is_tool_progress_line(trim_right_panel(line))
            || lower.contains("esc to interrupt")
            || lower.contains("ctrl+c to interrupt")
    })
}

fn is_border(text: &str) -> bool {
    !text.is_empty()
        && text.chars().all(|c| {
            matches!(
                c,
                '─' | '═' | '╭' | '╮' | '╰' | '╯' | '┌' | '┐' | '└' | '┘' | '├' | '┤' | '-' | '='
            )
        })
}

fn extract_tool(header: &str) -> Option<String> {
    if let Some(idx) = header.find("needs your permission to use") {
        let rest = header[idx + "needs your permission to use".len()..].trim();
        let tool: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if !tool.is_empty() {
            return Some(tool);
        }
    }
    None
}

/// Risk grading by real-world effect. Denying is always low; persistent
/// grants are never below medium; one-shot grants follow the tool class.
fn option_risk(tool: &str, option_text: &str) -> Risk {
    let lower = option_text.to_lowercase();
    if lower.starts_with("no") || lower.starts_with("deny") || lower.starts_with("cancel") {
        return Risk::Low;
    }

    let tool_lower = tool.to_lowercase();
    let approve_once = match tool_lower.as_str() {
        "read" | "glob" | "grep" | "webfetch" | "fetch" | "websearch" => Risk::Low,
        _ => Risk::Medium,
    };

    if lower.contains("don't ask again") || lower.contains("always") {
        if approve_once == Risk::Low {
            Risk::Medium
        } else {
            approve_once
        }
    } else {
        approve_once
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claude_tree() -> Vec<String> {
        vec!["zsh".to_string(), "claude".to_string()]
    }

    fn parse(content: &str) -> ParseResult {
        ClaudeCodeParser::new()
            .parse(content, &claude_tree())
            .expect("claude parser should claim this pane")
    }

    #[test]
    fn test_not_mine_without_markers() {
        let parser = ClaudeCodeParser::new();
        assert!(parser
            .parse("$ ls\nsrc  Cargo.toml\n$ ", &["zsh".to_string()])
            .is_none());
    }

    #[test]
    fn test_recognizes_via_content_markers() {
        let parser = ClaudeCodeParser::new();
        let content = "✻ Pondering… (esc to interrupt)\n";
        assert!(parser.parse(content, &["node".to_string()]).is_some());
    }

    #[test]
    fn test_permission_dialog_with_dont_ask_again() {
        let content = "\
some earlier output
Claude needs your permission to use Bash
  $ git status
  1. Yes  2. Yes, and don't ask again  3. No
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "permission dialog");
        assert!(result.waiting_for.starts_with("Bash — $ git status"));
        assert_eq!(result.actions.len(), 3);
        assert_eq!(result.actions[0].keys, "1");
        assert_eq!(result.actions[0].risk, Risk::Medium);
        assert_eq!(result.actions[1].keys, "2");
        assert_eq!(result.actions[1].risk, Risk::Medium);
        assert_eq!(result.actions[2].keys, "3");
        assert_eq!(result.actions[2].risk, Risk::Low);
        assert_eq!(result.recommended, 0);
        assert!(result.actions.iter().all(|a| a.raw));
    }

    #[test]
    fn test_permission_dialog_row_per_option() {
        let content = "\
Claude needs your permission to use Edit
  src/main.rs
❯ 1. Yes
  2. Yes, and don't ask again
  3. No, and tell Claude what to do differently
";
        let result = parse(content);
        assert!(result.blocked);
        assert!(result.waiting_for.starts_with("Edit — src/main.rs"));
        assert_eq!(result.actions.len(), 3);
        assert_eq!(result.actions[2].risk, Risk::Low);
    }

    #[test]
    fn test_stale_dialog_with_idle_prompt_at_bottom() {
        let content = "\
Claude needs your permission to use Bash
  $ git status
  1. Yes  2. Yes, and don't ask again  3. No
output line one
output line two
output line three
output line four
output line five
output line six
output line seven
output line eight
❯
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "idle at prompt");
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].keys, "Enter");
        assert_eq!(result.actions[0].risk, Risk::Low);
        assert!(!result.waiting_for.is_empty());
    }

    #[test]
    fn test_active_execution_with_persistent_footer() {
        let content = "\
⏺ I'll grab the docs now.
Fetching https://docs.rs/regex/latest…
? for shortcuts
";
        let result = parse(content);
        assert!(!result.blocked);
        assert!(result.actions.is_empty());
    }

    #[test]
    fn test_multi_select_question_with_tabs() {
        let content = "\
  General   Display   Confirm
Which features should stay enabled?
  1. [ ] Telemetry
  2. [✓] Auto-update
  3. [ ] Crash reports
  ↑↓ select · ⇆ tab · enter confirm
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "multi-select question");
        assert!(result
            .waiting_for
            .starts_with("[tabs] General | Display | Confirm"));
        assert!(result
            .waiting_for
            .contains("Which features should stay enabled?"));

        let keys: Vec<&str> = result.actions.iter().map(|a| a.keys.as_str()).collect();
        assert_eq!(keys, vec!["1", "2", "3", "Enter", "Tab", "BTab", "Escape"]);
        assert!(result.actions.iter().all(|a| a.risk == Risk::Low));
    }

    #[test]
    fn test_plain_question_dialog() {
        let content = "\
Which migration strategy do you prefer?
  1. Expand and contract
  2. Big bang
  3. Dual write
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "question dialog");
        assert!(result.waiting_for.contains("Which migration strategy"));
        assert!(result.waiting_for.contains("2. Big bang"));
        let keys: Vec<&str> = result.actions.iter().map(|a| a.keys.as_str()).collect();
        assert_eq!(keys, vec!["1", "2", "3", "Enter", "Escape"]);
    }

    #[test]
    fn test_stuck_subagent() {
        let content = "\
⏺ Working through the refactor.
⠧ Task(Explore: map the config module) (0 toolcalls · 3m 12s)
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "stuck subagent");
        assert!(result.waiting_for.contains("Task(Explore"));
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].risk, Risk::Low);
        assert!(!result.actions[0].raw);
        assert!(result.actions[0].keys.contains("cancel"));
    }

    #[test]
    fn test_spinning_subagent_with_interrupt_hint_is_active() {
        let content = "\
⠧ Task(Explore: map the config module) (0 toolcalls · 3s)
  esc to interrupt
";
        let result = parse(content);
        assert!(!result.blocked);
    }

    #[test]
    fn test_ambiguous_glyph_with_verb_and_ellipsis_is_active() {
        let content = "\
✻ earlier banner text
· Marinating… (14s · esc to interrupt)
";
        let result = parse(content);
        assert!(!result.blocked);
    }

    #[test]
    fn test_ambiguous_glyph_as_bullet_is_not_active() {
        let content = "\
Summary of changes:
· updated the parser
* tightened the cache TTL
❯
";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "idle at prompt");
    }

    #[test]
    fn test_countdown_is_not_blocked() {
        let content = "\
Request failed with 529.
Retrying in 5s…
";
        let parser = ClaudeCodeParser::new();
        let result = parser.parse(content, &claude_tree()).unwrap();
        assert!(!result.blocked);
        assert_eq!(result.reason, "auto-resolving countdown");
    }

    #[test]
    fn test_fallthrough_is_idle() {
        let content = "just some settled output\nnothing else\n";
        let result = parse(content);
        assert!(result.blocked);
        assert_eq!(result.reason, "idle at prompt");
        assert_eq!(result.waiting_for, "input prompt");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let content = "\
Claude needs your permission to use Bash
  $ cargo test
  1. Yes  2. Yes, and don't ask again  3. No
";
        let parser = ClaudeCodeParser::new();
        let a = parser.parse(content, &claude_tree());
        let b = parser.parse(content, &claude_tree());
        assert_eq!(a, b);
    }

    #[test]
    fn test_bottom_precedence_property() {
        // Any content whose last lines are an idle prompt with no live
        // dialog or activity classifies as idle, whatever sits above.
        let scrollback_variants = [
            "Claude needs your permission to use Bash\n1. Yes  2. No\n",
            "✻ Pondering… (esc to interrupt)\n",
            "Fetching https://example.com…\n",
        ];
        for scrollback in scrollback_variants {
            let content = format!(
                "{}line1\nline2\nline3\nline4\nline5\nline6\nline7\nline8\n❯\n",
                scrollback
            );
            let result = parse(&content);
            assert_eq!(result.reason, "idle at prompt", "scrollback: {scrollback:?}");
        }
    }
}
