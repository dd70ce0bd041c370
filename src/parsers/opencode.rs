//! Parser for OpenCode panes.

use crate::verdict::{Action, ParseResult, Risk};

use super::helpers::{
    bottom_non_empty, has_braille, is_countdown_line, is_footer_line, process_tree_matches,
    strip_decor, trim_right_panel, BOTTOM_WINDOW,
};
use super::AgentParser;

const AGENT: &str = "opencode";

pub struct OpenCodeParser;

impl OpenCodeParser {
    pub fn new() -> Self {
        Self
    }

    fn recognizes(&self, content: &str, process_tree: &[String]) -> bool {
        if process_tree_matches(process_tree, "opencode") {
            return true;
        }
        let lower = content.to_lowercase();
        lower.contains("ctrl+p commands")
            || lower.contains("tab agents")
            || content.contains("▣ Build")
            || content.contains("▣ Plan")
    }

    fn classify(&self, content: &str) -> ParseResult {
        let bottom = bottom_non_empty(content, BOTTOM_WINDOW);

        if idle_footer_in(&bottom) && !dialog_indicator_in(&bottom) && !active_indicator_in(&bottom)
        {
            return idle_result(&bottom);
        }

        if let Some(result) = self.permission_dialog(content) {
            return result;
        }

        if active_indicator_in(&bottom) {
            return ParseResult::active(AGENT, "active execution");
        }
        if bottom.iter().any(|l| is_countdown_line(l)) {
            return ParseResult::active(AGENT, "auto-resolving countdown");
        }

        idle_result(&bottom)
    }

    /// Permission dialog: `Permission required` title, detail lines, and an
    /// arrow-cursor list of grant options.
    fn permission_dialog(&self, content: &str) -> Option<ParseResult> {
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let live_floor = lines.len().saturating_sub(BOTTOM_WINDOW);

        // Anchor on the last header: earlier occurrences are scrollback.
        let header_idx = lines
            .iter()
            .rposition(|l| strip_decor(l).starts_with("Permission required"))?;

        let mut details: Vec<String> = Vec::new();
        let mut options: Vec<String> = Vec::new();
        let mut last_option_idx = header_idx;

        for (idx, line) in lines.iter().enumerate().skip(header_idx + 1) {
            let text = strip_decor(trim_right_panel(line));
            if text.is_empty() || is_footer_line(text) {
                if options.is_empty() {
                    continue;
                }
                break;
            }
            let is_option = text.starts_with("Allow") || text.starts_with("Deny")
                || text.starts_with("Reject") || text.starts_with("Always allow");
            if is_option {
                options.push(text.to_string());
                last_option_idx = idx;
            } else if options.is_empty() {
                if details.len() < 3 {
                    details.push(text.to_string());
                }
            } else {
                break;
            }
        }

        if options.len() < 2 || last_option_idx < live_floor {
            return None;
        }

        let mut waiting = String::from("Permission required");
        for detail in &details {
            waiting.push('\n');
            waiting.push_str(detail);
        }
        for option in &options {
            waiting.push('\n');
            waiting.push_str(option);
        }

        let mut result = ParseResult::blocked(AGENT, "permission dialog", &waiting);
        for (i, option) in options.iter().enumerate() {
            let mut keys = "Down ".repeat(i);
            keys.push_str("Enter");
            result
                .actions
                .push(Action::raw_keys(&keys, option, grant_risk(option)));
        }
        result.recommended = 0;
        Some(result)
    }
}

impl Default for OpenCodeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentParser for OpenCodeParser {
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

fn idle_result(bottom: &[&str]) -> ParseResult {
    let waiting = bottom
        .iter()
        .rev()
        .find(|l| is_input_bar(l))
        .map(|l| strip_decor(l).to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "input prompt".to_string());
    let mut result = ParseResult::blocked(AGENT, "idle at prompt", &waiting);
    result
        .actions
        .push(Action::raw_keys("Enter", "send empty continuation", Risk::Low));
    result
}

/// The input bar: a `┃` glyph with the mode label (`▣ Build` / `▣ Plan`).
fn is_input_bar(line: &str) -> bool {
    line.contains('┃') && (line.contains("Build") || line.contains("Plan"))
}

fn idle_footer_in(lines: &[&str]) -> bool {
    lines.iter().any(|l| {
        let lower = l.to_lowercase();
        lower.contains("ctrl+p commands")
            || lower.contains("ctrl+t variants")
            || lower.contains("tab agents")
            || is_input_bar(l)
    })
}

fn dialog_indicator_in(lines: &[&str]) -> bool {
    lines
        .iter()
        .any(|l| strip_decor(l).starts_with("Permission required"))
}

fn active_indicator_in(lines: &[&str]) -> bool {
    lines.iter().any(|l| {
        let lower = l.to_lowercase();
        has_braille(l) || lower.contains("esc interrupt") || l.contains("⬝■")
    })
}

fn grant_risk(option: &str) -> Risk {
    let lower = option.to_lowercase();
    if lower.starts_with("deny") || lower.starts_with("reject") {
        Risk::Low
    } else if lower.contains("always") {
        Risk::High
    } else {
        Risk::Medium
    }
}
